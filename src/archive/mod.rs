//! High-level archive access over the Ogawa container.
//!
//! A session archive stores four children under the container's root
//! group:
//!
//! ```text
//! root group
//!   [0] data   file version (i32 LE)
//!   [1] data   archive metadata text
//!   [2] data   time sampling table
//!   [3] group  top scene object
//! ```
//!
//! Each scene object group stores its header as child 0 and its child
//! objects, in archive order, as the remaining group children:
//!
//! ```text
//! object group
//!   [0] data   header: name (u32 len + utf8), schema (u32 len + utf8)
//!   [1..] group child objects
//! ```

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::core::{TimeSampling, TimeSamplingInfo};
use crate::ogawa::{FileStream, IData, IGroup, IStreams};
use crate::util::{Error, Result};

/// Lowest file version this reader accepts.
pub const MIN_FILE_VERSION: i32 = 1;

/// Current file version.
pub const FILE_VERSION: i32 = 1;

/// Time sampling kind tags as stored in the sampling table.
const TS_IDENTITY: u8 = 0;
const TS_UNIFORM: u8 = 1;
const TS_CYCLIC: u8 = 2;
const TS_ACYCLIC: u8 = 3;

/// An opened scene archive.
pub struct Archive {
    streams: Arc<IStreams>,
    version: i32,
    metadata: String,
    time_samplings: Vec<Arc<TimeSamplingInfo>>,
    top: ObjectHandle,
}

impl Archive {
    /// Open an archive through an externally constructed read handle.
    ///
    /// The handle stays shared with the caller; the archive only reads
    /// through it.
    pub fn open_with_stream(stream: Arc<FileStream>) -> Result<Self> {
        let streams = Arc::new(IStreams::from_stream(stream)?);
        Self::init(streams)
    }

    /// Open an archive directly from a path, memory-mapped.
    ///
    /// This reader cannot use externally supplied streams.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let streams = Arc::new(IStreams::open_mmap(path)?);
        Self::init(streams)
    }

    fn init(streams: Arc<IStreams>) -> Result<Self> {
        let root_pos = streams.root_pos()?;
        let root = IGroup::new(streams.clone(), root_pos)?;

        // Child 0: version (data), child 1: metadata (data),
        // child 2: time samplings (data), child 3: top object (group).
        if root.num_children() < 4 {
            return Err(Error::invalid("root group: not enough children"));
        }
        if !root.is_child_data(0)? || !root.is_child_data(1)? || !root.is_child_data(2)? || !root.is_child_group(3)? {
            return Err(Error::invalid("root group: unexpected child layout"));
        }

        let version_data = root.data(0)?;
        if version_data.size() != 4 {
            return Err(Error::invalid("version block: bad size"));
        }
        let bytes = version_data.read_all()?;
        let version = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if !(MIN_FILE_VERSION..=FILE_VERSION).contains(&version) {
            return Err(Error::invalid(format!("unsupported file version: {version}")));
        }

        let metadata = root.data(1)?.read_string()?;

        let time_samplings = read_time_sampling_table(&root.data(2)?)?;

        let top = ObjectHandle::from_group(root.group(3)?)?;

        Ok(Self {
            streams,
            version,
            metadata,
            time_samplings,
            top,
        })
    }

    /// File version recorded in the archive.
    #[inline]
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Archive metadata text (writer application, description, ...).
    #[inline]
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// Container frozen flag.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.streams.is_frozen()
    }

    /// Number of time samplings reported by the archive.
    #[inline]
    pub fn num_time_samplings(&self) -> usize {
        self.time_samplings.len()
    }

    /// Time sampling descriptor by archive index.
    pub fn time_sampling(&self, index: usize) -> Option<&Arc<TimeSamplingInfo>> {
        self.time_samplings.get(index)
    }

    /// All time sampling descriptors, in archive order.
    #[inline]
    pub fn time_samplings(&self) -> &[Arc<TimeSamplingInfo>] {
        &self.time_samplings
    }

    /// The archive's top object.
    #[inline]
    pub fn top(&self) -> &ObjectHandle {
        &self.top
    }
}

/// Decode the time sampling table data block.
fn read_time_sampling_table(data: &IData) -> Result<Vec<Arc<TimeSamplingInfo>>> {
    let bytes = data.read_all()?;
    let mut cur = Cursor::new(bytes.as_slice());

    let count = cur.read_u32::<LittleEndian>()? as usize;
    // Each entry carries at least a kind byte and a sample count; a
    // fabricated entry count must not size the allocation.
    let remaining = bytes.len().saturating_sub(cur.position() as usize);
    if count > remaining / 9 {
        return Err(Error::invalid(format!(
            "time sampling table claims {count} entries in {remaining} bytes"
        )));
    }
    let mut samplings = Vec::with_capacity(count);
    for _ in 0..count {
        let kind = cur.read_u8()?;
        let max_num_samples = cur.read_u64::<LittleEndian>()? as usize;
        let sampling = match kind {
            TS_IDENTITY => TimeSampling::IDENTITY,
            TS_UNIFORM => {
                let time_per_cycle = cur.read_f64::<LittleEndian>()?;
                let start_time = cur.read_f64::<LittleEndian>()?;
                TimeSampling::uniform(time_per_cycle, start_time)
            }
            TS_CYCLIC => {
                let time_per_cycle = cur.read_f64::<LittleEndian>()?;
                let times = read_time_vec(&mut cur)?;
                TimeSampling::cyclic(time_per_cycle, times)
            }
            TS_ACYCLIC => TimeSampling::acyclic(read_time_vec(&mut cur)?),
            other => {
                return Err(Error::invalid(format!("unknown time sampling kind: {other}")));
            }
        };
        samplings.push(Arc::new(TimeSamplingInfo::new(sampling, max_num_samples)));
    }
    Ok(samplings)
}

fn read_time_vec(cur: &mut Cursor<&[u8]>) -> Result<Vec<f64>> {
    let n = cur.read_u32::<LittleEndian>()? as usize;
    let remaining = cur.get_ref().len().saturating_sub(cur.position() as usize);
    if n > remaining / 8 {
        return Err(Error::UnexpectedEof(cur.position() + (n as u64) * 8));
    }
    let mut times = Vec::with_capacity(n);
    for _ in 0..n {
        times.push(cur.read_f64::<LittleEndian>()?);
    }
    Ok(times)
}

/// Handle to one scene object in the archive.
///
/// Cheap to clone; holds the object's group and decoded header.
#[derive(Clone)]
pub struct ObjectHandle {
    group: IGroup,
    name: String,
    schema: String,
}

impl ObjectHandle {
    /// Build a handle from an object group, decoding its header block.
    pub(crate) fn from_group(group: IGroup) -> Result<Self> {
        if group.is_empty() {
            return Err(Error::invalid("object group: missing header"));
        }
        let header = group.data(0)?.read_all()?;
        let mut cur = Cursor::new(header.as_slice());
        let name = read_string(&mut cur)?;
        let schema = read_string(&mut cur)?;
        Ok(Self { group, name, schema })
    }

    /// Object name (empty for the top object).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema identifier recorded in the object header.
    #[inline]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Number of child objects.
    #[inline]
    pub fn num_children(&self) -> usize {
        self.group.num_children() - 1
    }

    /// Child object by index, in archive-native order.
    pub fn child(&self, index: usize) -> Result<ObjectHandle> {
        ObjectHandle::from_group(self.group.group(index + 1)?)
    }

    /// Iterate child objects in archive-native order.
    pub fn children(&self) -> impl Iterator<Item = Result<ObjectHandle>> + '_ {
        (0..self.num_children()).map(move |i| self.child(i))
    }
}

fn read_string(cur: &mut Cursor<&[u8]>) -> Result<String> {
    let len = cur.read_u32::<LittleEndian>()? as usize;
    let pos = cur.position() as usize;
    let bytes = cur.get_ref();
    if pos + len > bytes.len() {
        return Err(Error::UnexpectedEof((pos + len) as u64));
    }
    let s = String::from_utf8(bytes[pos..pos + len].to_vec())?;
    cur.set_position((pos + len) as u64);
    Ok(s)
}
