//! Ogawa container reader.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use parking_lot::RwLock;

use super::format::*;
use crate::util::{Error, Result};

/// An explicitly managed read handle bound to an archive file.
///
/// Constructed by the caller (the session opener) and handed to
/// [`IStreams::from_stream`]; the same handle may be retained by the
/// session so stream lifetime is visible at the session boundary.
/// Reads seek under a write lock, so a single handle may be shared.
pub struct FileStream {
    file: RwLock<File>,
    len: u64,
}

impl FileStream {
    /// Open a read handle for the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let len = file.metadata()?.len();
        Ok(Self { file: RwLock::new(file), len })
    }

    /// Total length of the underlying file in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True when the underlying file is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read exactly `buf.len()` bytes at the absolute position `pos`.
    pub fn read_at(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        let mut f = self.file.write();
        f.seek(SeekFrom::Start(pos))?;
        f.read_exact(buf)?;
        Ok(())
    }
}

/// Input backing for reading Ogawa data.
///
/// Either an externally supplied [`FileStream`] (the stream-based open
/// tier) or a memory map created from a path (the direct-path tier).
pub struct IStreams {
    inner: StreamsInner,
    version: u16,
    frozen: bool,
    size: u64,
}

enum StreamsInner {
    /// Memory-mapped file, created directly from a narrow path.
    Mmap(Mmap),
    /// Externally constructed read handle.
    Stream(Arc<FileStream>),
}

impl IStreams {
    /// Wrap an externally constructed read handle.
    pub fn from_stream(stream: Arc<FileStream>) -> Result<Self> {
        let size = stream.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }
        let mut header = [0u8; HEADER_SIZE];
        stream.read_at(0, &mut header)?;
        let (version, frozen) = Self::parse_header(&header)?;
        Ok(Self { inner: StreamsInner::Stream(stream), version, frozen, size })
    }

    /// Open a file for reading with memory mapping.
    ///
    /// This tier accepts a plain path only; it cannot use externally
    /// supplied streams.
    pub fn open_mmap(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        // Safety: the file is opened read-only; concurrent truncation is
        // the caller's responsibility, as with the C++ reader.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
        let (version, frozen) = Self::parse_header(&mmap)?;
        Ok(Self { inner: StreamsInner::Mmap(mmap), version, frozen, size })
    }

    /// Parse and validate the Ogawa header.
    fn parse_header(data: &[u8]) -> Result<(u16, bool)> {
        if data.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEof(data.len() as u64));
        }

        if &data[0..5] != OGAWA_MAGIC {
            // Pre-Ogawa archives deserve a precise diagnostic.
            if data.len() >= HDF5_MAGIC.len() && &data[..HDF5_MAGIC.len()] == HDF5_MAGIC {
                return Err(Error::LegacyFormat);
            }
            return Err(Error::InvalidMagic);
        }

        let frozen = data[FROZEN_OFFSET] == FROZEN_FLAG;
        let version = u16::from_le_bytes([data[VERSION_OFFSET], data[VERSION_OFFSET + 1]]);
        if version > CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        Ok((version, frozen))
    }

    /// Check if the archive is frozen (finalized).
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Get the container version.
    #[inline]
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Get the total file size.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Get the root group position from the header.
    pub fn root_pos(&self) -> Result<u64> {
        self.read_u64(ROOT_POS_OFFSET as u64)
    }

    /// Read bytes at a specific position.
    ///
    /// The range is validated against the file size before the buffer
    /// is allocated, so a fabricated length cannot drive an unbounded
    /// allocation.
    pub fn read_bytes(&self, pos: u64, len: usize) -> Result<Vec<u8>> {
        self.check_range(pos, len as u64)?;
        let mut buf = vec![0u8; len];
        self.read_into(pos, &mut buf)?;
        Ok(buf)
    }

    /// Read bytes into an existing buffer.
    pub fn read_into(&self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(pos, buf.len() as u64)?;

        match &self.inner {
            StreamsInner::Mmap(mmap) => {
                buf.copy_from_slice(&mmap[pos as usize..(pos as usize + buf.len())]);
                Ok(())
            }
            StreamsInner::Stream(stream) => stream.read_at(pos, buf),
        }
    }

    /// Check that `[pos, pos + len)` lies within the file.
    fn check_range(&self, pos: u64, len: u64) -> Result<()> {
        match pos.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            Some(end) => Err(Error::UnexpectedEof(end)),
            None => Err(Error::UnexpectedEof(u64::MAX)),
        }
    }

    /// Read a u64 value at the given position.
    pub fn read_u64(&self, pos: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(pos, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a u32 value at the given position.
    pub fn read_u32(&self, pos: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_into(pos, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

/// A group in the Ogawa hierarchy.
/// Groups contain children which can be either data or other groups.
#[derive(Clone)]
pub struct IGroup {
    streams: Arc<IStreams>,
    pos: u64,
    child_offsets: Vec<u64>,
}

impl IGroup {
    /// Create a new group reader at the given position.
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let num_children = if pos == 0 {
            0 // empty group marker
        } else {
            streams.read_u64(pos)?
        };

        // The offset table must fit in the file; the count is untrusted
        // and must not size an allocation on its own.
        let table_end = num_children
            .checked_mul(8)
            .and_then(|bytes| bytes.checked_add(pos + 8));
        match table_end {
            Some(end) if end <= streams.size() => {}
            _ => {
                return Err(Error::invalid(format!(
                    "group at {pos} claims {num_children} children"
                )));
            }
        }

        let mut child_offsets = Vec::with_capacity(num_children as usize);
        for i in 0..num_children {
            child_offsets.push(streams.read_u64(pos + 8 + i * 8)?);
        }

        Ok(Self { streams, pos, child_offsets })
    }

    /// Get the position of this group in the file.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Get the number of children.
    #[inline]
    pub fn num_children(&self) -> usize {
        self.child_offsets.len()
    }

    /// Check if this group is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.child_offsets.is_empty()
    }

    /// Get the raw offset for a child (with group/data flag).
    pub fn child_offset(&self, index: usize) -> Result<u64> {
        self.child_offsets.get(index).copied().ok_or(Error::ChildOutOfBounds {
            index,
            count: self.child_offsets.len(),
        })
    }

    /// Check if child at index is a group.
    pub fn is_child_group(&self, index: usize) -> Result<bool> {
        Ok(is_group_offset(self.child_offset(index)?))
    }

    /// Check if child at index is data.
    pub fn is_child_data(&self, index: usize) -> Result<bool> {
        Ok(is_data_offset(self.child_offset(index)?))
    }

    /// Get a child group.
    pub fn group(&self, index: usize) -> Result<IGroup> {
        let offset = self.child_offset(index)?;
        if !is_group_offset(offset) {
            return Err(Error::TypeMismatch {
                expected: "group".to_string(),
                actual: "data".to_string(),
            });
        }
        IGroup::new(self.streams.clone(), extract_offset(offset))
    }

    /// Get child data.
    pub fn data(&self, index: usize) -> Result<IData> {
        let offset = self.child_offset(index)?;
        if !is_data_offset(offset) {
            return Err(Error::TypeMismatch {
                expected: "data".to_string(),
                actual: "group".to_string(),
            });
        }
        IData::new(self.streams.clone(), extract_offset(offset))
    }
}

/// Data block in the Ogawa hierarchy.
pub struct IData {
    streams: Arc<IStreams>,
    pos: u64,
    size: u64,
}

impl IData {
    /// Create a new data reader at the given position.
    pub fn new(streams: Arc<IStreams>, pos: u64) -> Result<Self> {
        let size = if pos == 0 {
            0 // empty data marker
        } else {
            streams.read_u64(pos)?
        };

        // The payload must fit in the file behind its length prefix.
        if pos != 0 {
            match (pos + 8).checked_add(size) {
                Some(end) if end <= streams.size() => {}
                _ => {
                    return Err(Error::invalid(format!(
                        "data block at {pos} claims {size} bytes"
                    )));
                }
            }
        }

        Ok(Self { streams, pos, size })
    }

    /// Get the size of the data in bytes.
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Check if this data is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Read all data as bytes.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        self.streams.read_bytes(self.pos + 8, self.size as usize)
    }

    /// Read data as a UTF-8 string, stopping at a trailing NUL if present.
    pub fn read_string(&self) -> Result<String> {
        let bytes = self.read_all()?;
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8(bytes[..len].to_vec())?)
    }
}
