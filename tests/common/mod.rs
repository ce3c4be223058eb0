#![allow(dead_code)]

//! Byte-level archive fixtures for the integration tests.
//!
//! The crate itself has no writer, so the tests emit the container
//! directly: blocks are appended bottom-up and the header is patched
//! with the root group position last.

use std::fs;
use std::io;
use std::path::Path;

use abc_import::core::{TimeSamplingInfo, TimeSamplingType};

const TYPE_FLAG_MASK: u64 = 1 << 63;

/// One object in a fixture hierarchy.
pub struct FixtureObject {
    pub name: String,
    pub schema: String,
    pub children: Vec<FixtureObject>,
}

impl FixtureObject {
    pub fn new(name: &str, schema: &str) -> Self {
        Self {
            name: name.to_string(),
            schema: schema.to_string(),
            children: Vec::new(),
        }
    }

    pub fn with_children(name: &str, schema: &str, children: Vec<FixtureObject>) -> Self {
        Self {
            name: name.to_string(),
            schema: schema.to_string(),
            children,
        }
    }
}

/// Write a complete archive with the given top-level objects and
/// time sampling table.
pub fn write_archive(
    path: &Path,
    top_children: Vec<FixtureObject>,
    samplings: &[TimeSamplingInfo],
) -> io::Result<()> {
    write_archive_raw(path, top_children, &encode_samplings(samplings))
}

/// Like [`write_archive`] but takes the sampling table block verbatim,
/// so tests can plant malformed tables.
pub fn write_archive_raw(
    path: &Path,
    top_children: Vec<FixtureObject>,
    table: &[u8],
) -> io::Result<()> {
    let mut buf = vec![0u8; 16]; // header patched below

    let top = FixtureObject::with_children("", "", top_children);

    let version_off = put_data(&mut buf, &1i32.to_le_bytes());
    let meta_off = put_data(&mut buf, b"abc-import test fixture");
    let ts_off = put_data(&mut buf, table);
    let top_off = put_object(&mut buf, &top);
    let root_pos = put_group(&mut buf, &[version_off, meta_off, ts_off, top_off]);

    buf[0..5].copy_from_slice(b"Ogawa");
    buf[5] = 0xFF; // frozen
    buf[6..8].copy_from_slice(&1u16.to_le_bytes());
    buf[8..16].copy_from_slice(&root_pos.to_le_bytes());

    fs::write(path, buf)
}

/// Write a file carrying the legacy HDF5 signature.
pub fn write_hdf5_stub(path: &Path) -> io::Result<()> {
    let mut buf = b"\x89HDF\r\n\x1a\n".to_vec();
    buf.resize(64, 0);
    fs::write(path, buf)
}

fn put_data(buf: &mut Vec<u8>, bytes: &[u8]) -> u64 {
    let pos = buf.len() as u64;
    buf.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
    buf.extend_from_slice(bytes);
    pos | TYPE_FLAG_MASK
}

fn put_group(buf: &mut Vec<u8>, children: &[u64]) -> u64 {
    let pos = buf.len() as u64;
    buf.extend_from_slice(&(children.len() as u64).to_le_bytes());
    for child in children {
        buf.extend_from_slice(&child.to_le_bytes());
    }
    pos
}

/// Child groups are emitted before the parent so their positions are
/// known when the parent's offset table is written.
fn put_object(buf: &mut Vec<u8>, obj: &FixtureObject) -> u64 {
    let child_offsets: Vec<u64> = obj.children.iter().map(|c| put_object(buf, c)).collect();

    let mut header = Vec::new();
    put_string(&mut header, &obj.name);
    put_string(&mut header, &obj.schema);
    let header_off = put_data(buf, &header);

    let mut children = vec![header_off];
    children.extend(child_offsets);
    put_group(buf, &children)
}

fn put_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn encode_samplings(samplings: &[TimeSamplingInfo]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(samplings.len() as u32).to_le_bytes());
    for info in samplings {
        match &info.sampling.sampling_type {
            TimeSamplingType::Identity => {
                out.push(0);
                out.extend_from_slice(&(info.max_num_samples as u64).to_le_bytes());
            }
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } => {
                out.push(1);
                out.extend_from_slice(&(info.max_num_samples as u64).to_le_bytes());
                out.extend_from_slice(&time_per_cycle.to_le_bytes());
                out.extend_from_slice(&start_time.to_le_bytes());
            }
            TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            } => {
                out.push(2);
                out.extend_from_slice(&(info.max_num_samples as u64).to_le_bytes());
                out.extend_from_slice(&time_per_cycle.to_le_bytes());
                put_times(&mut out, times);
            }
            TimeSamplingType::Acyclic { times } => {
                out.push(3);
                out.extend_from_slice(&(info.max_num_samples as u64).to_le_bytes());
                put_times(&mut out, times);
            }
        }
    }
    out
}

fn put_times(out: &mut Vec<u8>, times: &[f64]) {
    out.extend_from_slice(&(times.len() as u32).to_le_bytes());
    for t in times {
        out.extend_from_slice(&t.to_le_bytes());
    }
}
