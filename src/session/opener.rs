//! Two-tier archive open protocol.
//!
//! Tier 1 constructs an explicitly managed read handle and hands it to
//! the stream-based reader; this tolerates non-exclusive file access
//! and paths the direct reader cannot take. On a structured failure
//! the handle is discarded and tier 2 opens the reader that accepts a
//! narrow path directly (memory-mapped; it cannot use external
//! streams). Each tier attempts exactly once; the first success wins.
//! When both fail, the diagnostics of both tiers are aggregated into a
//! single error and no partially-open state remains.
//!
//! Legacy HDF5 archives are detected and reported
//! (`Error::LegacyFormat`) but not decoded.

use std::sync::Arc;

use tracing::debug;

use crate::archive::Archive;
use crate::ogawa::FileStream;
use crate::util::{Error, Result};

/// Result of a successful open: the archive plus the stream handles it
/// reads through (empty when the direct-path tier won).
pub(crate) struct OpenedArchive {
    pub archive: Archive,
    pub streams: Vec<Arc<FileStream>>,
}

/// Run the two-tier open protocol for an already-normalized path.
pub(crate) fn open_archive(path: &str) -> Result<OpenedArchive> {
    if path.is_empty() {
        return Err(Error::PathInvalid);
    }

    let stream_err = match open_streamed(path) {
        Ok(opened) => {
            debug!(path, "opened archive via stream reader");
            return Ok(opened);
        }
        // Handles constructed for this tier were dropped with the error.
        Err(e) => e,
    };

    debug!(path, error = %stream_err, "stream open failed, trying direct-path reader");
    match Archive::open_path(path) {
        Ok(archive) => {
            debug!(path, "opened archive via direct-path reader");
            Ok(OpenedArchive {
                archive,
                streams: Vec::new(),
            })
        }
        Err(direct_err) => Err(Error::ArchiveOpenFailed {
            stream: stream_err.to_string(),
            direct: direct_err.to_string(),
        }),
    }
}

fn open_streamed(path: &str) -> Result<OpenedArchive> {
    let stream = Arc::new(FileStream::open(path)?);
    let archive = Archive::open_with_stream(Arc::clone(&stream))?;
    Ok(OpenedArchive {
        archive,
        streams: vec![stream],
    })
}
