//! Error types for archive and session operations.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for archive and session operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of file
    #[error("Invalid archive: expected Ogawa magic bytes")]
    InvalidMagic,

    /// File carries the HDF5 signature (pre-Ogawa container)
    #[error("Legacy HDF5 archive is not supported")]
    LegacyFormat,

    /// Unsupported container version
    #[error("Unsupported Ogawa version: {0}")]
    UnsupportedVersion(u16),

    /// File is truncated or corrupted
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Type mismatch when reading hierarchy children
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Child index out of bounds
    #[error("Child index {index} out of bounds (count: {count})")]
    ChildOutOfBounds { index: usize, count: usize },

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// Empty or unresolvable archive path; no open was attempted
    #[error("Empty or unresolvable archive path")]
    PathInvalid,

    /// Both tiers of the archive opener failed
    #[error("Failed to open archive: stream reader: {stream}; direct reader: {direct}")]
    ArchiveOpenFailed { stream: String, direct: String },

    /// Archive-level read error while building the node tree
    #[error("Tree materialization failed: {0}")]
    TreeMaterialization(#[source] Box<Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }
}

/// Result type alias for archive and session operations.
pub type Result<T> = std::result::Result<T, Error>;
