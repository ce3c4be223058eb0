//! Low-level Ogawa binary container.
//!
//! Ogawa is the binary container used by Alembic-style archives.
//! This module provides read-only access to its group/data hierarchy.
//!
//! ## File Structure
//!
//! ```text
//! +------------------+
//! | Magic: "Ogawa"   |  5 bytes
//! +------------------+
//! | Frozen flag      |  1 byte (0x00 or 0xFF)
//! +------------------+
//! | Version          |  2 bytes (u16 LE)
//! +------------------+
//! | Root Group Pos   |  8 bytes (u64 LE)
//! +------------------+
//! | ... Data ...     |
//! +------------------+
//! ```

mod format;
mod reader;

pub use format::*;
pub use reader::*;
