//! Ogawa container constants.

/// Magic bytes at the start of an Ogawa file.
pub const OGAWA_MAGIC: &[u8; 5] = b"Ogawa";

/// Signature of the legacy HDF5 container that predates Ogawa.
/// Recognized only to produce a precise diagnostic; never decoded.
pub const HDF5_MAGIC: &[u8; 8] = b"\x89HDF\r\n\x1a\n";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Offset of the frozen flag in the header.
pub const FROZEN_OFFSET: usize = 5;

/// Offset of the version in the header.
pub const VERSION_OFFSET: usize = 6;

/// Offset of the root group position in the header.
pub const ROOT_POS_OFFSET: usize = 8;

/// Highest container version this reader understands.
pub const CURRENT_VERSION: u16 = 1;

/// Frozen flag value when the archive is frozen (finalized).
pub const FROZEN_FLAG: u8 = 0xFF;

/// Bit mask for the type flag in child offsets.
/// MSB set = data, MSB clear = group.
pub const TYPE_FLAG_MASK: u64 = 1 << 63;

/// Mask to extract the actual offset from a child pointer.
pub const OFFSET_MASK: u64 = !(1 << 63);

/// Check if a child offset represents a group (MSB clear).
#[inline]
pub const fn is_group_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) == 0
}

/// Check if a child offset represents data (MSB set).
#[inline]
pub const fn is_data_offset(offset: u64) -> bool {
    (offset & TYPE_FLAG_MASK) != 0
}

/// Extract the actual position from a child offset.
#[inline]
pub const fn extract_offset(offset: u64) -> u64 {
    offset & OFFSET_MASK
}

/// Check if an offset is the "empty" marker for groups or data.
#[inline]
pub const fn is_empty_offset(offset: u64) -> bool {
    extract_offset(offset) == 0
}
