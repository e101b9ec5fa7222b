//! Format Module
//!
//! Archive file layout and the fixed-size file header.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (10 bytes, big-endian)                               │
//! │   Magic: "STKF" (4) | Version (2) | DataFormat (2) | Rsv (2)│
//! ├─────────────────────────────────────────────────────────────┤
//! │ Block 1                                                     │
//! │   V2: [KeyLen: varint][Key][Size: u64 BE][Payload]          │
//! │   V1: [KeyLen: varint][Key][Size: varint][Payload]          │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Block 2 ... Block N                                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no footer, index block or checksum: the index is rebuilt by
//! scanning blocks on open, and the magic is the only identity check.

mod header;

pub use header::{read_header, read_header_from_path, write_header, FileHeader};

/// Magic bytes identifying an archive ("STKF")
pub const MAGIC: u32 = 0x5354_4B46;

/// Header size: Magic (4) + Version (2) + DataFormat (2) + Reserved (2)
pub const HEADER_SIZE: u64 = 10;

/// Width of the V2 fixed payload size field
pub const V2_SIZE_FIELD: u64 = 8;

/// On-disk block framing revision, stored in the header's version field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FormatVersion {
    /// Uncompressed payloads, varint size known up front
    V1,
    /// Compressed payloads, 8-byte size backfilled after compression
    #[default]
    V2,
}

impl FormatVersion {
    pub const fn as_u16(self) -> u16 {
        match self {
            FormatVersion::V1 => 1,
            FormatVersion::V2 => 2,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FormatVersion::V1),
            2 => Some(FormatVersion::V2),
            _ => None,
        }
    }

    /// Whether writes need an exact payload size before the payload is copied
    pub fn needs_size_hint(self) -> bool {
        matches!(self, FormatVersion::V1)
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.as_u16())
    }
}
