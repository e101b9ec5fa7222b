//! Block Module
//!
//! Per-entry framing inside the data section.
//!
//! ## Block Format
//! ```text
//! V2 (compressed, size backfilled):
//! ┌──────────────┬──────────┬────────────────┬───────────────────┐
//! │ KeyLen varint│ Key      │ Size u64 BE (8)│ Payload (Size)    │
//! └──────────────┴──────────┴────────────────┴───────────────────┘
//!
//! V1 (verbatim, size known up front):
//! ┌──────────────┬──────────┬────────────────┬───────────────────┐
//! │ KeyLen varint│ Key      │ Size varint    │ Payload (Size)    │
//! └──────────────┴──────────┴────────────────┴───────────────────┘
//! ```
//!
//! A [`Node`] records where a block's payload starts and how long it is on
//! disk; the store keeps one per key.

mod codec;

pub use codec::BlockCodec;

/// Location and size of one block's payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Block key, unique within one archive
    pub key: String,
    /// On-disk payload size (compressed size for V2)
    pub size: u64,
    /// Logical uncompressed size, once known
    pub origin_size: Option<u64>,
    /// Byte position of the payload, right after the size field
    pub offset: u64,
}

impl Node {
    /// Position right after this block's payload
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "key: {}, size: {}", self.key, self.size)
    }
}
