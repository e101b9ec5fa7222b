//! Store Module
//!
//! Indexed block store over a single seekable resource.
//!
//! ## Responsibilities
//! - Validate open flags (read xor write)
//! - Write the file header on create, read it on open
//! - Rebuild the key index by scanning every block on open
//! - Append blocks, rejecting duplicate or filtered keys
//! - Random-access reads by key, sequential reads by cursor
//!
//! ## Lifecycle
//! ```text
//! Closed ──open(READ)──────▶ Open(Read)  ──close──▶ Closed
//!        ──open(WRITE)─────▶ Open(Write) ──close──▶ Closed
//! ```

mod block_store;
mod index;

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

pub use block_store::{BlockStore, OpenMode};
pub use index::{Index, Slot};

use crate::compress::{Compressor, CompressorRegistry};
use crate::error::{Result, StackError};
use crate::format::FormatVersion;

// =============================================================================
// Open Flags
// =============================================================================

/// Capability flags passed to `open`
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags(u8);

impl OpenFlags {
    pub const READ: OpenFlags = OpenFlags(1);
    pub const WRITE: OpenFlags = OpenFlags(1 << 1);
    /// Create the archive if it does not exist (write only)
    pub const CREATE: OpenFlags = OpenFlags(1 << 2);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn can_read(self) -> bool {
        self.0 & Self::READ.0 != 0
    }

    pub fn can_write(self) -> bool {
        self.0 & Self::WRITE.0 != 0
    }

    pub fn need_create(self) -> bool {
        self.0 & Self::CREATE.0 != 0
    }

    /// Resolve to a single mode: exactly one of READ / WRITE must be set
    pub fn mode(self) -> Result<OpenMode> {
        match (self.can_read(), self.can_write()) {
            (true, true) => Err(StackError::ConflictingFlags),
            (true, false) => Ok(OpenMode::Read),
            (false, true) => Ok(OpenMode::Write),
            (false, false) => Err(StackError::InvalidFlags(self.0)),
        }
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.can_read() {
            names.push("READ");
        }
        if self.can_write() {
            names.push("WRITE");
        }
        if self.need_create() {
            names.push("CREATE");
        }
        write!(f, "OpenFlags({})", names.join(" | "))
    }
}

// =============================================================================
// Store Options
// =============================================================================

/// Predicate deciding whether a key may be written
pub type KeyFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Settings applied when opening a store
#[derive(Clone)]
pub struct StoreOptions {
    /// Pin the format version; `None` = V2 on create, header-selected on open
    pub version: Option<FormatVersion>,
    /// Compressor for new archives; kept on open if its tag matches the header
    pub compressor: Option<Arc<dyn Compressor>>,
    /// Writes whose key fails this predicate are rejected
    pub key_filter: Option<KeyFilter>,
    /// Resolves header compression tags to compressors
    pub registry: Arc<CompressorRegistry>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            version: None,
            compressor: None,
            key_filter: None,
            registry: Arc::new(CompressorRegistry::with_builtins()),
        }
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("version", &self.version)
            .field("compressor", &self.compressor)
            .field("key_filter", &self.key_filter.is_some())
            .field("registry", &self.registry)
            .finish()
    }
}
