//! # stackfile
//!
//! A simple block archive: keyed payloads stacked one after another in a
//! single file, with:
//! - A fixed 10-byte header (magic, version, compression tag)
//! - Per-block stream compression (none, gzip, zlib, or registered codecs)
//! - An in-memory key → offset index rebuilt by scanning on open
//! - Random-access reads by key and sequential reads in file order
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 CLI (add / get / list / info)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │             Archive trait: BlockArchive | TarArchive         │
//! │               (open flags, read xor write mode)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       BlockStore                             │
//! │          Index (RwLock)  +  resource cursor (Mutex)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ BlockCodec  │          │ Compressor  │
//!   │  (V1 / V2)  │          │  (stream)   │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │BlockResource│
//!   │ (File, mem) │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod varint;
pub mod compress;
pub mod format;
pub mod resource;
pub mod block;
pub mod store;
pub mod archive;
pub mod tar_archive;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, Result, StackError};
pub use config::{Config, Settings};
pub use archive::{Archive, BlockArchive};
pub use tar_archive::TarArchive;
pub use block::Node;
pub use compress::{CompressionType, Compressor, CompressorRegistry, GzipLevel};
pub use format::{FileHeader, FormatVersion};
pub use resource::BlockResource;
pub use store::{BlockStore, OpenFlags, OpenMode, StoreOptions};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of stackfile
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
