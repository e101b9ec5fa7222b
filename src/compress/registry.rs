//! Compressor registry
//!
//! Maps compression tags to display names and, optionally, factories. Each
//! archive holds its own registry (usually shared through an `Arc`), so custom
//! registrations in one place never leak into another.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{CompressionType, Compressor, GzipCompressor, NoneCompressor, ZlibCompressor};
use crate::error::{Result, StackError};

/// Builds a compressor for a tag found in a file header
pub type CompressorFactory = Arc<dyn Fn() -> Arc<dyn Compressor> + Send + Sync>;

struct Entry {
    name: String,
    factory: Option<CompressorFactory>,
}

/// Tag → name/factory table
pub struct CompressorRegistry {
    entries: RwLock<HashMap<u16, Entry>>,
}

impl CompressorRegistry {
    /// Empty registry (no tags known)
    pub fn empty() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registry seeded with none/gzip/zlib
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry.register_compressor(
            CompressionType::NONE,
            "No Compress",
            Arc::new(|| Arc::new(NoneCompressor::new()) as Arc<dyn Compressor>),
        );
        registry.register_compressor(
            CompressionType::GZIP,
            "gzip",
            Arc::new(|| Arc::new(GzipCompressor::new()) as Arc<dyn Compressor>),
        );
        registry.register_compressor(
            CompressionType::ZLIB,
            "zlib",
            Arc::new(|| Arc::new(ZlibCompressor::new()) as Arc<dyn Compressor>),
        );
        registry
    }

    /// Register a display name for a tag.
    ///
    /// Returns false (and changes nothing) if the tag is already registered.
    pub fn register(&self, kind: CompressionType, name: impl Into<String>) -> bool {
        self.insert(kind, name.into(), None)
    }

    /// Register a name and a factory so archives using this tag can be opened
    pub fn register_compressor(
        &self,
        kind: CompressionType,
        name: impl Into<String>,
        factory: CompressorFactory,
    ) -> bool {
        self.insert(kind, name.into(), Some(factory))
    }

    fn insert(&self, kind: CompressionType, name: String, factory: Option<CompressorFactory>) -> bool {
        let mut entries = self.entries.write();
        if entries.contains_key(&kind.tag()) {
            return false;
        }
        entries.insert(kind.tag(), Entry { name, factory });
        true
    }

    /// Human-readable name for a tag
    pub fn name(&self, kind: CompressionType) -> String {
        match self.entries.read().get(&kind.tag()) {
            Some(entry) => entry.name.clone(),
            None => format!("unknown compression type: {}", kind.tag()),
        }
    }

    pub fn contains(&self, kind: CompressionType) -> bool {
        self.entries.read().contains_key(&kind.tag())
    }

    /// Build a compressor for a tag, failing fast on unknown tags
    pub fn resolve(&self, kind: CompressionType) -> Result<Arc<dyn Compressor>> {
        let entries = self.entries.read();
        match entries.get(&kind.tag()).and_then(|e| e.factory.as_ref()) {
            Some(factory) => Ok(factory()),
            None => Err(StackError::UnsupportedCompression(kind.tag())),
        }
    }
}

impl Default for CompressorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for CompressorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<u16> = self.entries.read().keys().copied().collect();
        tags.sort_unstable();
        f.debug_struct("CompressorRegistry").field("tags", &tags).finish()
    }
}
