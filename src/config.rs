//! Configuration for stackfile
//!
//! `Config` drives one archive handle. `Settings` is the optional TOML file
//! the CLI reads its defaults from.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use crate::compress::{
    CompressionType, Compressor, CompressorRegistry, GzipCompressor, GzipLevel, NoneCompressor,
    ZlibCompressor, DEFAULT_BUFFER_SIZE,
};
use crate::error::{Result, StackError};
use crate::format::FormatVersion;
use crate::store::{KeyFilter, StoreOptions};

/// Configuration for one archive handle
#[derive(Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Archive Location
    // -------------------------------------------------------------------------
    /// Archive file path
    pub path: PathBuf,

    // -------------------------------------------------------------------------
    // Format
    // -------------------------------------------------------------------------
    /// Pinned format version. `None`: V2 on create, whatever the header says on open
    pub version: Option<FormatVersion>,

    /// Compression used when creating a new archive
    pub compression: CompressionType,

    /// Level for gzip archives
    pub gzip_level: GzipLevel,

    // -------------------------------------------------------------------------
    // I/O
    // -------------------------------------------------------------------------
    /// Copy buffer size in bytes
    pub buffer_size: usize,

    // -------------------------------------------------------------------------
    // Write Gating
    // -------------------------------------------------------------------------
    /// Writes whose key fails this predicate are rejected
    pub key_filter: Option<KeyFilter>,

    /// Tag → compressor table consulted when opening existing archives
    pub registry: Arc<CompressorRegistry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./archive.stk"),
            version: None,
            compression: CompressionType::NONE,
            gzip_level: GzipLevel::Default,
            buffer_size: DEFAULT_BUFFER_SIZE, // 32 KB
            key_filter: None,
            registry: Arc::new(CompressorRegistry::with_builtins()),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("version", &self.version)
            .field("compression", &self.compression)
            .field("gzip_level", &self.gzip_level)
            .field("buffer_size", &self.buffer_size)
            .field("key_filter", &self.key_filter.is_some())
            .finish()
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Build the compressor for new archives.
    ///
    /// Built-in tags honour `gzip_level` and `buffer_size`; anything else is
    /// looked up in the registry.
    pub fn compressor(&self) -> Result<Arc<dyn Compressor>> {
        let compressor: Arc<dyn Compressor> = match self.compression {
            CompressionType::NONE => Arc::new(NoneCompressor::with_buffer_size(self.buffer_size)),
            CompressionType::GZIP => Arc::new(
                GzipCompressor::with_level(self.gzip_level).buffer_size(self.buffer_size),
            ),
            CompressionType::ZLIB => Arc::new(ZlibCompressor::new().buffer_size(self.buffer_size)),
            other => self.registry.resolve(other)?,
        };
        Ok(compressor)
    }

    /// Options handed to the block store on open
    pub fn store_options(&self) -> Result<StoreOptions> {
        Ok(StoreOptions {
            version: self.version,
            compressor: Some(self.compressor()?),
            key_filter: self.key_filter.clone(),
            registry: Arc::clone(&self.registry),
        })
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the archive path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Pin the format version
    pub fn version(mut self, version: FormatVersion) -> Self {
        self.config.version = Some(version);
        self
    }

    /// Set the compression for new archives
    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.config.compression = compression;
        self
    }

    pub fn gzip_level(mut self, level: GzipLevel) -> Self {
        self.config.gzip_level = level;
        self
    }

    /// Set the copy buffer size (zero keeps the default)
    pub fn buffer_size(mut self, size: usize) -> Self {
        if size > 0 {
            self.config.buffer_size = size;
        }
        self
    }

    /// Reject writes whose key fails `filter`
    pub fn key_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.config.key_filter = Some(Arc::new(filter));
        self
    }

    /// Use a custom compressor registry
    pub fn registry(mut self, registry: Arc<CompressorRegistry>) -> Self {
        self.config.registry = registry;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Settings File
// =============================================================================

/// CLI defaults loaded from a TOML file
///
/// ```toml
/// archive = "backup.stk"
/// compression = "gzip"
/// gzip_level = "best"
/// version = 2
/// verbose = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub archive: Option<PathBuf>,
    pub compression: Option<String>,
    pub gzip_level: Option<String>,
    pub version: Option<u16>,
    pub verbose: bool,
}

impl Settings {
    /// Read and parse a settings file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            StackError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StackError::Config(e.to_string()))
    }

    /// Apply the file's values to a builder, rejecting unknown names
    pub fn apply(&self, mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
        if let Some(path) = &self.archive {
            builder = builder.path(path.clone());
        }
        if let Some(name) = &self.compression {
            let compression = CompressionType::from_name(name)
                .ok_or_else(|| StackError::Config(format!("unknown compression: {}", name)))?;
            builder = builder.compression(compression);
        }
        if let Some(name) = &self.gzip_level {
            let level = GzipLevel::from_name(name)
                .ok_or_else(|| StackError::Config(format!("unknown gzip level: {}", name)))?;
            builder = builder.gzip_level(level);
        }
        if let Some(raw) = self.version {
            let version = FormatVersion::from_u16(raw)
                .ok_or_else(|| StackError::Config(format!("unknown format version: {}", raw)))?;
            builder = builder.version(version);
        }
        Ok(builder)
    }
}
