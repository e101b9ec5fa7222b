//! Archive Module
//!
//! File-backed facade over [`BlockStore`], plus the [`Archive`] trait shared
//! with the tar fallback.
//!
//! ## Responsibilities
//! - Map open flags onto file open options (read / append / create)
//! - Forward list, write, read and flush to the active store
//! - Refuse every operation while closed

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use crate::block::Node;
use crate::config::Config;
use crate::error::{Result, StackError};
use crate::format::FileHeader;
use crate::store::{BlockStore, OpenFlags, OpenMode};

/// Operations every archive format supports
pub trait Archive {
    /// Open the archive. Exactly one of READ / WRITE must be set.
    fn open(&mut self, flags: OpenFlags) -> Result<()>;

    /// Flush (write mode) and release the file. Closing a closed archive is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Keys stored in the archive
    fn keys(&self) -> Result<Vec<String>>;

    /// Store everything from `src` under `key`. Returns bytes written to the archive.
    fn write(&self, key: &str, size_hint: Option<u64>, src: &mut dyn Read) -> Result<u64>;

    /// Copy the payload stored under `key` into `sink`. Returns bytes delivered.
    fn read(&self, key: &str, sink: Option<&mut dyn Write>) -> Result<u64>;

    fn flush(&self) -> Result<()>;
}

/// Block archive backed by a file
///
/// ## Concurrency:
/// - `write`/`read` take `&self`; the store serializes I/O internally, so a
///   shared handle can accept writes of distinct keys from several threads
/// - `open`/`close` take `&mut self`
pub struct BlockArchive {
    config: Config,
    store: Option<BlockStore<File>>,
}

impl BlockArchive {
    pub fn new(config: Config) -> Self {
        Self { config, store: None }
    }

    /// Create and open in one step
    pub fn open_with(config: Config, flags: OpenFlags) -> Result<Self> {
        let mut archive = Self::new(config);
        archive.open(flags)?;
        Ok(archive)
    }

    /// Open with default settings at `path`
    pub fn open_path(path: impl AsRef<Path>, flags: OpenFlags) -> Result<Self> {
        let config = Config::builder().path(path.as_ref()).build();
        Self::open_with(config, flags)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&BlockStore<File>> {
        self.store.as_ref().ok_or(StackError::NotOpen)
    }

    fn open_file(&self, flags: OpenFlags) -> Result<File> {
        let path = &self.config.path;
        let exists = path.exists();
        let failed = || StackError::OpenFailed(path.display().to_string());

        let file = match flags.mode()? {
            OpenMode::Read if exists => File::open(path)?,
            OpenMode::Write if exists => OpenOptions::new().read(true).write(true).open(path)?,
            OpenMode::Write if flags.need_create() => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)?
            }
            _ => return Err(failed()),
        };
        Ok(file)
    }

    // =========================================================================
    // File Helpers
    // =========================================================================

    /// Store the file at `path` under `key`, using its length as the size hint
    pub fn write_file(&self, key: &str, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let size = fs::metadata(path)?.len();
        let mut file = File::open(path)?;
        tracing::debug!(key, path = %path.display(), size, "adding file");
        self.write(key, Some(size), &mut file)
    }

    /// Extract `key` into a new file at `path` (truncating any existing one)
    pub fn read_file(&self, key: &str, path: impl AsRef<Path>) -> Result<u64> {
        let store = self.store()?;
        if store.mode() != OpenMode::Read {
            return Err(StackError::NotReadable);
        }
        if !store.contains(key) {
            return Err(StackError::KeyNotFound(key.to_string()));
        }
        let mut file = File::create(path.as_ref())?;
        let written = self.read(key, Some(&mut file))?;
        file.flush()?;
        Ok(written)
    }

    // =========================================================================
    // Sequential Access
    // =========================================================================

    /// Read the next block in file order; `None` at end of data
    pub fn read_next(&self, sink: Option<&mut dyn Write>) -> Result<Option<Node>> {
        self.store()?.read_block(sink)
    }

    /// Restart sequential reads from the first block
    pub fn rewind(&self) -> Result<()> {
        self.store()?.rewind();
        Ok(())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn header(&self) -> Result<FileHeader> {
        Ok(*self.store()?.header())
    }

    pub fn get(&self, key: &str) -> Result<Option<Node>> {
        Ok(self.store()?.get(key))
    }

    /// Blocks in file order
    pub fn nodes(&self) -> Result<Vec<Node>> {
        Ok(self.store()?.nodes())
    }
}

impl Archive for BlockArchive {
    fn open(&mut self, flags: OpenFlags) -> Result<()> {
        if self.store.is_some() {
            return Err(StackError::OpenFailed(format!(
                "{} is already open",
                self.config.path.display()
            )));
        }
        let file = self.open_file(flags)?;
        let store = BlockStore::open(file, flags, self.config.store_options()?)?;
        tracing::debug!(path = %self.config.path.display(), blocks = store.len(), "block archive opened");
        self.store = Some(store);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.store.take() {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.store()?.keys())
    }

    fn write(&self, key: &str, size_hint: Option<u64>, src: &mut dyn Read) -> Result<u64> {
        Ok(self.store()?.write_block(key, size_hint, src)?.size)
    }

    fn read(&self, key: &str, sink: Option<&mut dyn Write>) -> Result<u64> {
        Ok(self.store()?.read_by_key(key, sink)?.written)
    }

    fn flush(&self) -> Result<()> {
        self.store()?.flush()
    }
}
