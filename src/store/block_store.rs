//! Block Store
//!
//! Owns one resource, its cached header, the active block codec and the index.

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Index, KeyFilter, OpenFlags, StoreOptions};
use crate::block::{BlockCodec, Node};
use crate::compress::{CompressionType, Compressor, NoneCompressor, Transfer};
use crate::error::{Result, StackError};
use crate::format::{read_header, write_header, FileHeader, FormatVersion, HEADER_SIZE};
use crate::resource::BlockResource;

/// Mode a store was opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

/// Resource plus the two cursors that move over it
struct Cursor<R> {
    resource: R,
    /// Where the next block will be appended
    write_pos: u64,
    /// Where the next sequential read starts
    read_pos: u64,
    /// Set once a write fails past its reservation; no further writes
    write_failed: bool,
}

/// Indexed block store
///
/// ## Concurrency:
/// - `index`: internal RwLock, lookups run in parallel
/// - `cursor`: Mutex around the resource; every I/O call holds it
/// - All methods use `&self`, so one handle can be shared across threads
///
/// Duplicate keys are rejected before the resource is touched, by a single
/// check-and-reserve on the index.
pub struct BlockStore<R: BlockResource> {
    mode: OpenMode,
    header: FileHeader,
    codec: BlockCodec,
    compressor: Arc<dyn Compressor>,
    key_filter: Option<KeyFilter>,
    index: Index,
    cursor: Mutex<Cursor<R>>,
}

impl<R: BlockResource> BlockStore<R> {
    /// Open a store over `resource`.
    ///
    /// - WRITE | CREATE on an empty resource: write a fresh header
    /// - WRITE on an existing archive: read the header, scan, append at EOF
    /// - READ: read the header, scan, position the read cursor at the first block
    pub fn open(mut resource: R, flags: OpenFlags, options: StoreOptions) -> Result<Self> {
        let mode = flags.mode()?;
        let is_empty = resource.is_empty()?;

        if mode == OpenMode::Write && is_empty {
            if !flags.need_create() {
                return Err(StackError::OpenFailed(format!(
                    "empty resource opened with {:?}",
                    flags
                )));
            }
            return Self::create(resource, options);
        }

        resource.seek(SeekFrom::Start(0))?;
        let header = read_header(&mut resource)?;
        if let Some(pinned) = options.version {
            if pinned != header.version {
                return Err(StackError::UnsupportedVersion {
                    found: header.version.as_u16(),
                    expected: pinned.as_u16(),
                });
            }
        }
        if header.version == FormatVersion::V1 && header.data_format != CompressionType::NONE {
            return Err(StackError::UnsupportedCompression(header.data_format.tag()));
        }

        let compressor = Self::select_compressor(&header, &options)?;
        let store = Self {
            mode,
            header,
            codec: BlockCodec::new(header.version),
            compressor,
            key_filter: options.key_filter,
            index: Index::new(),
            cursor: Mutex::new(Cursor {
                resource,
                write_pos: HEADER_SIZE,
                read_pos: HEADER_SIZE,
                write_failed: false,
            }),
        };

        store.load_index()?;

        {
            let mut cursor = store.cursor.lock();
            cursor.read_pos = HEADER_SIZE;
            if mode == OpenMode::Write {
                cursor.write_pos = cursor.resource.seek(SeekFrom::End(0))?;
            } else {
                cursor.resource.seek(SeekFrom::Start(HEADER_SIZE))?;
            }
        }

        tracing::debug!(
            mode = ?mode,
            version = %header.version,
            data_format = header.data_format.tag(),
            blocks = store.index.len(),
            "archive opened"
        );
        Ok(store)
    }

    fn create(mut resource: R, options: StoreOptions) -> Result<Self> {
        let version = options.version.unwrap_or_default();
        let compressor = options
            .compressor
            .unwrap_or_else(|| Arc::new(NoneCompressor::new()));

        if version == FormatVersion::V1 && compressor.kind() != CompressionType::NONE {
            return Err(StackError::Config(
                "v1 archives store payloads uncompressed".to_string(),
            ));
        }

        let header = FileHeader::new(version, compressor.kind());
        resource.seek(SeekFrom::Start(0))?;
        write_header(&header, &mut resource)?;

        tracing::info!(
            version = %version,
            data_format = header.data_format.tag(),
            "archive created"
        );

        Ok(Self {
            mode: OpenMode::Write,
            header,
            codec: BlockCodec::new(version),
            compressor,
            key_filter: options.key_filter,
            index: Index::new(),
            cursor: Mutex::new(Cursor {
                resource,
                write_pos: HEADER_SIZE,
                read_pos: HEADER_SIZE,
                write_failed: false,
            }),
        })
    }

    /// Keep the configured compressor when it matches the header, otherwise
    /// build the one the header names
    fn select_compressor(header: &FileHeader, options: &StoreOptions) -> Result<Arc<dyn Compressor>> {
        match &options.compressor {
            Some(configured) if configured.kind() == header.data_format => Ok(Arc::clone(configured)),
            _ => options.registry.resolve(header.data_format),
        }
    }

    /// Scan every block from just after the header to EOF
    fn load_index(&self) -> Result<()> {
        let mut cursor = self.cursor.lock();
        let mut pos = HEADER_SIZE;
        cursor.resource.seek(SeekFrom::Start(pos))?;

        while let Some((node, _)) =
            self.codec
                .read_block(&mut cursor.resource, pos, None, self.compressor.as_ref())?
        {
            pos = node.end();
            tracing::trace!(key = %node.key, offset = node.offset, size = node.size, "indexed block");
            if let Some(old) = self.index.insert(node) {
                tracing::warn!(key = %old.key, offset = old.offset, "key repeated in archive, keeping the later block");
            }
        }

        tracing::info!(blocks = self.index.len(), data_end = pos, "index rebuilt");
        Ok(())
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Append a block.
    ///
    /// Order of checks: mode, key filter, size hint (V1), duplicate key. Only
    /// then is the resource touched.
    ///
    /// A failure while the block is being written leaves the key reserved,
    /// truncates the partial block away and makes every later write return
    /// `WriteFailed` until the archive is reopened.
    pub fn write_block(&self, key: &str, size_hint: Option<u64>, src: &mut dyn Read) -> Result<Node> {
        if self.mode != OpenMode::Write {
            return Err(StackError::NotWritable);
        }
        if let Some(filter) = &self.key_filter {
            if !filter(key) {
                tracing::warn!(key, "write rejected by key filter");
                return Err(StackError::KeyFiltered(key.to_string()));
            }
        }
        if self.codec.version().needs_size_hint() && size_hint.is_none() {
            return Err(StackError::SizeHintRequired(key.to_string()));
        }
        if !self.index.reserve(key) {
            tracing::warn!(key, "duplicate key rejected");
            return Err(StackError::DuplicateKey(key.to_string()));
        }

        let mut cursor = self.cursor.lock();
        if cursor.write_failed {
            self.index.release(key);
            return Err(StackError::WriteFailed);
        }
        let start = cursor.write_pos;
        if let Err(e) = cursor.resource.seek(SeekFrom::Start(start)) {
            self.index.release(key);
            return Err(e.into());
        }

        let written = self.codec.write_block(
            &mut cursor.resource,
            start,
            key,
            size_hint,
            src,
            self.compressor.as_ref(),
        );
        let node = match written {
            Ok(node) => node,
            Err(e) => {
                // Key stays reserved and the handle stops accepting writes;
                // the partial block is cut off so a reopen sees clean data
                cursor.write_failed = true;
                if let Err(cut) = cursor.resource.truncate(start) {
                    tracing::warn!(key, offset = start, error = %cut, "could not remove partial block");
                }
                tracing::warn!(key, error = %e, "write failed, archive must be reopened");
                return Err(e);
            }
        };
        cursor.write_pos = node.end();
        drop(cursor);

        self.index.insert(node.clone());
        Ok(node)
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Read the block stored under `key` into `sink`.
    ///
    /// Without a sink the payload is only located (existence check). Returns
    /// on-disk bytes consumed and bytes delivered.
    pub fn read_by_key(&self, key: &str, sink: Option<&mut dyn Write>) -> Result<Transfer> {
        if self.mode != OpenMode::Read {
            return Err(StackError::NotReadable);
        }
        let node = self
            .index
            .get(key)
            .ok_or_else(|| StackError::KeyNotFound(key.to_string()))?;

        let decoded = sink.is_some();
        let transfer = {
            let mut cursor = self.cursor.lock();
            cursor.resource.seek(SeekFrom::Start(node.offset))?;
            self.codec
                .read_payload(&mut cursor.resource, &node, sink, self.compressor.as_ref())
                .inspect_err(|e| tracing::warn!(key, error = %e, "block read failed"))?
        };

        if decoded && node.origin_size.is_none() {
            self.index.set_origin_size(key, transfer.written);
        }
        Ok(transfer)
    }

    /// Read the next block in file order.
    ///
    /// Returns `Ok(None)` once no complete record remains.
    pub fn read_block(&self, sink: Option<&mut dyn Write>) -> Result<Option<Node>> {
        if self.mode != OpenMode::Read {
            return Err(StackError::NotReadable);
        }

        let mut cursor = self.cursor.lock();
        let start = cursor.read_pos;
        cursor.resource.seek(SeekFrom::Start(start))?;

        match self
            .codec
            .read_block(&mut cursor.resource, start, sink, self.compressor.as_ref())?
        {
            Some((node, _)) => {
                cursor.read_pos = node.end();
                drop(cursor);
                if let Some(size) = node.origin_size {
                    self.index.set_origin_size(&node.key, size);
                }
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// Restart sequential reads from the first block
    pub fn rewind(&self) {
        self.cursor.lock().read_pos = HEADER_SIZE;
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush buffered bytes and sync the resource
    pub fn flush(&self) -> Result<()> {
        let mut cursor = self.cursor.lock();
        cursor.resource.flush()?;
        cursor.resource.sync()?;
        Ok(())
    }

    /// Flush (write mode) and release the resource
    pub fn close(self) -> Result<()> {
        if self.mode == OpenMode::Write {
            self.flush()?;
        }
        tracing::debug!(blocks = self.index.len(), "archive closed");
        Ok(())
    }

    /// Give back the underlying resource without syncing
    pub fn into_inner(self) -> R {
        self.cursor.into_inner().resource
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn keys(&self) -> Vec<String> {
        self.index.keys()
    }

    pub fn get(&self, key: &str) -> Option<Node> {
        self.index.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains(key)
    }

    /// Present blocks in file order
    pub fn nodes(&self) -> Vec<Node> {
        self.index.nodes()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn version(&self) -> FormatVersion {
        self.header.version
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn compressor(&self) -> &Arc<dyn Compressor> {
        &self.compressor
    }
}
