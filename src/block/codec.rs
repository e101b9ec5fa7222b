//! Block codec
//!
//! Reads and writes single blocks at explicit positions. The codec never
//! remembers a position itself; callers pass `start` and get back a [`Node`]
//! whose `end()` is where the next block begins.

use std::io::{ErrorKind, Read, SeekFrom, Write};

use bytes::{BufMut, BytesMut};

use super::Node;
use crate::compress::{pump, Compressor, CountingReader, Transfer, DEFAULT_BUFFER_SIZE};
use crate::error::{Result, StackError};
use crate::format::{FormatVersion, V2_SIZE_FIELD};
use crate::resource::BlockResource;
use crate::varint::{VarInt, MAX_VARINT_LEN};

/// Framing for one format version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCodec {
    version: FormatVersion,
}

impl BlockCodec {
    pub fn new(version: FormatVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    // =========================================================================
    // Write Path
    // =========================================================================

    /// Append one block at `start` (the resource must already be there).
    ///
    /// V2 steps:
    /// 1. key length varint + key
    /// 2. 8 zero bytes reserved for the size
    /// 3. stream-compress the payload, counting bytes written
    /// 4. seek back and patch the size, seek forward to the payload end
    ///
    /// V1 needs `size_hint` and copies exactly that many bytes verbatim.
    pub fn write_block<R: BlockResource>(
        &self,
        resource: &mut R,
        start: u64,
        key: &str,
        size_hint: Option<u64>,
        src: &mut dyn Read,
        compressor: &dyn Compressor,
    ) -> Result<Node> {
        let node = match self.version {
            FormatVersion::V2 => Self::write_v2(resource, start, key, src, compressor)?,
            FormatVersion::V1 => {
                let size = size_hint.ok_or_else(|| StackError::SizeHintRequired(key.to_string()))?;
                Self::write_v1(resource, start, key, size, src)?
            }
        };

        tracing::trace!(key = %node.key, offset = node.offset, size = node.size, "block written");
        Ok(node)
    }

    fn write_v2<R: BlockResource>(
        resource: &mut R,
        start: u64,
        key: &str,
        src: &mut dyn Read,
        compressor: &dyn Compressor,
    ) -> Result<Node> {
        let prefix = Self::key_prefix(key, 0);
        resource.write_all(&prefix)?;

        let size_pos = start + prefix.len() as u64;
        resource.write_all(&[0u8; V2_SIZE_FIELD as usize])?;
        let offset = size_pos + V2_SIZE_FIELD;

        let transfer = {
            let sink: &mut dyn Write = resource;
            compressor.compress(sink, src)?
        };
        let end = offset + transfer.written;

        resource.seek(SeekFrom::Start(size_pos))?;
        resource.write_all(&transfer.written.to_be_bytes())?;
        resource.seek(SeekFrom::Start(end))?;

        Ok(Node {
            key: key.to_string(),
            size: transfer.written,
            origin_size: Some(transfer.read),
            offset,
        })
    }

    fn write_v1<R: BlockResource>(
        resource: &mut R,
        start: u64,
        key: &str,
        size: u64,
        src: &mut dyn Read,
    ) -> Result<Node> {
        let mut prefix = Self::key_prefix(key, MAX_VARINT_LEN);
        VarInt::new(size).encode(&mut prefix);
        resource.write_all(&prefix)?;
        let offset = start + prefix.len() as u64;

        let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
        let copied = pump(&mut (&mut *src).take(size), resource, &mut buf, StackError::Io)?;

        // One byte past the hint is enough to know it was wrong
        let extra = if copied == size { Self::has_more(src)? } else { 0 };
        if copied != size || extra != 0 {
            return Err(StackError::WriteSizeMismatch {
                expected: size,
                actual: copied + extra,
            });
        }

        Ok(Node {
            key: key.to_string(),
            size,
            origin_size: Some(size),
            offset,
        })
    }

    /// 1 when `src` still yields a byte, else 0
    fn has_more(src: &mut dyn Read) -> Result<u64> {
        let mut rest = Vec::with_capacity(1);
        Ok((&mut *src).take(1).read_to_end(&mut rest)? as u64)
    }

    fn key_prefix(key: &str, spare: usize) -> BytesMut {
        let key = key.as_bytes();
        let mut prefix = BytesMut::with_capacity(MAX_VARINT_LEN + key.len() + spare);
        VarInt::new(key.len() as u64).encode(&mut prefix);
        prefix.put_slice(key);
        prefix
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Decode the key and size of the block at `start`.
    ///
    /// Returns `Ok(None)` when `start` is exactly at the end of the data;
    /// otherwise the resource is left positioned at the payload. A size that
    /// would run past `u64::MAX` fails with `SizeOverflow`.
    pub fn read_frame<R: Read>(&self, resource: &mut R, start: u64) -> Result<Option<Node>> {
        let (key_len, mut consumed) = match VarInt::read_from(resource)? {
            Some(v) => v,
            None => return Ok(None),
        };
        let key_len = key_len.as_u64();

        let mut key = Vec::new();
        let got = (&mut *resource).take(key_len).read_to_end(&mut key)? as u64;
        if got != key_len {
            return Err(StackError::KeyLengthMismatch {
                expected: key_len,
                actual: got,
            });
        }
        consumed += key.len();
        let key = String::from_utf8(key).map_err(|_| StackError::InvalidKey)?;

        let size = match self.version {
            FormatVersion::V2 => {
                let mut raw = [0u8; V2_SIZE_FIELD as usize];
                match resource.read_exact(&mut raw) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                        return Err(StackError::TruncatedRecord)
                    }
                    Err(e) => return Err(e.into()),
                }
                consumed += raw.len();
                u64::from_be_bytes(raw)
            }
            FormatVersion::V1 => {
                let (size, n) = VarInt::read_required(resource)?;
                consumed += n;
                size.as_u64()
            }
        };

        let offset = start + consumed as u64;
        if offset.checked_add(size).is_none() {
            return Err(StackError::SizeOverflow { offset, size });
        }

        Ok(Some(Node {
            key,
            size,
            origin_size: None,
            offset,
        }))
    }

    /// Read the block at `start`: frame, then payload into `sink` or skip it.
    ///
    /// Returns the node and, when a sink was given, the transfer counts.
    pub fn read_block<R: BlockResource>(
        &self,
        resource: &mut R,
        start: u64,
        sink: Option<&mut dyn Write>,
        compressor: &dyn Compressor,
    ) -> Result<Option<(Node, Transfer)>> {
        let mut node = match self.read_frame(resource, start)? {
            Some(node) => node,
            None => return Ok(None),
        };

        let decoded = sink.is_some();
        let transfer = self.read_payload(resource, &node, sink, compressor)?;
        if decoded {
            node.origin_size = Some(transfer.written);
        }
        Ok(Some((node, transfer)))
    }

    /// Copy or decompress exactly `node.size` bytes from `node.offset`.
    ///
    /// The resource must be positioned at `node.offset`. Without a sink the
    /// payload is skipped by seeking. A short payload (truncated file, corrupt
    /// size) fails with `SizeMismatch`.
    pub fn read_payload<R: BlockResource>(
        &self,
        resource: &mut R,
        node: &Node,
        sink: Option<&mut dyn Write>,
        compressor: &dyn Compressor,
    ) -> Result<Transfer> {
        let Some(sink) = sink else {
            resource.seek(SeekFrom::Start(node.end()))?;
            return Ok(Transfer {
                read: node.size,
                written: 0,
            });
        };

        let mut bounded = CountingReader::new((&mut *resource).take(node.size));
        let outcome = match self.version {
            FormatVersion::V2 => compressor.decompress(sink, &mut bounded),
            FormatVersion::V1 => {
                let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
                pump(&mut bounded, sink, &mut buf, StackError::Io)
                    .map(|n| Transfer { read: n, written: n })
            }
        };

        let consumed = bounded.count();
        match outcome {
            Ok(transfer) if consumed == node.size => Ok(Transfer {
                read: consumed,
                written: transfer.written,
            }),
            Ok(_) => Err(StackError::SizeMismatch {
                expected: node.size,
                actual: consumed,
            }),
            Err(_) if consumed < node.size => Err(StackError::SizeMismatch {
                expected: node.size,
                actual: consumed,
            }),
            Err(e) => Err(e),
        }
    }
}
