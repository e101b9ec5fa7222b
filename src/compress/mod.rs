//! Compression Module
//!
//! Pluggable per-block stream transforms.
//!
//! ## Responsibilities
//! - Compress a payload stream straight into the archive resource
//! - Decompress a bounded payload stream into a caller-supplied sink
//! - Report exact byte counts on both sides via counting adapters
//!
//! ## Built-in Types
//! | tag | name | implementation |
//! |-----|------|----------------|
//! | 0   | none | byte-for-byte copy |
//! | 1   | gzip | DEFLATE + gzip envelope, configurable level |
//! | 2   | zlib | DEFLATE + zlib envelope, default level |

mod counting;
mod gzip;
mod none;
mod registry;
mod zlib;

use std::fmt;
use std::io::{self, Read, Write};

pub use counting::{CountingReader, CountingWriter};
pub use gzip::{GzipCompressor, GzipLevel};
pub use none::NoneCompressor;
pub use registry::{CompressorFactory, CompressorRegistry};
pub use zlib::ZlibCompressor;

use crate::error::{Result, StackError};

/// Default copy buffer size (32 KiB)
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

// =============================================================================
// Compression Type Tag
// =============================================================================

/// Compression tag as stored in the file header's data-format field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompressionType(u16);

impl CompressionType {
    pub const NONE: CompressionType = CompressionType(0);
    pub const GZIP: CompressionType = CompressionType(1);
    pub const ZLIB: CompressionType = CompressionType(2);

    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }

    pub const fn tag(self) -> u16 {
        self.0
    }

    /// Parse one of the built-in names (`none`, `gzip`, `zlib`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Some(Self::NONE),
            "gzip" | "gz" => Some(Self::GZIP),
            "zlib" => Some(Self::ZLIB),
            _ => None,
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Compressor Trait
// =============================================================================

/// Byte counts reported by a compress/decompress call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transfer {
    /// Bytes pulled from the source stream
    pub read: u64,
    /// Bytes pushed into the destination stream
    pub written: u64,
}

/// A stream transform applied to each block independently
pub trait Compressor: Send + Sync + fmt::Debug {
    /// Tag written to the file header
    fn kind(&self) -> CompressionType;

    /// Compress everything in `src` into `dst`.
    ///
    /// `read` is the original size, `written` the compressed size.
    fn compress(&self, dst: &mut dyn Write, src: &mut dyn Read) -> Result<Transfer>;

    /// Decompress everything in `src` into `dst`.
    ///
    /// `read` is the compressed size consumed, `written` the decompressed size.
    /// A malformed stream fails with [`StackError::StreamFormat`].
    fn decompress(&self, dst: &mut dyn Write, src: &mut dyn Read) -> Result<Transfer>;
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Copy `src` into `dst` through `buf`.
///
/// Read failures go through `on_read_error` so decoders can report
/// [`StackError::StreamFormat`]; write failures are plain I/O errors.
pub(crate) fn pump<R, W, F>(src: &mut R, dst: &mut W, buf: &mut [u8], on_read_error: F) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    F: Fn(io::Error) -> StackError,
{
    let mut total = 0u64;
    loop {
        let n = match src.read(buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(on_read_error(e)),
        };
        dst.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// Map a decoder read failure to a stream format error
pub(crate) fn stream_format(e: io::Error) -> StackError {
    match e.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof => {
            StackError::StreamFormat(e.to_string())
        }
        _ => StackError::Io(e),
    }
}
