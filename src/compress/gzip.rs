//! Gzip compressor

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::{pump, stream_format, CompressionType, Compressor, CountingReader, CountingWriter, Transfer, DEFAULT_BUFFER_SIZE};
use crate::error::{Result, StackError};

/// Gzip compression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GzipLevel {
    #[default]
    Default,
    Fastest,
    Best,
    /// flate2 exposes no strategy knob; this maps to the fastest level
    HuffmanOnly,
    /// Store-only DEFLATE blocks inside the gzip envelope
    NoCompression,
}

impl GzipLevel {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace('_', "-").as_str() {
            "default" => Some(Self::Default),
            "fastest" | "fast" => Some(Self::Fastest),
            "best" => Some(Self::Best),
            "huffman-only" | "huffman" => Some(Self::HuffmanOnly),
            "no-compression" | "store" => Some(Self::NoCompression),
            _ => None,
        }
    }

    fn compression(self) -> Compression {
        match self {
            GzipLevel::Default => Compression::default(),
            GzipLevel::Fastest | GzipLevel::HuffmanOnly => Compression::fast(),
            GzipLevel::Best => Compression::best(),
            GzipLevel::NoCompression => Compression::none(),
        }
    }
}

/// DEFLATE stream in a gzip envelope
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    level: GzipLevel,
    buffer_size: usize,
}

impl GzipCompressor {
    pub fn new() -> Self {
        Self::with_level(GzipLevel::Default)
    }

    pub fn with_level(level: GzipLevel) -> Self {
        Self {
            level,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        if size > 0 {
            self.buffer_size = size;
        }
        self
    }

    pub fn level(&self) -> GzipLevel {
        self.level
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for GzipCompressor {
    fn kind(&self) -> CompressionType {
        CompressionType::GZIP
    }

    fn compress(&self, dst: &mut dyn Write, src: &mut dyn Read) -> Result<Transfer> {
        let mut buf = vec![0u8; self.buffer_size];
        let mut sink = CountingWriter::new(dst);

        let mut encoder = GzEncoder::new(&mut sink, self.level.compression());
        let read = pump(src, &mut encoder, &mut buf, StackError::Io)?;
        encoder.finish()?;

        Ok(Transfer {
            read,
            written: sink.count(),
        })
    }

    fn decompress(&self, dst: &mut dyn Write, src: &mut dyn Read) -> Result<Transfer> {
        let mut buf = vec![0u8; self.buffer_size];
        let mut sink = CountingWriter::new(dst);

        let mut decoder = GzDecoder::new(CountingReader::new(src));
        pump(&mut decoder, &mut sink, &mut buf, stream_format)?;

        Ok(Transfer {
            read: decoder.get_ref().count(),
            written: sink.count(),
        })
    }
}
