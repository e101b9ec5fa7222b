//! Zlib compressor

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::{pump, stream_format, CompressionType, Compressor, CountingReader, CountingWriter, Transfer, DEFAULT_BUFFER_SIZE};
use crate::error::{Result, StackError};

/// DEFLATE stream in a zlib envelope, default level only
#[derive(Debug, Clone)]
pub struct ZlibCompressor {
    buffer_size: usize,
}

impl ZlibCompressor {
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        if size > 0 {
            self.buffer_size = size;
        }
        self
    }
}

impl Default for ZlibCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for ZlibCompressor {
    fn kind(&self) -> CompressionType {
        CompressionType::ZLIB
    }

    fn compress(&self, dst: &mut dyn Write, src: &mut dyn Read) -> Result<Transfer> {
        let mut buf = vec![0u8; self.buffer_size];
        let mut sink = CountingWriter::new(dst);

        let mut encoder = ZlibEncoder::new(&mut sink, Compression::default());
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

        let mut decoder = ZlibDecoder::new(CountingReader::new(src));
        pump(&mut decoder, &mut sink, &mut buf, stream_format)?;

        Ok(Transfer {
            read: decoder.get_ref().count(),
            written: sink.count(),
        })
    }
}
