//! Passthrough compressor

use std::io::{Read, Write};

use super::{pump, CompressionType, Compressor, Transfer, DEFAULT_BUFFER_SIZE};
use crate::error::{Result, StackError};

/// Copies bytes unchanged; `read == written` always
#[derive(Debug, Clone)]
pub struct NoneCompressor {
    buffer_size: usize,
}

impl NoneCompressor {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(size: usize) -> Self {
        let buffer_size = if size == 0 { DEFAULT_BUFFER_SIZE } else { size };
        Self { buffer_size }
    }

    fn copy(&self, dst: &mut dyn Write, src: &mut dyn Read) -> Result<Transfer> {
        let mut buf = vec![0u8; self.buffer_size];
        let n = pump(src, dst, &mut buf, StackError::Io)?;
        Ok(Transfer { read: n, written: n })
    }
}

impl Default for NoneCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for NoneCompressor {
    fn kind(&self) -> CompressionType {
        CompressionType::NONE
    }

    fn compress(&self, dst: &mut dyn Write, src: &mut dyn Read) -> Result<Transfer> {
        self.copy(dst, src)
    }

    fn decompress(&self, dst: &mut dyn Write, src: &mut dyn Read) -> Result<Transfer> {
        self.copy(dst, src)
    }
}
