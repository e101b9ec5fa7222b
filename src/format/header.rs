//! File header codec
//!
//! Written once right after creation, read once right after opening.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use bytes::{Buf, BufMut, BytesMut};

use super::{FormatVersion, HEADER_SIZE, MAGIC};
use crate::compress::CompressionType;
use crate::error::{Result, StackError};

/// The leading record of every archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: u32,
    pub version: FormatVersion,
    pub data_format: CompressionType,
    pub reserved: u16,
}

impl FileHeader {
    pub fn new(version: FormatVersion, data_format: CompressionType) -> Self {
        Self {
            magic: MAGIC,
            version,
            data_format,
            reserved: 0,
        }
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE as usize);
        buf.put_u32(self.magic);
        buf.put_u16(self.version.as_u16());
        buf.put_u16(self.data_format.tag());
        buf.put_u16(self.reserved);
        buf
    }
}

/// Write `header` as 10 big-endian bytes
pub fn write_header<W: Write + ?Sized>(header: &FileHeader, writer: &mut W) -> Result<()> {
    writer.write_all(&header.encode())?;
    Ok(())
}

/// Read and validate a header.
///
/// Fails with `FormatBroken` on a short read or wrong magic, and with
/// `UnsupportedVersion` on a version this crate cannot decode. The data
/// format tag is returned as-is; resolving it is the caller's job.
pub fn read_header<R: Read + ?Sized>(reader: &mut R) -> Result<FileHeader> {
    let mut raw = [0u8; HEADER_SIZE as usize];
    match reader.read_exact(&mut raw) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Err(StackError::FormatBroken),
        Err(e) => return Err(e.into()),
    }

    let mut buf = &raw[..];
    let magic = buf.get_u32();
    if magic != MAGIC {
        return Err(StackError::FormatBroken);
    }

    let raw_version = buf.get_u16();
    let version = FormatVersion::from_u16(raw_version).ok_or(StackError::UnsupportedVersion {
        found: raw_version,
        expected: FormatVersion::default().as_u16(),
    })?;

    let data_format = CompressionType::new(buf.get_u16());
    let reserved = buf.get_u16();

    Ok(FileHeader {
        magic,
        version,
        data_format,
        reserved,
    })
}

/// Read the header of an archive on disk without opening it as an archive
pub fn read_header_from_path(path: &Path) -> Result<FileHeader> {
    let mut file = File::open(path)?;
    read_header(&mut file)
}
