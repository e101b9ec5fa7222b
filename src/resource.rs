//! Byte resources
//!
//! The store works against any seekable read/write handle. Seek is required:
//! V2 framing writes the compressed size after the payload, so it must be able
//! to jump back to the reserved size field.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// A byte-addressable handle an archive lives in
pub trait BlockResource: Read + Write + Seek + Send {
    /// Make written data durable
    fn sync(&mut self) -> io::Result<()>;

    /// Cut the resource to `len` bytes and position it there
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Total length in bytes; restores the current position
    fn len(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        if pos != end {
            self.seek(SeekFrom::Start(pos))?;
        }
        Ok(end)
    }

    fn is_empty(&mut self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl BlockResource for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }

    fn len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

/// In-memory archives
impl BlockResource for Cursor<Vec<u8>> {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        self.get_mut().truncate(len);
        self.set_position(len as u64);
        Ok(())
    }
}
