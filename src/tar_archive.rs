//! Tar fallback
//!
//! Implements [`Archive`] over a plain tar file using the `tar` crate, so the
//! CLI can produce archives any tar tool can unpack. Entries carry no
//! per-block compression and keys are entry paths.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::archive::Archive;
use crate::compress::CountingReader;
use crate::error::{Result, StackError};
use crate::store::{OpenFlags, OpenMode};

/// Two zero blocks close every tar stream
const TAR_END_MARKER: u64 = 1024;

enum TarState {
    Closed,
    /// Every read reopens the file and scans from the first entry
    Reading,
    Writing(Mutex<tar::Builder<File>>),
}

/// Archive stored as a tar file
pub struct TarArchive {
    path: PathBuf,
    state: TarState,
}

impl TarArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: TarState::Closed,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, TarState::Closed)
    }

    fn open_for_append(&self, flags: OpenFlags) -> Result<File> {
        let failed = || StackError::OpenFailed(self.path.display().to_string());

        if self.path.exists() {
            let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
            let len = file.metadata()?.len();
            if len < TAR_END_MARKER {
                return Err(failed());
            }
            // New entries overwrite the end marker; the builder writes a fresh one on close
            file.seek(SeekFrom::Start(len - TAR_END_MARKER))?;
            Ok(file)
        } else if flags.need_create() {
            Ok(OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(&self.path)?)
        } else {
            Err(failed())
        }
    }

    fn append(
        builder: &mut tar::Builder<File>,
        key: &str,
        size: u64,
        mtime: u64,
        data: &mut dyn Read,
    ) -> Result<()> {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(size);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        builder.append_data(&mut header, key, data)?;
        Ok(())
    }

    /// Append exactly `size` bytes from `src`; a shorter or longer source
    /// is a `WriteSizeMismatch`
    fn append_exact(
        builder: &mut tar::Builder<File>,
        key: &str,
        size: u64,
        mtime: u64,
        src: &mut dyn Read,
    ) -> Result<()> {
        let copied = {
            let mut counted = CountingReader::new((&mut *src).take(size));
            Self::append(builder, key, size, mtime, &mut counted)?;
            counted.count()
        };

        let mut rest = Vec::with_capacity(1);
        let extra = if copied == size {
            (&mut *src).take(1).read_to_end(&mut rest)? as u64
        } else {
            0
        };
        if copied != size || extra != 0 {
            return Err(StackError::WriteSizeMismatch {
                expected: size,
                actual: copied + extra,
            });
        }
        Ok(())
    }

    /// Visit entries in order until `visit` returns true
    fn scan<F>(&self, mut visit: F) -> Result<bool>
    where
        F: FnMut(&str, &mut dyn Read) -> Result<bool>,
    {
        let file = File::open(&self.path)?;
        let mut archive = tar::Archive::new(BufReader::new(file));
        for entry in archive.entries()? {
            let mut entry = entry?;
            let name = entry.path()?.to_string_lossy().into_owned();
            if visit(&name, &mut entry)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Archive for TarArchive {
    fn open(&mut self, flags: OpenFlags) -> Result<()> {
        if self.is_open() {
            return Err(StackError::OpenFailed(format!(
                "{} is already open",
                self.path.display()
            )));
        }

        self.state = match flags.mode()? {
            OpenMode::Read => {
                File::open(&self.path)
                    .map_err(|_| StackError::OpenFailed(self.path.display().to_string()))?;
                TarState::Reading
            }
            OpenMode::Write => {
                let file = self.open_for_append(flags)?;
                let mut builder = tar::Builder::new(file);
                builder.mode(tar::HeaderMode::Deterministic);
                TarState::Writing(Mutex::new(builder))
            }
        };

        tracing::debug!(path = %self.path.display(), flags = ?flags, "tar archive opened");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let TarState::Writing(builder) = std::mem::replace(&mut self.state, TarState::Closed) {
            let mut file = builder.into_inner().into_inner()?;
            file.flush()?;
            file.sync_all()?;
            tracing::debug!(path = %self.path.display(), "tar archive closed");
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        match &self.state {
            TarState::Closed => return Err(StackError::NotOpen),
            TarState::Writing(builder) => builder.lock().get_mut().flush()?,
            TarState::Reading => {}
        }

        let mut keys = Vec::new();
        self.scan(|name, _| {
            keys.push(name.to_string());
            Ok(false)
        })?;
        Ok(keys)
    }

    fn write(&self, key: &str, size_hint: Option<u64>, src: &mut dyn Read) -> Result<u64> {
        let builder = match &self.state {
            TarState::Writing(builder) => builder,
            TarState::Reading => return Err(StackError::NotWritable),
            TarState::Closed => return Err(StackError::NotOpen),
        };

        let mtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut builder = builder.lock();
        let entry_start = builder.get_mut().stream_position()?;

        // Tar headers carry the size up front; without a hint the payload is spooled
        let outcome = match size_hint {
            Some(size) => Self::append_exact(&mut builder, key, size, mtime, src).map(|()| size),
            None => {
                let mut spooled = Vec::new();
                src.read_to_end(&mut spooled)?;
                let size = spooled.len() as u64;
                Self::append(&mut builder, key, size, mtime, &mut &spooled[..]).map(|()| size)
            }
        };

        let size = match outcome {
            Ok(size) => size,
            Err(e) => {
                // Drop the entry whose header may promise bytes that never came
                let file = builder.get_mut();
                file.set_len(entry_start)?;
                file.seek(SeekFrom::Start(entry_start))?;
                return Err(e);
            }
        };

        tracing::trace!(key, size, "tar entry written");
        Ok(size)
    }

    fn read(&self, key: &str, sink: Option<&mut dyn Write>) -> Result<u64> {
        match &self.state {
            TarState::Reading => {}
            TarState::Writing(_) => return Err(StackError::NotReadable),
            TarState::Closed => return Err(StackError::NotOpen),
        }

        let mut sink = sink;
        let mut copied = 0;
        let found = self.scan(|name, entry| {
            if name != key {
                return Ok(false);
            }
            copied = match sink.as_mut() {
                Some(out) => io::copy(entry, out)?,
                None => io::copy(entry, &mut io::sink())?,
            };
            Ok(true)
        })?;

        if !found {
            return Err(StackError::TarEntryNotFound(key.to_string()));
        }
        Ok(copied)
    }

    fn flush(&self) -> Result<()> {
        match &self.state {
            TarState::Writing(builder) => {
                let mut builder = builder.lock();
                let file = builder.get_mut();
                file.flush()?;
                file.sync_data()?;
                Ok(())
            }
            TarState::Reading => Ok(()),
            TarState::Closed => Err(StackError::NotOpen),
        }
    }
}
