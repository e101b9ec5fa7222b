//! Error types for stackfile
//!
//! Provides a unified error type for all operations. Every variant carries a
//! stable numeric code and an [`ErrorKind`] so callers can tell failures apart
//! without matching on message text.

use thiserror::Error;

/// Result type alias using StackError
pub type Result<T> = std::result::Result<T, StackError>;

/// Unified error type for stackfile operations
#[derive(Debug, Error)]
pub enum StackError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Open / Mode Errors
    // -------------------------------------------------------------------------
    #[error("Cannot open archive {0}")]
    OpenFailed(String),

    #[error("Open flags cannot contain both READ and WRITE")]
    ConflictingFlags,

    #[error("Cannot open with flags {0:#x}")]
    InvalidFlags(u8),

    #[error("Archive is not open")]
    NotOpen,

    #[error("Archive not opened for writing, open with the WRITE flag")]
    NotWritable,

    #[error("Archive not opened for reading, open with the READ flag")]
    NotReadable,

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("File format does not match, maybe broken")]
    FormatBroken,

    #[error("Version {found} not supported, expected {expected}")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("Unsupported compression type: {0}")]
    UnsupportedCompression(u16),

    // -------------------------------------------------------------------------
    // Write Errors
    // -------------------------------------------------------------------------
    #[error("Block with key {0} has already been written")]
    DuplicateKey(String),

    #[error("Key {0} is rejected by the key filter")]
    KeyFiltered(String),

    #[error("Block {0} needs an exact size hint for this format version")]
    SizeHintRequired(String),

    #[error("Write size {actual} does not match declared size {expected}")]
    WriteSizeMismatch { expected: u64, actual: u64 },

    #[error("A previous write failed, reopen the archive before writing again")]
    WriteFailed,

    // -------------------------------------------------------------------------
    // Read / Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Block with key {0} not found")]
    KeyNotFound(String),

    #[error("Incomplete varint")]
    IncompleteVarint,

    #[error("Varint exceeds 64 bits")]
    VarintOverflow,

    #[error("Key length {actual} does not match record length {expected}")]
    KeyLengthMismatch { expected: u64, actual: u64 },

    #[error("Block key is not valid UTF-8")]
    InvalidKey,

    #[error("Block size field truncated")]
    TruncatedRecord,

    #[error("Block size {size} at offset {offset} exceeds the addressable range")]
    SizeOverflow { offset: u64, size: u64 },

    #[error("Size mismatch: expected {expected} bytes, got {actual}; stream likely corrupt")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Stream format error: {0}")]
    StreamFormat(String),

    // -------------------------------------------------------------------------
    // Tar Errors
    // -------------------------------------------------------------------------
    #[error("Entry {0} not found in tar archive")]
    TarEntryNotFound(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Broad classification of a [`StackError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad magic, unsupported version or compression tag
    Format,
    /// Wrong open flags for the attempted operation
    Mode,
    /// Declared and actual sizes disagree; the file position is unreliable
    Integrity,
    /// Duplicate key, missing key, filtered key; the handle stays usable
    Logical,
    /// Invalid configuration
    Config,
    /// Underlying resource failure
    Io,
}

impl ErrorKind {
    /// Whether the caller may keep using the handle after this error
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::Logical)
    }
}

impl StackError {
    /// Stable numeric code for this error
    pub fn code(&self) -> u32 {
        match self {
            StackError::OpenFailed(_) => 1001,
            StackError::ConflictingFlags => 1002,
            StackError::FormatBroken => 1003,
            StackError::InvalidFlags(_) => 1004,
            StackError::UnsupportedCompression(_) => 1101,
            StackError::UnsupportedVersion { .. } => 1102,
            StackError::NotOpen => 1201,
            StackError::NotWritable => 2001,
            StackError::WriteSizeMismatch { .. } => 2003,
            StackError::WriteFailed => 2004,
            StackError::DuplicateKey(_) => 2011,
            StackError::KeyFiltered(_) => 2012,
            StackError::SizeHintRequired(_) => 2021,
            StackError::NotReadable => 3001,
            StackError::IncompleteVarint => 3005,
            StackError::VarintOverflow => 3006,
            StackError::KeyLengthMismatch { .. } => 3011,
            StackError::SizeMismatch { .. } => 3012,
            StackError::InvalidKey => 3013,
            StackError::TruncatedRecord => 3014,
            StackError::SizeOverflow { .. } => 3015,
            StackError::KeyNotFound(_) => 3021,
            StackError::StreamFormat(_) => 3031,
            StackError::Config(_) => 4001,
            StackError::Io(_) => 9001,
            StackError::TarEntryNotFound(_) => 13001,
        }
    }

    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StackError::FormatBroken
            | StackError::UnsupportedVersion { .. }
            | StackError::UnsupportedCompression(_) => ErrorKind::Format,

            StackError::OpenFailed(_)
            | StackError::ConflictingFlags
            | StackError::InvalidFlags(_)
            | StackError::NotOpen
            | StackError::NotWritable
            | StackError::NotReadable => ErrorKind::Mode,

            StackError::WriteSizeMismatch { .. }
            | StackError::WriteFailed
            | StackError::IncompleteVarint
            | StackError::VarintOverflow
            | StackError::KeyLengthMismatch { .. }
            | StackError::InvalidKey
            | StackError::TruncatedRecord
            | StackError::SizeOverflow { .. }
            | StackError::SizeMismatch { .. }
            | StackError::StreamFormat(_) => ErrorKind::Integrity,

            StackError::DuplicateKey(_)
            | StackError::KeyFiltered(_)
            | StackError::SizeHintRequired(_)
            | StackError::KeyNotFound(_)
            | StackError::TarEntryNotFound(_) => ErrorKind::Logical,

            StackError::Config(_) => ErrorKind::Config,
            StackError::Io(_) => ErrorKind::Io,
        }
    }
}
