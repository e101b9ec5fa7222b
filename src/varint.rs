//! Variable-length integers
//!
//! Base-128 encoding: each byte carries 7 value bits, least significant group
//! first, with the high bit set on every byte except the last.
//!
//! ```text
//! 300 = 0b1_0010_1100  ->  [1010_1100] [0000_0010]
//!                            ^ more      ^ last
//! ```

use std::io::{ErrorKind, Read};

use bytes::BufMut;

use crate::error::{Result, StackError};

/// Maximum encoded length of a u64
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUATION: u8 = 0x80;
const VALUE_MASK: u8 = 0x7f;

/// A decoded variable-length integer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarInt(u64);

impl VarInt {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Reinterpret the bits as a signed integer (no zig-zag)
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    /// Number of bytes `encode` will produce
    pub fn encoded_len(self) -> usize {
        let bits = 64 - self.0.leading_zeros() as usize;
        bits.max(1).div_ceil(7)
    }

    /// Append the encoded bytes to `buf`, returning the number written
    pub fn encode<B: BufMut>(self, buf: &mut B) -> usize {
        let mut value = self.0;
        let mut written = 0;
        while value >= u64::from(CONTINUATION) {
            buf.put_u8((value as u8 & VALUE_MASK) | CONTINUATION);
            value >>= 7;
            written += 1;
        }
        buf.put_u8(value as u8);
        written + 1
    }

    pub fn to_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out);
        out
    }

    /// Decode from a byte stream, one byte at a time.
    ///
    /// Returns:
    /// - `Ok(Some((value, bytes_read)))` on success
    /// - `Ok(None)` if the stream was already at EOF (no byte consumed)
    /// - `Err(IncompleteVarint)` if EOF was hit mid-value
    /// - `Err(VarintOverflow)` if the value does not fit in 64 bits
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Option<(Self, usize)>> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        let mut byte = [0u8; 1];

        for read in 0..MAX_VARINT_LEN {
            match reader.read_exact(&mut byte) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    return if read == 0 {
                        Ok(None)
                    } else {
                        Err(StackError::IncompleteVarint)
                    };
                }
                Err(e) => return Err(e.into()),
            }

            let group = u64::from(byte[0] & VALUE_MASK);
            // The tenth byte may only contribute the top bit
            if read == MAX_VARINT_LEN - 1 && group > 1 {
                return Err(StackError::VarintOverflow);
            }
            value |= group << shift;

            if byte[0] & CONTINUATION == 0 {
                return Ok(Some((Self(value), read + 1)));
            }
            shift += 7;
        }

        Err(StackError::VarintOverflow)
    }

    /// Decode a value that must be present (EOF is an error)
    pub fn read_required<R: Read + ?Sized>(reader: &mut R) -> Result<(Self, usize)> {
        Self::read_from(reader)?.ok_or(StackError::IncompleteVarint)
    }
}

impl From<u64> for VarInt {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
