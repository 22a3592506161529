/*!
A bounds-checked reader over a received byte slice.

All multi-byte fields on the wire are in network byte order.
Every read either yields the requested value or fails with
`Error::Truncated` without consuming anything.
*/

use byteorder::{ByteOrder, NetworkEndian};

use std::error;
use std::fmt;
use std::result;

#[derive(Debug, PartialEq)]
pub enum Error {
    /// `need` more bytes were required but only `have` were left
    Truncated { need: usize, have: usize },
    /// A sub-record declared a length that is zero or exceeds the remaining bytes
    BadRecordLength { declared: usize, remaining: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Truncated { need, have } => {
                write!(f, "Truncated buffer: {} bytes needed, {} left", need, have)
            }
            Error::BadRecordLength { declared, remaining } => write!(
                f,
                "Sub-record declares length {} with {} bytes remaining",
                declared, remaining
            ),
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        "buffer reader error"
    }
}

pub type Result<T> = result::Result<T, Error>;

/// A cursor over a byte slice that never reads past its end.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, pos: 0 }
    }

    /// Number of bytes that are not consumed yet
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Position relative to the start of the slice
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Takes the next `len` bytes
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::Truncated {
                need: len,
                have: self.remaining(),
            });
        }
        let bytes = self.bytes;
        let taken = &bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(taken)
    }

    /// Takes everything that is left
    pub fn rest(&mut self) -> &'a [u8] {
        let bytes = self.bytes;
        let rest = &bytes[self.pos..];
        self.pos = bytes.len();
        rest
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(NetworkEndian::read_u16(self.take(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(NetworkEndian::read_u32(self.take(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(NetworkEndian::read_u64(self.take(8)?))
    }

    /// Reads a fixed size array, e.g. a MAC address
    pub fn read_array6(&mut self) -> Result<[u8; 6]> {
        let mut arr = [0; 6];
        arr.copy_from_slice(self.take(6)?);
        Ok(arr)
    }

    /// Reads a fixed size, NUL padded string field
    pub fn read_fixed_str(&mut self, len: usize) -> Result<String> {
        let raw = self.take(len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Splits off a sub-reader over the next `len` bytes.
    /// `len` must be nonzero and fit into the remaining bytes.
    pub fn sub_record(&mut self, len: usize) -> Result<Reader<'a>> {
        if len == 0 || len > self.remaining() {
            return Err(Error::BadRecordLength {
                declared: len,
                remaining: self.remaining(),
            });
        }
        Ok(Reader::new(self.take(len)?))
    }

    /// Peeks a u16 at `offset` from the current position without consuming it
    pub fn peek_u16(&self, offset: usize) -> Result<u16> {
        if offset + 2 > self.remaining() {
            return Err(Error::Truncated {
                need: offset + 2,
                have: self.remaining(),
            });
        }
        let start = self.pos + offset;
        Ok(NetworkEndian::read_u16(&self.bytes[start..start + 2]))
    }
}

/// Writes `name` into a fixed size field, truncating and NUL padding it
pub fn fixed_str_bytes(name: &str, len: usize) -> Vec<u8> {
    let mut field = vec![0; len];
    let raw = name.as_bytes();
    let n = raw.len().min(len - 1);
    field[..n].copy_from_slice(&raw[..n]);
    field
}
