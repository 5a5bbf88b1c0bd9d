//! Binary codec shared by the wire protocol and the storage layer.
//!
//! The format is deliberately small: single bytes for kinds, LEB128-style
//! varints for counts and lengths, and length-prefixed byte arrays. Strings
//! are length-prefixed UTF-8.
//!
//! ```
//! use driftdoc::codec::{Reader, Writer};
//!
//! let mut w = Writer::new();
//! w.write_byte(2);
//! w.write_varint(300);
//! w.write_string("héllo");
//!
//! let bytes = w.into_bytes();
//! let mut r = Reader::new(&bytes);
//! assert_eq!(r.read_byte()?, 2);
//! assert_eq!(r.read_varint()?, 300);
//! assert_eq!(r.read_string()?, "héllo");
//! assert!(r.is_empty());
//! # Ok::<(), driftdoc::codec::CodecError>(())
//! ```

mod errors;

pub use errors::CodecError;

/// Result type for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Longest valid encoding of a `u64` varint.
const MAX_VARINT_LEN: usize = 10;

/// Types that can write themselves into a [`Writer`].
pub trait Encode {
    /// Append the encoding of `self` to the writer.
    fn encode_to(&self, writer: &mut Writer);

    /// Encode `self` into a fresh byte vector.
    fn encode(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        self.encode_to(&mut writer);
        writer.into_bytes()
    }
}

/// Types that can be read back from a [`Reader`].
pub trait Decode: Sized {
    /// Read one value starting at the reader's cursor.
    fn decode_from(reader: &mut Reader<'_>) -> CodecResult<Self>;

    /// Decode a value that must span the whole buffer.
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut reader = Reader::new(bytes);
        let value = Self::decode_from(&mut reader)?;
        if !reader.is_empty() {
            return Err(CodecError::TrailingBytes {
                count: reader.remaining(),
            });
        }
        Ok(value)
    }
}

/// Growable output buffer.
#[derive(Debug, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Writes a single raw byte.
    pub fn write_byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    /// Writes an unsigned integer, seven bits per byte, low bits first.
    pub fn write_varint(&mut self, mut n: u64) {
        while n > 0x7f {
            self.buf.push((n as u8 & 0x7f) | 0x80);
            n >>= 7;
        }
        self.buf.push(n as u8);
    }

    /// Writes a collection length as a varint.
    pub fn write_len(&mut self, len: usize) {
        self.write_varint(len as u64);
    }

    /// Writes a length-prefixed byte array.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a borrowed input buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns true when every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, size: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < size {
            return Err(CodecError::UnexpectedEof {
                offset: self.pos,
                needed: size,
            });
        }
        let start = self.pos;
        self.pos += size;
        Ok(&self.buf[start..self.pos])
    }

    /// Reads a single raw byte.
    pub fn read_byte(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a varint written by [`Writer::write_varint`].
    pub fn read_varint(&mut self) -> CodecResult<u64> {
        let start = self.pos;
        let mut num: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let b = self.read_byte()?;
            let bits = u64::from(b & 0x7f);
            let shift = 7 * i as u32;
            if shift == 63 && bits > 1 {
                return Err(CodecError::VarIntOverflow { offset: start });
            }
            num |= bits << shift;
            if b < 0x80 {
                return Ok(num);
            }
        }
        Err(CodecError::VarIntOverflow { offset: start })
    }

    /// Reads a collection length.
    ///
    /// Every element occupies at least one byte, so a length larger than the
    /// unread input is rejected before anything is allocated for it.
    pub fn read_len(&mut self) -> CodecResult<usize> {
        let offset = self.pos;
        let len = self.read_varint()?;
        if len > self.remaining() as u64 {
            return Err(CodecError::UnexpectedEof {
                offset,
                needed: usize::try_from(len).unwrap_or(usize::MAX),
            });
        }
        Ok(len as usize)
    }

    /// Reads a length-prefixed byte array without copying.
    pub fn read_bytes(&mut self) -> CodecResult<&'a [u8]> {
        let len = self.read_len()?;
        self.take(len)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> CodecResult<String> {
        let offset = self.pos;
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8 { offset })
    }
}
