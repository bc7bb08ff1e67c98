//! Immutable byte buffer used at every boundary of the engine.
//!
//! A [`Buffer`] is a fixed-length, read-only view over binary data. Network
//! reads, request body chunks and response body chunks all travel as
//! `Buffer`s, so they can be handed across the push/pull boundary of the body
//! bridge without copying or locking.
//!
//! Two construction modes exist:
//!
//! - *adopt* ([`Buffer::adopt`], [`Buffer::adopt_range`], `From<Vec<u8>>`,
//!   `From<Bytes>`): the buffer takes ownership of the caller's storage, no
//!   bytes are copied. Ownership is moved, so the caller can't mutate the
//!   storage afterwards.
//! - *defensive copy* ([`Buffer::copy_from`], [`Buffer::copy_range`]): the
//!   given range is copied into fresh storage.
//!
//! Every zero-length construction returns the shared empty buffer.

use std::borrow::Cow;
use std::fmt;

use bytes::{BufMut, Bytes};

use crate::protocol::BufferError;

static EMPTY: Buffer = Buffer { bytes: Bytes::new() };

/// An immutable, cheaply cloneable byte buffer.
///
/// Cloning a `Buffer` never copies the underlying bytes.
#[derive(Clone)]
pub struct Buffer {
    bytes: Bytes,
}

/// Character sets understood by [`Buffer::decode`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    /// ISO-8859-1, every byte maps to the code point of the same value.
    Latin1,
    /// 7-bit ASCII, bytes above `0x7F` decode to U+FFFD.
    Ascii,
}

impl Charset {
    /// The registered name, as used in a `charset` media type parameter.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Latin1 => "iso-8859-1",
            Charset::Ascii => "us-ascii",
        }
    }
}

impl Buffer {
    /// Returns the shared empty buffer.
    #[inline]
    pub fn empty() -> Buffer {
        EMPTY.clone()
    }

    /// Wraps `source` without copying it.
    pub fn adopt(source: Vec<u8>) -> Buffer {
        Buffer::from(Bytes::from(source))
    }

    /// Wraps `length` bytes of `source` starting at `offset`, without copying.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidRange`] when `offset + length` exceeds the
    /// length of `source`.
    pub fn adopt_range(source: Vec<u8>, offset: usize, length: usize) -> Result<Buffer, BufferError> {
        check_range(offset, length, source.len())?;
        if length == 0 {
            return Ok(Buffer::empty());
        }

        Ok(Buffer { bytes: Bytes::from(source).slice(offset..offset + length) })
    }

    /// Copies the whole of `source` into a new buffer.
    pub fn copy_from(source: &[u8]) -> Buffer {
        Buffer::from(Bytes::copy_from_slice(source))
    }

    /// Copies `length` bytes of `source` starting at `offset` into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidRange`] when `offset + length` exceeds the
    /// length of `source`.
    pub fn copy_range(source: &[u8], offset: usize, length: usize) -> Result<Buffer, BufferError> {
        check_range(offset, length, source.len())?;
        Ok(Buffer::copy_from(&source[offset..offset + length]))
    }

    /// Wraps a static byte slice.
    pub fn from_static(source: &'static [u8]) -> Buffer {
        Buffer::from(Bytes::from_static(source))
    }

    /// Encodes `text` with `charset`.
    ///
    /// Characters that can't be represented in `charset` are replaced by `?`.
    pub fn encode(text: &str, charset: Charset) -> Buffer {
        match charset {
            Charset::Utf8 => Buffer::copy_from(text.as_bytes()),
            Charset::Latin1 => Buffer::adopt(text.chars().map(|c| u8::try_from(c).unwrap_or(b'?')).collect()),
            Charset::Ascii => Buffer::adopt(text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }).collect()),
        }
    }

    /// The number of bytes in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the byte at `index`, or `None` when `index` is out of bounds.
    #[inline]
    pub fn get(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = u8> + '_ {
        self.bytes.iter().copied()
    }

    /// Copies the buffer into `destination` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InsufficientCapacity`] when `destination` can't
    /// hold the whole buffer from `offset`.
    pub fn write_to_slice(&self, destination: &mut [u8], offset: usize) -> Result<(), BufferError> {
        let capacity = destination.len().saturating_sub(offset);
        if offset > destination.len() || capacity < self.len() {
            return Err(BufferError::insufficient_capacity(capacity, self.len()));
        }

        destination[offset..offset + self.len()].copy_from_slice(&self.bytes);
        Ok(())
    }

    /// Appends the buffer to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InsufficientCapacity`] when `destination` has
    /// fewer than [`len`](Self::len) bytes of remaining capacity.
    pub fn write_to<B: BufMut + ?Sized>(&self, destination: &mut B) -> Result<(), BufferError> {
        let capacity = destination.remaining_mut();
        if capacity < self.len() {
            return Err(BufferError::insufficient_capacity(capacity, self.len()));
        }

        destination.put_slice(&self.bytes);
        Ok(())
    }

    /// Decodes the buffer as text in `charset`.
    ///
    /// Invalid sequences are replaced rather than reported.
    pub fn decode(&self, charset: Charset) -> Cow<'_, str> {
        match charset {
            Charset::Utf8 => String::from_utf8_lossy(&self.bytes),
            Charset::Latin1 => Cow::Owned(self.bytes.iter().map(|&b| char::from(b)).collect()),
            Charset::Ascii => {
                Cow::Owned(self.bytes.iter().map(|&b| if b.is_ascii() { char::from(b) } else { char::REPLACEMENT_CHARACTER }).collect())
            }
        }
    }

    /// Consumes the buffer and returns the underlying [`Bytes`].
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

fn check_range(offset: usize, length: usize, total: usize) -> Result<(), BufferError> {
    match offset.checked_add(length) {
        Some(end) if end <= total => Ok(()),
        _ => Err(BufferError::invalid_range(offset, length, total)),
    }
}

impl From<Bytes> for Buffer {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() { Buffer::empty() } else { Buffer { bytes } }
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(source: Vec<u8>) -> Self {
        Buffer::adopt(source)
    }
}

impl From<String> for Buffer {
    fn from(text: String) -> Self {
        Buffer::adopt(text.into_bytes())
    }
}

impl From<&'static str> for Buffer {
    fn from(text: &'static str) -> Self {
        Buffer::from_static(text.as_bytes())
    }
}

impl From<Buffer> for Bytes {
    fn from(buffer: Buffer) -> Self {
        buffer.bytes
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::empty()
    }
}

impl<'a> IntoIterator for &'a Buffer {
    type Item = u8;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.bytes.iter().copied()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() { f.write_str("EmptyBuffer") } else { write!(f, "Buffer(length={})", self.len()) }
    }
}
