//! Decoder for `Transfer-Encoding: chunked` bodies.
//!
//! Chunk data is split off the read buffer without copying and yielded as
//! soon as any of it arrives, so a large chunk may come out as several
//! [`PayloadItem::Chunk`]s. Chunk extensions and trailer fields are skipped.

use std::cmp;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{Buffer, ParseError, PayloadItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
    remaining: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Expecting the first hex digit of a chunk size
    SizeStart,
    Size,
    SizeWhitespace,
    Extension,
    SizeLf,
    Data,
    DataCr,
    DataLf,
    /// After the last chunk: either the final CRLF or a trailer field
    EndCr,
    Trailer,
    TrailerLf,
    EndLf,
    Done,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::SizeStart, remaining: 0 }
    }

    fn advance(&mut self, byte: u8) -> Result<State, ParseError> {
        use State::*;

        let next = match (self.state, byte) {
            (SizeStart | Size, b) if b.is_ascii_hexdigit() => {
                self.remaining = self
                    .remaining
                    .checked_mul(16)
                    .and_then(|size| size.checked_add(hex_value(b)))
                    .ok_or_else(|| ParseError::invalid_body("chunk size overflow"))?;
                Size
            }
            (Size | SizeWhitespace, b'\t' | b' ') => SizeWhitespace,
            (Size | SizeWhitespace, b';') => Extension,
            (Size | SizeWhitespace | Extension, b'\r') => SizeLf,
            (Extension, b'\n') => return Err(ParseError::invalid_body("chunk extension contains newline")),
            (Extension, _) => Extension,
            (SizeLf, b'\n') if self.remaining == 0 => EndCr,
            (SizeLf, b'\n') => Data,
            (DataCr, b'\r') => DataLf,
            (DataLf, b'\n') => SizeStart,
            (EndCr, b'\r') => EndLf,
            (EndCr | Trailer, b'\n') => return Err(ParseError::invalid_body("bare LF in chunked trailer")),
            (Trailer, b'\r') => TrailerLf,
            (EndCr | Trailer, _) => Trailer,
            (TrailerLf, b'\n') => EndCr,
            (EndLf, b'\n') => Done,
            (state, b) => return Err(ParseError::invalid_body(format!("unexpected byte {b:#04x} in chunked body, state {state:?}"))),
        };

        Ok(next)
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_value(b: u8) -> u64 {
    match b {
        b'0'..=b'9' => u64::from(b - b'0'),
        b'a'..=b'f' => u64::from(b - b'a' + 10),
        b'A'..=b'F' => u64::from(b - b'A' + 10),
        _ => 0,
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::Done => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }

                State::Data => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let len = cmp::min(self.remaining, src.len() as u64) as usize;
                    self.remaining -= len as u64;
                    if self.remaining == 0 {
                        self.state = State::DataCr;
                    }

                    trace!(len, "read chunked bytes");
                    return Ok(Some(PayloadItem::Chunk(Buffer::from(src.split_to(len).freeze()))));
                }

                _ => {
                    if !src.has_remaining() {
                        return Ok(None);
                    }
                    let byte = src.get_u8();
                    self.state = self.advance(byte)?;
                }
            }
        }
    }
}
