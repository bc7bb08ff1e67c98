use std::io::Write;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::{PayloadItem, SendError};

/// Encodes a body with chunked transfer coding, one wire chunk per item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false }
    }
}

impl Encoder<PayloadItem> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Err(SendError::invalid_body("chunk after end of body"));
        }

        match item {
            // an empty chunk would read as the last chunk
            PayloadItem::Chunk(buffer) if buffer.is_empty() => Ok(()),
            PayloadItem::Chunk(buffer) => {
                dst.reserve(buffer.len() + 12);
                write!((&mut *dst).writer(), "{:X}\r\n", buffer.len())?;
                dst.extend_from_slice(buffer.as_slice());
                dst.extend_from_slice(b"\r\n");
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.extend_from_slice(b"0\r\n\r\n");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Buffer;

    #[test]
    fn encodes_chunks_and_terminator() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Buffer::from("hello world, chunk")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Buffer::empty()), &mut dst).unwrap();
        encoder.encode(PayloadItem::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"12\r\nhello world, chunk\r\n0\r\n\r\n");
        assert!(encoder.encode(PayloadItem::Chunk(Buffer::from("late")), &mut dst).is_err());
    }
}
