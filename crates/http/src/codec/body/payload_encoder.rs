use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::protocol::{PayloadItem, PayloadSize, SendError};

/// Encodes a response body according to its framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthEncoder),

    Chunked(ChunkedEncoder),

    /// Raw bytes, the end of body is signalled by closing the connection
    UntilClose,
}

impl PayloadEncoder {
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedEncoder::new()) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthEncoder::new(size)) }
    }

    pub fn until_close() -> Self {
        Self { kind: Kind::UntilClose }
    }
}

impl From<PayloadSize> for PayloadEncoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(size) => PayloadEncoder::fix_length(size),
            PayloadSize::Chunked => PayloadEncoder::chunked(),
            PayloadSize::Empty => PayloadEncoder::fix_length(0),
            PayloadSize::UntilClose => PayloadEncoder::until_close(),
        }
    }
}

impl Encoder<PayloadItem> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match &mut self.kind {
            Kind::Length(encoder) => encoder.encode(item, dst),
            Kind::Chunked(encoder) => encoder.encode(item, dst),
            Kind::UntilClose => {
                if let PayloadItem::Chunk(buffer) = item {
                    dst.extend_from_slice(buffer.as_slice());
                }
                Ok(())
            }
        }
    }
}
