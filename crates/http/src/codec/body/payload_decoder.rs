use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

/// Decodes a request body according to its framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),

    Chunked(ChunkedDecoder),

    NoBody,
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new()) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }
}

/// A request can't be delimited by closing the connection, so `UntilClose`
/// decodes as no body.
impl From<PayloadSize> for PayloadDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(size) => PayloadDecoder::fix_length(size),
            PayloadSize::Chunked => PayloadDecoder::chunked(),
            PayloadSize::Empty | PayloadSize::UntilClose => PayloadDecoder::empty(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}
