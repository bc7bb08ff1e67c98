use std::cmp;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{Buffer, ParseError, PayloadItem};

/// Decodes a body of known length, yielding whatever part of it is buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    length: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.length, src.len() as u64) as usize;
        let bytes = src.split_to(len).freeze();

        self.length -= len as u64;
        Ok(Some(PayloadItem::Chunk(Buffer::from(bytes))))
    }
}
