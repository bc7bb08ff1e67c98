//! Streaming request decoder.
//!
//! Alternates between decoding a request head and decoding the body that
//! follows it. Every head is followed by payload items ending with
//! [`PayloadItem::Eof`], even when the request has no body.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, RequestHead};

#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<RequestHead>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder = None;
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((head, payload_size)) => {
                self.payload_decoder = Some(payload_size.into());
                Some(Message::Header(head))
            }
            None => None,
        };

        Ok(message)
    }
}
