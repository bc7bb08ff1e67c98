use std::io;
use std::io::ErrorKind;

use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};

/// Streaming response encoder.
///
/// Expects a head, then payload items up to and including
/// [`PayloadItem::Eof`](crate::protocol::PayloadItem::Eof), then the next head.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Encoder<Message<(ResponseHead, PayloadSize)>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize)>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let payload_size = if head.allows_body() { payload_size } else { PayloadSize::Empty };
                self.payload_encoder = Some(payload_size.into());
                self.header_encoder.encode((head, payload_size), dst)
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let is_eof = payload_item.is_eof();
                let result = payload_encoder.encode(payload_item, dst);
                if is_eof {
                    self.payload_encoder = None;
                }

                result
            }
        }
    }
}
