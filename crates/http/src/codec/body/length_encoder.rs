use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::protocol::{PayloadItem, SendError};

/// Encodes a body announced with `Content-Length`.
///
/// Writing more or fewer bytes than announced is an error, the peer could not
/// find the next message boundary otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    remaining: u64,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }
}

impl Encoder<PayloadItem> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(buffer) => {
                let len = buffer.len() as u64;
                if len > self.remaining {
                    return Err(SendError::invalid_body(format!(
                        "body exceeds content-length, {len} bytes written with {} remaining",
                        self.remaining
                    )));
                }

                dst.extend_from_slice(buffer.as_slice());
                self.remaining -= len;
                Ok(())
            }
            PayloadItem::Eof if self.remaining > 0 => {
                Err(SendError::invalid_body(format!("body ended {} bytes short of content-length", self.remaining)))
            }
            PayloadItem::Eof => Ok(()),
        }
    }
}
