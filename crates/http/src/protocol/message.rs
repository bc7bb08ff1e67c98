use crate::protocol::Buffer;

/// A frame produced by the request decoder or consumed by the response encoder.
///
/// `T` is the head type of the message: [`RequestHead`](crate::protocol::RequestHead)
/// on the decoding side, a `(ResponseHead, PayloadSize)` pair on the encoding side.
#[derive(Debug)]
pub enum Message<T> {
    /// The head of a message
    Header(T),
    /// A chunk of payload data or the end of body marker
    Payload(PayloadItem),
}

/// An item of the payload stream, either a chunk of data or the end of body marker.
#[derive(Debug, Clone)]
pub enum PayloadItem {
    Chunk(Buffer),
    Eof,
}

/// How a payload is framed on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Payload with known length in bytes
    Length(u64),
    /// Payload using chunked transfer encoding
    Chunked,
    /// No payload
    Empty,
    /// Payload delimited by closing the connection, only valid for responses
    UntilClose,
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

impl<T> Message<T> {
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    /// Converts the message into a [`PayloadItem`], `None` for a head.
    pub fn into_payload_item(self) -> Option<PayloadItem> {
        match self {
            Message::Header(_) => None,
            Message::Payload(payload_item) => Some(payload_item),
        }
    }
}

impl<T> From<Buffer> for Message<T> {
    fn from(buffer: Buffer) -> Self {
        Self::Payload(PayloadItem::Chunk(buffer))
    }
}

impl PayloadItem {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    pub fn as_buffer(&self) -> Option<&Buffer> {
        match self {
            PayloadItem::Chunk(buffer) => Some(buffer),
            PayloadItem::Eof => None,
        }
    }

    pub fn into_buffer(self) -> Option<Buffer> {
        match self {
            PayloadItem::Chunk(buffer) => Some(buffer),
            PayloadItem::Eof => None,
        }
    }
}
