//! Request and response bodies.
//!
//! Both directions carry a body as a stream of [`Buffer`] chunks:
//!
//! - [`ReqBody`]: the request body handed to handlers. It pulls chunks from
//!   the connection on demand through a [`BodyBridge`], so nothing is read from
//!   the socket before the handler asks for it.
//! - [`Body`]: the response body returned by handlers. It is either empty, a
//!   single buffer, or an arbitrary stream of buffers.

mod req_body;

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::protocol::{BoxError, Buffer};

pub use req_body::BodyBridge;
pub use req_body::ReqBody;

/// A response body.
pub struct Body {
    kind: Kind,
}

enum Kind {
    Empty,
    Full(Option<Buffer>),
    Stream(BoxStream<'static, Result<Buffer, BoxError>>),
}

impl Body {
    pub fn empty() -> Self {
        Self { kind: Kind::Empty }
    }

    pub fn full(buffer: Buffer) -> Self {
        if buffer.is_empty() { Self::empty() } else { Self { kind: Kind::Full(Some(buffer)) } }
    }

    pub fn from_stream<S, B, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Buffer>,
        E: Into<BoxError>,
    {
        let stream = stream.map(|item| item.map(Into::into).map_err(Into::into));
        Self { kind: Kind::Stream(stream.boxed()) }
    }

    /// The number of bytes the body will yield, when known up front.
    pub fn exact_len(&self) -> Option<u64> {
        match &self.kind {
            Kind::Empty | Kind::Full(None) => Some(0),
            Kind::Full(Some(buffer)) => Some(buffer.len() as u64),
            Kind::Stream(_) => None,
        }
    }

    /// Reads the whole body into a single buffer.
    pub async fn collect(mut self) -> Result<Buffer, BoxError> {
        match &mut self.kind {
            Kind::Empty => Ok(Buffer::empty()),
            Kind::Full(buffer) => Ok(buffer.take().unwrap_or_default()),
            Kind::Stream(_) => concat(self).await,
        }
    }
}

impl Stream for Body {
    type Item = Result<Buffer, BoxError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.kind {
            Kind::Empty => Poll::Ready(None),
            Kind::Full(buffer) => Poll::Ready(buffer.take().map(Ok)),
            Kind::Stream(stream) => stream.poll_next_unpin(cx),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Empty => f.write_str("Body::Empty"),
            Kind::Full(buffer) => f.debug_tuple("Body::Full").field(buffer).finish(),
            Kind::Stream(_) => f.write_str("Body::Stream"),
        }
    }
}

impl From<Buffer> for Body {
    fn from(buffer: Buffer) -> Self {
        Self::full(buffer)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::full(Buffer::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::full(Buffer::from(text))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::full(Buffer::adopt(bytes))
    }
}

/// Streams a request body straight back out, e.g. for an echo handler.
impl From<ReqBody> for Body {
    fn from(body: ReqBody) -> Self {
        Self::from_stream(body)
    }
}

/// Concatenates every chunk of `stream`. A single chunk is returned as is.
pub(crate) async fn concat<S, E>(mut stream: S) -> Result<Buffer, E>
where
    S: Stream<Item = Result<Buffer, E>> + Unpin,
{
    let Some(first) = stream.next().await.transpose()? else {
        return Ok(Buffer::empty());
    };

    let Some(second) = stream.next().await.transpose()? else {
        return Ok(first);
    };

    let mut collected = BytesMut::with_capacity(first.len() + second.len());
    collected.extend_from_slice(first.as_slice());
    collected.extend_from_slice(second.as_slice());
    while let Some(chunk) = stream.next().await.transpose()? {
        collected.extend_from_slice(chunk.as_slice());
    }

    Ok(Buffer::from(collected.freeze()))
}
