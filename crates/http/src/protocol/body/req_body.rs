use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use futures::channel::{mpsc, oneshot};
use futures::{FutureExt, SinkExt, Stream, StreamExt};
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::protocol::body::concat;
use crate::protocol::{Buffer, Message, ParseError, PayloadItem, RequestHead};

type Delivery = Result<PayloadItem, ParseError>;

/// A slot the consumer hands to the bridge, the bridge fills it with exactly one item.
type Slot = oneshot::Sender<Delivery>;

/// The request body as a lazy, forward-only stream of [`Buffer`]s.
///
/// Every pull first hands a demand to the connection side ([`BodyBridge`]),
/// then waits for the single chunk the bridge reads in answer. At most one
/// demand is pending and one chunk in transit at any time, so the socket is
/// never read ahead of the consumer.
///
/// The stream ends after the last chunk, or cleanly when the bridge went away
/// without delivering anything. Decode errors and read timeouts are yielded
/// as errors, after which the stream is done.
#[derive(Debug)]
pub struct ReqBody {
    demand: Option<mpsc::Sender<Slot>>,
    receiving: Option<oneshot::Receiver<Delivery>>,
}

impl ReqBody {
    /// A body with no content.
    pub fn empty() -> Self {
        Self { demand: None, receiving: None }
    }

    /// Creates a body together with the bridge that feeds it from `payload_stream`.
    ///
    /// Waiting for any frame is bounded by `read_timeout`.
    pub fn body_channel<S>(payload_stream: &mut S, read_timeout: Duration) -> (ReqBody, BodyBridge<'_, S>)
    where
        S: Stream + Unpin,
    {
        let (tx, rx) = mpsc::channel(0);

        let req_body = ReqBody { demand: Some(tx), receiving: None };
        let bridge = BodyBridge { payload_stream, demand: rx, eof: false, read_timeout };

        (req_body, bridge)
    }

    /// Reads the whole body into a single buffer.
    pub async fn collect(self) -> Result<Buffer, ParseError> {
        concat(self).await
    }

    fn finish(&mut self) {
        self.demand = None;
        self.receiving = None;
    }
}

impl Stream for ReqBody {
    type Item = Result<Buffer, ParseError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(receiving) = &mut self.receiving {
                let delivery = ready!(receiving.poll_unpin(cx));
                self.receiving = None;

                match delivery {
                    Ok(Ok(PayloadItem::Chunk(buffer))) if buffer.is_empty() => continue,
                    Ok(Ok(PayloadItem::Chunk(buffer))) => return Poll::Ready(Some(Ok(buffer))),
                    Ok(Ok(PayloadItem::Eof)) | Err(oneshot::Canceled) => {
                        self.finish();
                        return Poll::Ready(None);
                    }
                    Ok(Err(e)) => {
                        self.finish();
                        return Poll::Ready(Some(Err(e)));
                    }
                }
            }

            let Some(demand) = &mut self.demand else {
                return Poll::Ready(None);
            };

            let sent = match ready!(demand.poll_ready_unpin(cx)) {
                Ok(()) => {
                    let (tx, rx) = oneshot::channel();
                    demand.start_send(tx).map(|()| rx)
                }
                Err(e) => Err(e),
            };

            match sent {
                Ok(rx) => self.receiving = Some(rx),
                Err(_disconnected) => {
                    self.finish();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

/// The connection side of a [`ReqBody`].
///
/// The bridge owns the connection's inbound frame stream for the duration of
/// one request. [`pump`](Self::pump) answers demands by reading one payload
/// frame each, [`retire`](Self::retire) discards whatever the handler left
/// unread so the next request head can be decoded.
pub struct BodyBridge<'conn, S>
where
    S: Stream + Unpin,
{
    payload_stream: &'conn mut S,
    demand: mpsc::Receiver<Slot>,
    eof: bool,
    read_timeout: Duration,
}

impl<S> BodyBridge<'_, S>
where
    S: Stream<Item = Result<Message<RequestHead>, ParseError>> + Unpin,
{
    /// Serves demands until the end of body was delivered or the consumer went away.
    ///
    /// An error is handed to the waiting consumer and returned, the
    /// connection can't be used afterwards.
    pub async fn pump(&mut self) -> Result<(), ParseError> {
        while !self.eof {
            let Some(slot) = self.demand.next().await else {
                trace!("request body dropped before end of body");
                return Ok(());
            };

            match self.next_payload().await {
                Ok(item) => {
                    if slot.send(Ok(item)).is_err() {
                        trace!("request body consumer gone, chunk discarded");
                    }
                }
                Err(e) => {
                    debug!(cause = %e, "failed to read request body");
                    let _ = slot.send(Err(e.clone()));
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Completes the bridge: refuses further demands and discards the rest of the body.
    ///
    /// Returns once the end of body was read, at which point the frame stream
    /// is positioned at the next request head.
    pub async fn retire(mut self) -> Result<(), ParseError> {
        self.demand.close();

        let mut size: usize = 0;
        while !self.eof {
            if let PayloadItem::Chunk(buffer) = self.next_payload().await? {
                size += buffer.len();
            }
        }

        if size > 0 {
            info!(size = size, "skip request body");
        }
        Ok(())
    }

    async fn next_payload(&mut self) -> Result<PayloadItem, ParseError> {
        let read_timeout = self.read_timeout;
        let frame = timeout(read_timeout, self.payload_stream.next())
            .await
            .map_err(|_elapsed| ParseError::read_timeout(read_timeout))?;

        match frame {
            Some(Ok(Message::Payload(item))) => {
                if item.is_eof() {
                    self.eof = true;
                }
                Ok(item)
            }
            Some(Ok(Message::Header(_))) => Err(ParseError::unexpected_frame("payload", "header")),
            Some(Err(e)) => Err(e),
            None => Err(ParseError::invalid_body("connection closed before end of body")),
        }
    }
}

impl<S: Stream + Unpin> fmt::Debug for BodyBridge<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyBridge").field("eof", &self.eof).field("read_timeout", &self.read_timeout).finish_non_exhaustive()
    }
}
