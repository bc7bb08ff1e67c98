use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use http::StatusCode;
use http::header::{CONNECTION, CONTENT_LENGTH};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::handler::LocalHandler;
use crate::protocol::body::ReqBody;
use crate::protocol::{
    BoxError, HttpError, Message, Method, ParseError, PayloadItem, PayloadSize, Request, RequestHead, Response, ResponseHead, SendError,
    Version,
};

/// Default bound on waiting for the next inbound frame.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);

const READ_BUFFER_CAPACITY: usize = 8 * 1024;

type ResponseMessage = Message<(ResponseHead, PayloadSize)>;

/// Drives the request/response exchanges of one connection.
///
/// Requests are processed one at a time, in arrival order. For each request
/// head the connection:
///
/// 1. answers `Expect: 100-continue` with an interim response
/// 2. hands the handler a [`Request`] whose body is fed by a [`BodyBridge`](crate::protocol::body::BodyBridge)
/// 3. writes the handler's [`Response`], flushing after each body chunk
/// 4. discards the part of the request body the handler did not read
///
/// and only then decodes the next head. Reading is always bounded by the read
/// timeout. A malformed head is answered with `400 Bad Request`, a failing
/// handler with `500 Internal Server Error`, and the connection is closed in
/// both cases.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    read_timeout: Duration,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Persistence {
    KeepAlive,
    Close,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), READ_BUFFER_CAPACITY),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Sets how long the connection waits for any inbound frame before closing.
    #[must_use]
    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Processes requests until the peer closes the connection, a response
    /// ends it, or an error occurs.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: LocalHandler,
    {
        loop {
            let Ok(next) = timeout(self.read_timeout, self.framed_read.next()).await else {
                debug!(timeout = ?self.read_timeout, "no request head received in time");
                self.shutdown().await;
                return Err(ParseError::read_timeout(self.read_timeout).into());
            };

            match next {
                Some(Ok(Message::Header(head))) => {
                    if self.do_process(head, handler.as_ref()).await? == Persistence::Close {
                        self.shutdown().await;
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    self.send_error_response(StatusCode::BAD_REQUEST).await;
                    return Err(ParseError::unexpected_frame("header", "payload").into());
                }

                Some(Err(e)) => {
                    if !matches!(e, ParseError::Io { .. }) {
                        self.send_error_response(StatusCode::BAD_REQUEST).await;
                    }
                    return Err(e.into());
                }

                None => {
                    debug!("cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(&mut self, head: RequestHead, handler: &H) -> Result<Persistence, HttpError>
    where
        H: LocalHandler,
    {
        let keep_alive = head.is_keep_alive();
        let context = ResponseContext { version: head.version(), head_request: head.method() == &Method::Head };

        if head.expects_continue() {
            let writer = self.framed_write.get_mut();
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
            writer.flush().await.map_err(SendError::io)?;
            info!("receive expect request header, sent continue response");
        }

        let Self { framed_read, framed_write, read_timeout } = self;
        let (req_body, mut bridge) = ReqBody::body_channel(framed_read, *read_timeout);
        let request = Request::from_parts(head, req_body);

        let exchange = async {
            match handler.call(request).await {
                Ok(response) => {
                    let persistence = write_response(framed_write, response, context, keep_alive).await?;
                    Ok::<_, HttpError>(Ok(persistence))
                }
                Err(e) => {
                    let cause: BoxError = e.into();
                    write_response(framed_write, Response::with_status(500), context, false).await?;
                    Ok(Err(cause))
                }
            }
        };

        // the bridge has to answer body demands while the handler runs,
        // otherwise a handler reading its body would wait forever
        let outcome = {
            let pump = bridge.pump();
            tokio::pin!(exchange, pump);

            let mut pumping = true;
            loop {
                select! {
                    biased;
                    outcome = &mut exchange => break outcome,
                    pumped = &mut pump, if pumping => {
                        pumping = false;
                        pumped?;
                    }
                }
            }
        };

        let persistence = outcome?.map_err(|source| HttpError::Handler { source })?;

        bridge.retire().await?;
        Ok(persistence)
    }

    async fn send_error_response(&mut self, status: StatusCode) {
        let response = Response::with_status(status.as_u16());
        let context = ResponseContext { version: Version::Http11, head_request: false };
        if let Err(e) = write_response(&mut self.framed_write, response, context, false).await {
            debug!(cause = %e, "failed to send error response");
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.framed_write.get_mut().shutdown().await {
            debug!(cause = %e, "failed to shutdown connection");
        }
    }
}

/// What the response writer needs to know about the request it answers.
#[derive(Debug, Copy, Clone)]
struct ResponseContext {
    version: Version,
    head_request: bool,
}

/// Writes `response`: the head is buffered and goes out with the first body
/// chunk, each chunk is flushed before the next one is pulled.
///
/// Responses to HEAD and 1xx, 204 and 304 responses are written without a
/// body, whatever the handler returned.
async fn write_response<W>(
    framed_write: &mut FramedWrite<W, ResponseEncoder>,
    response: Response,
    context: ResponseContext,
    keep_alive: bool,
) -> Result<Persistence, HttpError>
where
    W: AsyncWrite + Unpin,
{
    let (mut head, mut body) = response.into_parts();
    let bodiless = context.head_request || !head.allows_body();

    let payload_size = if bodiless {
        if context.head_request
            && head.headers().content_length().is_none()
            && let Some(length) = body.exact_len()
        {
            head.headers_mut().replace(CONTENT_LENGTH.as_str(), length);
        }
        PayloadSize::Empty
    } else {
        match head.headers().content_length().or_else(|| body.exact_len()) {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None if context.version == Version::Http11 && head.version() == Version::Http11 => PayloadSize::Chunked,
            None => PayloadSize::UntilClose,
        }
    };

    let persistence = if keep_alive && payload_size != PayloadSize::UntilClose && !head.headers().has_token(CONNECTION.as_str(), "close")
    {
        Persistence::KeepAlive
    } else {
        Persistence::Close
    };

    match persistence {
        Persistence::Close => {
            head.headers_mut().replace(CONNECTION.as_str(), "close");
        }
        Persistence::KeepAlive if context.version == Version::Http10 => {
            head.headers_mut().replace(CONNECTION.as_str(), "keep-alive");
        }
        Persistence::KeepAlive => {}
    }

    framed_write.feed(ResponseMessage::Header((head, payload_size))).await?;

    if bodiless {
        debug!("response has no body, skip writing it");
        framed_write.send(ResponseMessage::Payload(PayloadItem::Eof)).await?;
        return Ok(persistence);
    }

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| SendError::invalid_body(format!("resolve response body error: {e}")))?;
        if chunk.is_empty() {
            continue;
        }
        framed_write.send(ResponseMessage::Payload(PayloadItem::Chunk(chunk))).await?;
    }

    framed_write.send(ResponseMessage::Payload(PayloadItem::Eof)).await?;
    Ok(persistence)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::stream;
    use indoc::indoc;
    use tokio::io::{AsyncReadExt, DuplexStream, ReadHalf, WriteHalf, duplex};

    use super::*;
    use crate::handler::make_handler;
    use crate::protocol::{Body, Buffer};

    type Connection = HttpConnection<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

    fn connection() -> (DuplexStream, Connection) {
        let (client, server) = duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);
        (client, HttpConnection::new(reader, writer))
    }

    async fn run<H: LocalHandler>(handler: H, input: &[u8]) -> (Result<(), HttpError>, String) {
        let (mut client, connection) = connection();

        let client_io = async move {
            client.write_all(input).await.unwrap();
            client.shutdown().await.unwrap();
            let mut output = Vec::new();
            client.read_to_end(&mut output).await.unwrap();
            String::from_utf8(output).unwrap()
        };

        tokio::join!(connection.process(Arc::new(handler)), client_io)
    }

    async fn read_exact_string(client: &mut DuplexStream, len: usize) -> String {
        let mut buf = vec![0; len];
        client.read_exact(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }

    async fn hello_world(_request: Request) -> Result<Response, BoxError> {
        Ok(Response::text("Hello World"))
    }

    #[tokio::test]
    async fn hello_world_response() {
        let (result, output) = run(make_handler(hello_world), b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        result.unwrap();
        assert_eq!(output, "HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: 11\r\n\r\nHello World");
    }

    #[tokio::test]
    async fn pipelined_requests_are_processed_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);
        let handler = make_handler(move |request: Request| {
            let log = Arc::clone(&handler_log);
            async move {
                let path = request.path().to_string();
                log.lock().unwrap().push(format!("start {path}"));
                let body = request.into_body().collect().await?;
                tokio::task::yield_now().await;
                log.lock().unwrap().push(format!("end {path}"));
                Ok::<_, BoxError>(Response::text(format!("{path}:{}", body.len())))
            }
        });

        let input = indoc! {"
            POST /a HTTP/1.1
            Content-Length: 3

            abcGET /b HTTP/1.1
            Host: localhost

        "};
        let (result, output) = run(handler, input.as_bytes()).await;

        result.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["start /a", "end /a", "start /b", "end /b"]);

        let first = output.find("/a:3").unwrap();
        let second = output.find("/b:0").unwrap();
        assert!(first < second);
        assert_eq!(output.matches("HTTP/1.1 200 OK").count(), 2);
    }

    #[tokio::test]
    async fn unread_body_is_drained_after_the_response() {
        let (mut client, connection) = connection();
        let handler = make_handler(|request: Request| async move { Ok::<_, BoxError>(Response::text(request.path().to_string())) });

        let client_io = async move {
            client.write_all(b"POST /upload HTTP/1.1\r\nContent-Length: 10\r\n\r\n").await.unwrap();

            // the response arrives before any body byte was sent
            let expected = "HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: 7\r\n\r\n/upload";
            assert_eq!(read_exact_string(&mut client, expected.len()).await, expected);

            client.write_all(b"0123456789GET /next HTTP/1.1\r\n\r\n").await.unwrap();
            client.shutdown().await.unwrap();

            let mut rest = String::new();
            client.read_to_string(&mut rest).await.unwrap();
            rest
        };

        let (result, rest) = tokio::join!(connection.process(Arc::new(handler)), client_io);

        result.unwrap();
        assert!(rest.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(rest.ends_with("\r\n\r\n/next"));
    }

    #[tokio::test]
    async fn no_content_body_is_not_written() {
        let handler = make_handler(|request: Request| async move {
            let response = match request.path() {
                "/with-body" => Response::builder().status(204).text("x"),
                "/empty" => Response::with_status(204),
                path => Response::text(path.to_string()),
            };
            Ok::<_, BoxError>(response)
        });

        let input = "GET /with-body HTTP/1.1\r\n\r\nGET /empty HTTP/1.1\r\n\r\nGET /next HTTP/1.1\r\n\r\n";
        let (result, output) = run(handler, input.as_bytes()).await;

        result.unwrap();
        let expected = concat!(
            "HTTP/1.1 204 No Content\r\ncontent-type: text/plain; charset=utf-8\r\n\r\n",
            "HTTP/1.1 204 No Content\r\n\r\n",
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: 5\r\n\r\n/next",
        );
        assert_eq!(output, expected);
    }

    #[tokio::test]
    async fn head_request_gets_headers_only() {
        let input = "HEAD / HTTP/1.1\r\n\r\nGET / HTTP/1.1\r\n\r\n";
        let (result, output) = run(make_handler(hello_world), input.as_bytes()).await;

        result.unwrap();
        let head = "HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: 11\r\n\r\n";
        assert_eq!(output, format!("{head}{head}Hello World"));
    }

    #[tokio::test]
    async fn head_request_advertises_known_length() {
        let handler = make_handler(|_request: Request| async {
            Ok::<_, BoxError>(Response::new(Body::full(Buffer::from("four"))))
        });
        let (result, output) = run(handler, b"HEAD /file HTTP/1.1\r\n\r\n").await;

        result.unwrap();
        assert_eq!(output, "HTTP/1.1 200 OK\r\ncontent-length: 4\r\n\r\n");
    }

    #[tokio::test]
    async fn malformed_head_gets_bad_request() {
        let (result, output) = run(make_handler(hello_world), b"GARBAGE\r\n\r\n").await;

        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::InvalidHeader { .. } })));
        assert_eq!(output, "HTTP/1.1 400 Bad Request\r\nconnection: close\r\ncontent-length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn handler_failure_gets_internal_server_error() {
        let handler = make_handler(|_request: Request| async { Err::<Response, _>(io::Error::other("database down")) });
        let (result, output) =
            run(handler, b"GET /first HTTP/1.1\r\n\r\nGET /second HTTP/1.1\r\n\r\n").await;

        match result {
            Err(HttpError::Handler { source }) => assert_eq!(source.to_string(), "database down"),
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(output, "HTTP/1.1 500 Internal Server Error\r\nconnection: close\r\ncontent-length: 0\r\n\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_connection_times_out() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = Arc::clone(&calls);
        let handler = make_handler(move |_request: Request| {
            handler_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, BoxError>(Response::default()) }
        });

        let (mut client, connection) = connection();
        let client_io = async move {
            // never send anything, keep the stream open until the server gives up
            let mut output = Vec::new();
            client.read_to_end(&mut output).await.unwrap();
            output
        };

        let (result, output) = tokio::join!(connection.read_timeout(Duration::from_secs(5)).process(Arc::new(handler)), client_io);

        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::ReadTimeout { .. } })));
        assert!(output.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_body_times_out() {
        let handler = make_handler(|request: Request| async move {
            let body = request.into_body().collect().await?;
            Ok::<_, BoxError>(Response::buffer(body))
        });

        let (mut client, connection) = connection();
        let client_io = async move {
            client.write_all(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n012").await.unwrap();
            let mut output = Vec::new();
            client.read_to_end(&mut output).await.unwrap();
            output
        };

        let (result, _) = tokio::join!(connection.process(Arc::new(handler)), client_io);
        assert!(matches!(result, Err(HttpError::RequestError { source: ParseError::ReadTimeout { .. } })));
    }

    #[tokio::test]
    async fn expect_continue_before_body() {
        let (mut client, connection) = connection();
        let handler = make_handler(|request: Request| async move {
            let body = request.into_body().collect().await?;
            Ok::<_, BoxError>(Response::buffer(body))
        });

        let client_io = async move {
            client.write_all(b"PUT /file HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 5\r\n\r\n").await.unwrap();

            let interim = "HTTP/1.1 100 Continue\r\n\r\n";
            assert_eq!(read_exact_string(&mut client, interim.len()).await, interim);

            client.write_all(b"hello").await.unwrap();
            client.shutdown().await.unwrap();
            let mut rest = String::new();
            client.read_to_string(&mut rest).await.unwrap();
            rest
        };

        let (result, rest) = tokio::join!(connection.process(Arc::new(handler)), client_io);

        result.unwrap();
        assert_eq!(rest, "HTTP/1.1 200 OK\r\ncontent-length: 5\r\n\r\nhello");
    }

    #[tokio::test]
    async fn streamed_response_is_chunked() {
        let handler = make_handler(|_request: Request| async {
            let pieces = vec!["Hello".to_string(), String::new(), " World".to_string()];
            Ok::<_, BoxError>(Response::text_stream(stream::iter(pieces)))
        });

        let (result, output) = run(handler, b"GET / HTTP/1.1\r\n\r\n").await;

        result.unwrap();
        assert_eq!(
            output,
            "HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ntransfer-encoding: chunked\r\n\r\n5\r\nHello\r\n6\r\n World\r\n0\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn http10_without_keep_alive_closes() {
        let handler = make_handler(|_request: Request| async {
            let chunks = vec![Ok::<_, io::Error>(Buffer::from("streamed"))];
            Ok::<_, BoxError>(Response::stream(stream::iter(chunks)))
        });

        // the second request is never processed
        let (result, output) = run(handler, b"GET / HTTP/1.0\r\n\r\nGET / HTTP/1.0\r\n\r\n").await;

        result.unwrap();
        assert_eq!(output, "HTTP/1.1 200 OK\r\nconnection: close\r\n\r\nstreamed");
    }

    #[tokio::test]
    async fn http10_keep_alive() {
        let (result, output) =
            run(make_handler(hello_world), b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\nGET / HTTP/1.0\r\n\r\n").await;

        result.unwrap();
        assert_eq!(output.matches("Hello World").count(), 2);
        assert_eq!(output.matches("connection: keep-alive\r\n").count(), 1);
        assert!(output.ends_with("connection: close\r\n\r\nHello World"));
    }

    #[tokio::test]
    async fn echo_chunked_body() {
        let handler = make_handler(|request: Request| async move { Ok::<_, BoxError>(Response::new(Body::from(request.into_body()))) });

        let (result, output) =
            run(handler, b"POST /echo HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n").await;

        result.unwrap();
        assert!(output.starts_with("HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n"));
        assert!(output.ends_with("\r\n0\r\n\r\n"));
        assert!(output.contains("abc"));
        assert!(output.contains("de"));
    }

    #[tokio::test]
    async fn client_close_is_clean() {
        let (result, output) = run(make_handler(hello_world), b"").await;
        result.unwrap();
        assert!(output.is_empty());
    }
}
