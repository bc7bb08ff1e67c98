//! A demand-driven HTTP/1.x engine.
//!
//! This crate turns a pair of async byte streams into a sequence of
//! request/response exchanges. Request bodies are never buffered by the
//! engine: bytes are read from the connection only when the handler asks for
//! the next chunk, and whatever the handler leaves unread is discarded before
//! the next request head is decoded.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//! use shuttle_http::connection::HttpConnection;
//! use shuttle_http::handler::make_handler;
//! use shuttle_http::protocol::{BoxError, Request, Response};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(echo));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             if let Err(e) = HttpConnection::new(reader, writer).process(handler).await {
//!                 error!(cause = %e, "connection closed with error");
//!             }
//!         });
//!     }
//! }
//!
//! async fn echo(request: Request) -> Result<Response, BoxError> {
//!     info!(path = request.path(), "receive request");
//!     let body = request.into_body().collect().await?;
//!     Ok(Response::buffer(body))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`protocol`]: buffers, header fields, request and response views, bodies and errors
//! - [`codec`]: the wire codec, request heads and body framing in, responses out
//! - [`connection`]: the per-connection request lifecycle
//! - [`handler`]: the handler traits and [`handler::make_handler`]
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
