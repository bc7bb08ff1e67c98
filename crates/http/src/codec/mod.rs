//! Wire codec for HTTP/1.x, plugged into `tokio_util`'s `FramedRead` / `FramedWrite`.
//!
//! - [`RequestDecoder`]: bytes into request heads followed by body items
//! - [`ResponseEncoder`]: response heads and body items into bytes
//!
//! Body framing lives in the private `body` module, head parsing and writing
//! in the `header` module.
//!
//! # Example
//!
//! ```no_run
//! use shuttle_http::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("GET / HTTP/1.1\r\n\r\n");
//! let head = decoder.decode(&mut buffer);
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
