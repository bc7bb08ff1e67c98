//! Protocol types shared by the codec, the connection and handlers.
//!
//! - [`Buffer`]: immutable byte buffer carried by every body chunk
//! - [`Headers`], [`Method`], [`Version`]: request and response metadata
//! - [`Request`] / [`RequestHead`]: what a handler receives
//! - [`Response`] / [`ResponseHead`]: what a handler returns
//! - [`body`]: request body bridge and response body
//! - [`Message`], [`PayloadItem`], [`PayloadSize`]: frames exchanged with the codec
//! - [`HttpError`], [`ParseError`], [`SendError`], [`BufferError`]: error types

mod buffer;
pub use buffer::Buffer;
pub use buffer::Charset;

mod headers;
pub use headers::Headers;

mod method;
pub use method::Method;

mod version;
pub use version::Version;

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::Request;
pub use request::RequestHead;

mod response;
pub use response::Response;
pub use response::ResponseBuilder;
pub use response::ResponseHead;

mod error;
pub use error::BoxError;
pub use error::BufferError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
pub use body::Body;
