use std::error::Error;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by handlers and response body streams.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("handler error: {source}")]
    Handler { source: BoxError },
}

impl HttpError {
    pub fn handler<E: Into<BoxError>>(e: E) -> Self {
        Self::Handler { source: e.into() }
    }

    /// Returns true when the error only means the peer went away or stopped
    /// talking, the connection is closed without logging it as a failure.
    pub fn is_disconnect(&self) -> bool {
        match self {
            HttpError::RequestError { source } => matches!(source, ParseError::Io { .. } | ParseError::ReadTimeout { .. }),
            HttpError::ResponseError { source } => matches!(source, SendError::Io { .. }),
            HttpError::Handler { .. } => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("unexpected frame, expect {expected} but received {received}")]
    UnexpectedFrame { expected: &'static str, received: &'static str },

    #[error("no data received within {timeout:?}")]
    ReadTimeout { timeout: Duration },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn unexpected_frame(expected: &'static str, received: &'static str) -> Self {
        Self::UnexpectedFrame { expected, received }
    }

    pub fn read_timeout(timeout: Duration) -> Self {
        Self::ReadTimeout { timeout }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// The io variant can't be cloned as is, its copy keeps the kind and the message.
impl Clone for ParseError {
    fn clone(&self) -> Self {
        match self {
            Self::TooLargeHeader { current_size, max_size } => Self::too_large_header(*current_size, *max_size),
            Self::TooManyHeaders { max_num } => Self::too_many_headers(*max_num),
            Self::InvalidHeader { reason } => Self::invalid_header(reason),
            Self::InvalidVersion(version) => Self::InvalidVersion(*version),
            Self::InvalidMethod => Self::InvalidMethod,
            Self::InvalidUri => Self::InvalidUri,
            Self::InvalidContentLength { reason } => Self::invalid_content_length(reason),
            Self::InvalidBody { reason } => Self::invalid_body(reason),
            Self::UnexpectedFrame { expected, received } => Self::unexpected_frame(*expected, *received),
            Self::ReadTimeout { timeout } => Self::read_timeout(*timeout),
            Self::Io { source } => Self::io(io::Error::new(source.kind(), source.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: &'static str },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(name: S, reason: &'static str) -> Self {
        Self::InvalidHeader { name: name.to_string(), reason }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("invalid range: offset {offset} and length {length} exceed the source size {total}")]
    InvalidRange { offset: usize, length: usize, total: usize },

    #[error("insufficient capacity: {needed} bytes needed but only {capacity} available")]
    InsufficientCapacity { capacity: usize, needed: usize },
}

impl BufferError {
    pub fn invalid_range(offset: usize, length: usize, total: usize) -> Self {
        Self::InvalidRange { offset, length, total }
    }

    pub fn insufficient_capacity(capacity: usize, needed: usize) -> Self {
        Self::InsufficientCapacity { capacity, needed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnects_are_recognized() {
        let reset = HttpError::from(ParseError::io(io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(reset.is_disconnect());

        let timeout = HttpError::from(ParseError::read_timeout(Duration::from_secs(1)));
        assert!(timeout.is_disconnect());

        let broken_pipe = HttpError::from(SendError::io(io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(broken_pipe.is_disconnect());

        assert!(!HttpError::from(ParseError::unexpected_frame("payload", "header")).is_disconnect());
        assert!(!HttpError::handler("boom").is_disconnect());
    }

    #[test]
    fn clone_keeps_io_kind() {
        let error = ParseError::io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        match error.clone() {
            ParseError::Io { source } => {
                assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof);
                assert_eq!(source.to_string(), "eof");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
