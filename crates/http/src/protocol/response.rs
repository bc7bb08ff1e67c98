//! Response head, response view and the helpers handlers build responses with.

use std::fmt;

use futures::{Stream, StreamExt};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::StatusCode;
use mime::Mime;

use crate::protocol::body::Body;
use crate::protocol::{BoxError, Buffer, Charset, Headers, Version};

/// Status line and header fields of a response.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    status: u16,
    version: Version,
    headers: Headers,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self { status, version: Version::Http11, headers: Headers::new() }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// The canonical reason phrase of the status code, empty when there is none.
    pub fn reason(&self) -> &'static str {
        StatusCode::from_u16(self.status).ok().and_then(|status| status.canonical_reason()).unwrap_or("")
    }

    /// Informational (1xx) and `204 No Content` responses carry no framing
    /// header fields at all.
    pub fn forbids_framing(&self) -> bool {
        (100..200).contains(&self.status) || self.status == 204
    }

    /// Whether a body may follow this head, false for 1xx, 204 and 304.
    pub fn allows_body(&self) -> bool {
        !self.forbids_framing() && self.status != 304
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self::new(StatusCode::OK.as_u16())
    }
}

/// A response produced by a handler.
///
/// Defaults to status 200, HTTP/1.1 and no header fields. When the headers
/// carry a `Content-Length` the body is sent with that length, otherwise it is
/// chunked on HTTP/1.1 and delimited by closing the connection on HTTP/1.0.
#[derive(Debug, Default)]
pub struct Response {
    head: ResponseHead,
    body: Body,
}

impl Response {
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    pub fn new<B: Into<Body>>(body: B) -> Self {
        Self { head: ResponseHead::default(), body: body.into() }
    }

    /// A response with `status` and no body.
    pub fn with_status(status: u16) -> Self {
        Self::builder().status(status).empty()
    }

    /// A UTF-8 text response with `Content-Length` set to its byte length.
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::builder().text(text)
    }

    /// A binary response with `Content-Length` set.
    pub fn buffer(buffer: Buffer) -> Self {
        Self::builder().buffer(buffer)
    }

    /// A response streaming `stream`, its length is unknown up front.
    pub fn stream<S, B, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Buffer>,
        E: Into<BoxError>,
    {
        Self::builder().stream(stream)
    }

    /// A response streaming text pieces encoded as UTF-8.
    pub fn text_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = String> + Send + 'static,
    {
        Self::builder().text_stream(stream)
    }

    pub fn from_parts(head: ResponseHead, body: Body) -> Self {
        Self { head, body }
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn status(&self) -> u16 {
        self.head.status
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.head.headers
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    pub fn into_parts(self) -> (ResponseHead, Body) {
        (self.head, self.body)
    }
}

#[derive(Debug, Default)]
pub struct ResponseBuilder {
    head: ResponseHead,
}

impl ResponseBuilder {
    pub fn status(mut self, status: u16) -> Self {
        self.head.status = status;
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.head.version = version;
        self
    }

    /// Appends a header field.
    pub fn header<N: Into<String>, V: ToString>(mut self, name: N, value: V) -> Self {
        self.head.headers.add(name, value);
        self
    }

    pub fn content_type(mut self, mime: &Mime) -> Self {
        self.head.headers.replace(CONTENT_TYPE.as_str(), mime);
        self
    }

    pub fn body<B: Into<Body>>(self, body: B) -> Response {
        Response { head: self.head, body: body.into() }
    }

    pub fn empty(self) -> Response {
        self.body(Body::empty())
    }

    pub fn text<S: Into<String>>(self, text: S) -> Response {
        let builder = self.default_content_type(&mime::TEXT_PLAIN_UTF_8);
        builder.buffer(Buffer::from(text.into()))
    }

    /// Encodes `text` with `charset`, `Content-Length` is the encoded byte length.
    pub fn text_with_charset(self, text: &str, charset: Charset) -> Response {
        let builder = match charset {
            Charset::Utf8 => self.default_content_type(&mime::TEXT_PLAIN_UTF_8),
            other => self.default_content_type(&format!("text/plain; charset={}", other.name())),
        };
        builder.buffer(Buffer::encode(text, charset))
    }

    pub fn buffer(mut self, buffer: Buffer) -> Response {
        self.head.headers.replace(CONTENT_LENGTH.as_str(), buffer.len());
        self.body(Body::full(buffer))
    }

    pub fn stream<S, B, E>(self, stream: S) -> Response
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: Into<Buffer>,
        E: Into<BoxError>,
    {
        self.body(Body::from_stream(stream))
    }

    pub fn text_stream<S>(self, stream: S) -> Response
    where
        S: Stream<Item = String> + Send + 'static,
    {
        let builder = self.default_content_type(&mime::TEXT_PLAIN_UTF_8);
        builder.body(Body::from_stream(stream.map(|text| Ok::<_, BoxError>(Buffer::from(text)))))
    }

    fn default_content_type<T: fmt::Display + ?Sized>(mut self, content_type: &T) -> Self {
        if !self.head.headers.contains(CONTENT_TYPE.as_str()) {
            self.head.headers.add(CONTENT_TYPE.as_str(), content_type);
        }
        self
    }
}
