//! Request head and the request view handed to handlers.

use http::header::{CONNECTION, EXPECT};

use crate::protocol::body::ReqBody;
use crate::protocol::{Headers, Method, Version};

/// The parsed head of a request: request line plus header fields.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    path: String,
    version: Version,
    headers: Headers,
}

impl RequestHead {
    pub fn new(method: Method, path: impl Into<String>, version: Version, headers: Headers) -> Self {
        Self { method, path: path.into(), version, headers }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target as sent by the client.
    pub fn path(&self) -> &str {
        &self.path
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

    /// Whether the client wants the connection kept open after this exchange.
    ///
    /// HTTP/1.1 persists unless `Connection: close`, HTTP/1.0 only with
    /// `Connection: keep-alive`.
    pub fn is_keep_alive(&self) -> bool {
        match self.version {
            Version::Http11 => !self.headers.has_token(CONNECTION.as_str(), "close"),
            Version::Http10 => self.headers.has_token(CONNECTION.as_str(), "keep-alive"),
        }
    }

    /// Whether the client waits for an interim `100 Continue` before sending the body.
    pub fn expects_continue(&self) -> bool {
        self.version == Version::Http11
            && self.headers.get(EXPECT.as_str()).is_some_and(|value| value.trim().eq_ignore_ascii_case("100-continue"))
    }
}

/// A request as seen by a handler.
///
/// The body is a lazy, forward-only stream. Bytes nobody reads are discarded
/// by the connection once the response is written.
#[derive(Debug)]
pub struct Request {
    head: RequestHead,
    body: ReqBody,
}

impl Request {
    pub fn from_parts(head: RequestHead, body: ReqBody) -> Self {
        Self { head, body }
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn method(&self) -> &Method {
        self.head.method()
    }

    pub fn path(&self) -> &str {
        self.head.path()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &Headers {
        self.head.headers()
    }

    pub fn body_mut(&mut self) -> &mut ReqBody {
        &mut self.body
    }

    pub fn into_body(self) -> ReqBody {
        self.body
    }

    pub fn into_parts(self) -> (RequestHead, ReqBody) {
        (self.head, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(version: Version, headers: &[(&str, &str)]) -> RequestHead {
        RequestHead::new(Method::Get, "/", version, headers.iter().copied().collect())
    }

    #[test]
    fn keep_alive_defaults_per_version() {
        assert!(head(Version::Http11, &[]).is_keep_alive());
        assert!(!head(Version::Http11, &[("Connection", "close")]).is_keep_alive());

        assert!(!head(Version::Http10, &[]).is_keep_alive());
        assert!(head(Version::Http10, &[("connection", "Keep-Alive")]).is_keep_alive());
    }

    #[test]
    fn expect_continue() {
        assert!(head(Version::Http11, &[("Expect", "100-continue")]).expects_continue());
        assert!(!head(Version::Http11, &[("Expect", "something-else")]).expects_continue());
        assert!(!head(Version::Http10, &[("Expect", "100-continue")]).expects_continue());
        assert!(!head(Version::Http11, &[]).expects_continue());
    }

    #[test]
    fn accessors() {
        let request = Request::from_parts(
            RequestHead::new(Method::Post, "/upload?x=1", Version::Http11, [("Host", "localhost")].into_iter().collect()),
            ReqBody::empty(),
        );

        assert_eq!(request.method(), &Method::Post);
        assert_eq!(request.path(), "/upload?x=1");
        assert_eq!(request.version(), Version::Http11);
        assert_eq!(request.headers().get("host"), Some("localhost"));
    }
}
