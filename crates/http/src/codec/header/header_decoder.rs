//! Decoder for request heads.
//!
//! Parses the request line and header fields with `httparse` and decides how
//! the body that follows is framed.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum head size: 8KB
//! - Only HTTP/1.0 and HTTP/1.1

use bytes::{Buf, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{Headers, Method, ParseError, PayloadSize, RequestHead, Version};

const MAX_HEADER_NUM: usize = 64;

const MAX_HEADER_BYTES: usize = 8 * 1024;

#[derive(Debug, Default)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHead, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_result = req.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(head_size = body_offset, "parsed request head");
                ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

                let version = Version::try_from(req.version.ok_or(ParseError::InvalidVersion(None))?)?;
                let method = Method::from(req.method.ok_or(ParseError::InvalidMethod)?);
                let path = req.path.ok_or(ParseError::InvalidUri)?.to_string();

                let mut header_fields = Headers::with_capacity(req.headers.len());
                for header in req.headers.iter() {
                    header_fields.add(header.name, String::from_utf8_lossy(header.value));
                }

                let head = RequestHead::new(method, path, version, header_fields);
                let payload_size = parse_payload(&head)?;

                src.advance(body_offset);
                Ok(Some((head, payload_size)))
            }
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }
}

/// Decides the request body framing, see <https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length>.
fn parse_payload(head: &RequestHead) -> Result<PayloadSize, ParseError> {
    let headers = head.headers();
    let te_value = headers.get(TRANSFER_ENCODING.as_str());
    let mut cl_values = headers.get_all(CONTENT_LENGTH.as_str());

    match (te_value, cl_values.next()) {
        (None, None) => Ok(PayloadSize::Empty),

        (Some(te_value), None) => {
            if is_chunked(te_value) {
                Ok(PayloadSize::Chunked)
            } else {
                Err(ParseError::invalid_body(format!("unsupported transfer-encoding: {te_value}")))
            }
        }

        (None, Some(cl_value)) => {
            let length = cl_value
                .trim()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid_content_length(format!("value {cl_value} is not u64")))?;

            ensure!(
                cl_values.all(|other| other.trim() == cl_value.trim()),
                ParseError::invalid_content_length("conflicting values")
            );

            Ok(if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) })
        }

        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers")),
    }
}

fn is_chunked(value: &str) -> bool {
    value.rsplit(',').next().is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn decode(text: &str) -> Result<Option<(RequestHead, PayloadSize)>, ParseError> {
        HeaderDecoder.decode(&mut BytesMut::from(text))
    }

    #[test]
    fn check_is_chunked() {
        assert!(is_chunked("chunked"));
        assert!(is_chunked("gzip, Chunked"));
        assert!(!is_chunked("chunked, gzip"));
        assert!(!is_chunked("gzip"));
    }

    #[test]
    fn leaves_body_in_buffer() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        123"##};

        let mut bytes = BytesMut::from(str);
        let result = HeaderDecoder.decode(&mut bytes).unwrap();

        assert!(result.is_some());
        assert_eq!(&bytes[..], &b"123"[..]);
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let (head, payload_size) = decode(str).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert_eq!(head.method(), &Method::Get);
        assert_eq!(head.version(), Version::Http11);
        assert_eq!(head.path(), "/index.html");
        assert_eq!(head.headers().len(), 3);
        assert_eq!(head.headers().get("accept"), Some("*/*"));
        assert_eq!(head.headers().get("host"), Some("127.0.0.1:8080"));
        assert_eq!(head.headers().get("user-agent"), Some("curl/7.79.1"));
    }

    #[test]
    fn from_edge() {
        let str = indoc! {r##"
        GET /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        Connection: keep-alive
        Cache-Control: max-age=0
        sec-ch-ua: "#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109"
        sec-ch-ua-mobile: ?0
        sec-ch-ua-platform: "macOS"
        Upgrade-Insecure-Requests: 1
        Accept-Encoding: gzip, deflate, br
        Accept-Language: zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7

        "##};

        let (head, _) = decode(str).unwrap().unwrap();

        assert_eq!(head.path(), "/index/?a=1&b=2&a=3");
        assert_eq!(head.headers().len(), 9);
        assert_eq!(head.headers().get("connection"), Some("keep-alive"));
        assert_eq!(head.headers().get("sec-ch-ua"), Some(r##""#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109""##));
        assert_eq!(head.headers().get("Sec-Ch-Ua-Platform"), Some("\"macOS\""));
        assert!(head.is_keep_alive());
    }

    #[test]
    fn body_framing() {
        let (head, payload_size) = decode("POST /upload HTTP/1.1\r\nContent-Length: 5\r\n\r\n").unwrap().unwrap();
        assert_eq!(head.method(), &Method::Post);
        assert_eq!(payload_size, PayloadSize::Length(5));

        let (_, payload_size) = decode("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n").unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Chunked);

        let (_, payload_size) = decode("GET / HTTP/1.0\r\nContent-Length: 0\r\n\r\n").unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Empty);

        // a body on GET is still framed and must be read
        let (_, payload_size) = decode("GET / HTTP/1.1\r\nContent-Length: 3\r\n\r\n").unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Length(3));
    }

    #[test]
    fn invalid_framing() {
        let both = decode("POST / HTTP/1.1\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\n");
        assert!(matches!(both, Err(ParseError::InvalidContentLength { .. })));

        let not_a_number = decode("POST / HTTP/1.1\r\nContent-Length: five\r\n\r\n");
        assert!(matches!(not_a_number, Err(ParseError::InvalidContentLength { .. })));

        let conflicting = decode("POST / HTTP/1.1\r\nContent-Length: 5\r\nContent-Length: 6\r\n\r\n");
        assert!(matches!(conflicting, Err(ParseError::InvalidContentLength { .. })));

        let gzip_only = decode("POST / HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\n");
        assert!(matches!(gzip_only, Err(ParseError::InvalidBody { .. })));
    }

    #[test]
    fn partial_head_waits_for_more() {
        assert!(decode("GET /index.html HTTP/1.1\r\nHost: loc").unwrap().is_none());
        assert!(decode("").unwrap().is_none());
    }

    #[test]
    fn limits() {
        let mut many = String::from("GET / HTTP/1.1\r\n");
        for i in 0..=MAX_HEADER_NUM {
            many.push_str(&format!("x-header-{i}: {i}\r\n"));
        }
        many.push_str("\r\n");
        assert!(matches!(decode(&many), Err(ParseError::TooManyHeaders { .. })));

        let large = format!("GET / HTTP/1.1\r\nx-large: {}\r\n", "a".repeat(MAX_HEADER_BYTES));
        assert!(matches!(decode(&large), Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn malformed_request_line() {
        assert!(matches!(decode("GET / FTP/1.1\r\n\r\n"), Err(ParseError::InvalidHeader { .. })));
    }
}
