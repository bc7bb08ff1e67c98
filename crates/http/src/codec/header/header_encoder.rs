use std::io::{self, Write};

use bytes::{BufMut, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use tokio_util::codec::Encoder;

use crate::protocol::{PayloadSize, ResponseHead, SendError};

const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Writes the status line and header fields of a response.
///
/// The framing header matching `PayloadSize` replaces whatever the handler set.
/// 1xx and 204 responses go out without any framing header. A bodiless head
/// of a 304 or of a HEAD exchange keeps the `Content-Length` the handler set.
#[derive(Debug, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {:03} {}\r\n", head.version(), head.status(), head.reason())?;

        let forbids_framing = head.forbids_framing();
        let allows_body = head.allows_body();
        let headers = head.headers_mut();
        match payload_size {
            _ if forbids_framing => {
                headers.remove(TRANSFER_ENCODING.as_str());
                headers.remove(CONTENT_LENGTH.as_str());
            }
            PayloadSize::Length(n) => {
                headers.remove(TRANSFER_ENCODING.as_str());
                headers.replace(CONTENT_LENGTH.as_str(), n);
            }
            PayloadSize::Chunked => {
                headers.remove(CONTENT_LENGTH.as_str());
                headers.replace(TRANSFER_ENCODING.as_str(), "chunked");
            }
            PayloadSize::Empty if !allows_body => {
                headers.remove(TRANSFER_ENCODING.as_str());
            }
            PayloadSize::Empty => {
                headers.remove(TRANSFER_ENCODING.as_str());
                if headers.content_length().unwrap_or(0) == 0 {
                    headers.replace(CONTENT_LENGTH.as_str(), 0);
                }
            }
            PayloadSize::UntilClose => {
                headers.remove(TRANSFER_ENCODING.as_str());
                headers.remove(CONTENT_LENGTH.as_str());
            }
        }

        for (name, value) in head.headers().iter() {
            if name.is_empty() || name.bytes().any(|b| !b.is_ascii_graphic() || b == b':') {
                return Err(SendError::invalid_header(name, "invalid name"));
            }
            if value.bytes().any(|b| b == b'\r' || b == b'\n') {
                return Err(SendError::invalid_header(name, "value contains line break"));
            }

            dst.put_slice(name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
