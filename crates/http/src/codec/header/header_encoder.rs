//! HTTP response head encoder
//!
//! The status line always announces `HTTP/1.1`, whatever the request version was, and
//! header names are written with their canonical capitalization. The framing headers
//! follow the [`PayloadSize`] chosen for the body:
//!
//! - `Length(n)`: `Content-Length: n`, no `Transfer-Encoding`
//! - `Chunked`: `Transfer-Encoding: chunked`, no `Content-Length`
//! - `UntilClose`: neither
//! - `Empty`: left as the response has them, so a HEAD response keeps its length
//!
//! HTTP/0.9 responses have no head at all.

use crate::protocol::{PayloadSize, ResponseHead, SendError};

use bytes::{BufMut, BytesMut};

use ferrule_headers::canonical_name;
use http::{HeaderValue, Version, header};
use std::io;
use std::io::Write;
use tokio_util::codec::Encoder;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

const UNKNOWN_STATUS: &str = "Unknown Status";

#[derive(Debug)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, payload_size) = item;

        if header.version() == Version::HTTP_09 {
            return Ok(());
        }

        dst.reserve(INIT_HEADER_SIZE);
        let status = header.status();
        write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or(UNKNOWN_STATUS))?;

        let headers = header.headers_mut();
        match payload_size {
            PayloadSize::Length(n) => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                headers.remove(header::CONTENT_LENGTH);
                headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
            PayloadSize::UntilClose => {
                headers.remove(header::CONTENT_LENGTH);
                headers.remove(header::TRANSFER_ENCODING);
            }
            PayloadSize::Empty => {}
        }

        for (header_name, header_value) in headers.iter() {
            dst.put_slice(canonical_name(header_name.as_str()).as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Writer over a `BytesMut` that has already been reserved into.
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
