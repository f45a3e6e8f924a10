//! HTTP request head decoder
//!
//! The decoder scans the buffer line by line, remembering how far it got so that a
//! head arriving in many small reads is scanned only once. It handles:
//!
//! - the three request line forms: `METHOD URI HTTP/x.y`, HTTP/0.9 `METHOD URI`, and a
//!   lone `METHOD` meaning `/`
//! - empty lines before the request line, which some clients send after a body
//! - header line folding: a line starting with SP or HT continues the previous value
//! - the request line, header line, header count and header block limits of
//!   [`ChannelConfig`]
//! - strict CRLF line endings unless bare LF is allowed
//!
//! Once the head is complete the body framing is selected from `Transfer-Encoding`
//! and `Content-Length`.

use std::ops::Range;

use bytes::{Buf, Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use tokio_util::codec::Decoder;
use tracing::trace;
use triomphe::Arc;

use crate::config::ChannelConfig;
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Decoder for HTTP request heads implementing the [`Decoder`] trait.
#[derive(Debug)]
pub struct HeaderDecoder {
    config: Arc<ChannelConfig>,
    /// bytes of the buffer already searched for a line end
    scanned: usize,
    /// start of the line currently being read
    line_start: usize,
    request_line: Option<RequestLine>,
    /// header fields, each a name line plus its continuation lines
    fields: Vec<Vec<Range<usize>>>,
}

#[derive(Debug)]
struct RequestLine {
    method: Method,
    uri: Uri,
    version: Version,
}

impl HeaderDecoder {
    pub fn new(config: Arc<ChannelConfig>) -> Self {
        Self { config, scanned: 0, line_start: 0, request_line: None, fields: Vec::new() }
    }

    fn reset(&mut self) {
        self.scanned = 0;
        self.line_start = 0;
        self.request_line = None;
        self.fields.clear();
    }

    fn line_too_long(&self, current_size: usize) -> ParseError {
        if self.request_line.is_none() {
            ParseError::too_long_request_line(self.config.max_header_line())
        } else {
            ParseError::too_large_header(current_size, self.config.max_header_line())
        }
    }

    /// Records one complete line, returns true when the head is complete
    fn push_line(&mut self, src: &[u8], line: Range<usize>) -> Result<bool, ParseError> {
        ensure!(line.len() <= self.config.max_header_line(), self.line_too_long(line.len()));

        if self.request_line.is_none() {
            let request_line = parse_request_line(&src[line])?;
            let complete = request_line.version == Version::HTTP_09;
            trace!(method = %request_line.method, uri = %request_line.uri, version = ?request_line.version, "parsed request line");
            self.request_line = Some(request_line);
            return Ok(complete);
        }

        if line.is_empty() {
            return Ok(true);
        }

        if matches!(src[line.start], b' ' | b'\t') {
            let Some(field) = self.fields.last_mut() else {
                return Err(ParseError::invalid_header("continuation line before any header"));
            };
            field.push(line);
            return Ok(false);
        }

        ensure!(self.fields.len() < self.config.max_headers(), ParseError::too_many_headers(self.config.max_headers()));
        self.fields.push(vec![line]);
        Ok(false)
    }

    fn build(&mut self, head: &Bytes) -> Result<RequestHeader, ParseError> {
        let RequestLine { method, uri, version } =
            self.request_line.take().ok_or_else(|| ParseError::invalid_request_line("missing request line"))?;

        let mut builder = Request::builder().method(method).uri(uri).version(version);
        if let Some(headers) = builder.headers_mut() {
            headers.reserve(self.fields.len());
            for field in &self.fields {
                let (name, value) = parse_field(head, field)?;
                headers.append(name, value);
            }
        }

        builder.body(()).map(RequestHeader::from).map_err(ParseError::invalid_header)
    }
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(offset) = src[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = src.len();
                let pending = src.len() - self.line_start;
                ensure!(pending <= self.config.max_header_line(), self.line_too_long(pending));
                ensure!(
                    src.len() <= self.config.max_header_bytes(),
                    ParseError::too_large_header(src.len(), self.config.max_header_bytes())
                );
                return Ok(None);
            };

            let newline = self.scanned + offset;
            self.scanned = newline + 1;

            let end = if newline > self.line_start && src[newline - 1] == b'\r' {
                newline - 1
            } else {
                ensure!(self.config.allow_bare_lf(), ParseError::invalid_header("line ends with bare LF"));
                newline
            };
            let line = self.line_start..end;
            self.line_start = self.scanned;

            // skip empty lines in front of the request line
            if self.request_line.is_none() && line.is_empty() {
                src.advance(self.scanned);
                self.scanned = 0;
                self.line_start = 0;
                continue;
            }

            let complete = self.push_line(src, line)?;
            ensure!(
                self.scanned <= self.config.max_header_bytes(),
                ParseError::too_large_header(self.scanned, self.config.max_header_bytes())
            );

            if complete {
                let head = src.split_to(self.scanned).freeze();
                let result = self.build(&head);
                self.reset();
                let header = result?;
                let payload_size = parse_payload(&header)?;
                trace!(header_bytes = head.len(), ?payload_size, "parsed request head");
                return Ok(Some((header, payload_size)));
            }
        }
    }
}

fn parse_request_line(line: &[u8]) -> Result<RequestLine, ParseError> {
    let parts = line.split(|b| matches!(b, b' ' | b'\t')).filter(|part| !part.is_empty()).collect::<Vec<_>>();

    let (method, uri, version) = match parts.as_slice() {
        [method] => (method, &b"/"[..], Version::HTTP_09),
        [method, uri] => (method, *uri, Version::HTTP_09),
        [method, uri, version] => (method, *uri, parse_version(version)?),
        _ => return Err(ParseError::invalid_request_line(String::from_utf8_lossy(line))),
    };

    let method = Method::from_bytes(method).map_err(|_| ParseError::InvalidMethod)?;
    let uri = Uri::try_from(uri).map_err(|_| ParseError::InvalidUri)?;
    Ok(RequestLine { method, uri, version })
}

fn parse_version(version: &[u8]) -> Result<Version, ParseError> {
    let invalid = || ParseError::invalid_version(String::from_utf8_lossy(version));

    let numbers = version.strip_prefix(b"HTTP/").ok_or_else(invalid)?;
    let numbers = std::str::from_utf8(numbers).map_err(|_| invalid())?;
    let (major, minor) = numbers.split_once('.').ok_or_else(invalid)?;
    let number = |s: &str| -> Result<u32, ParseError> {
        ensure!(!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()), invalid());
        s.parse().map_err(|_| invalid())
    };

    match (number(major)?, number(minor)?) {
        (0, 9) => Ok(Version::HTTP_09),
        (1, 0) => Ok(Version::HTTP_10),
        (1, _) => Ok(Version::HTTP_11),
        (0, _) => Err(invalid()),
        (major, minor) => Err(ParseError::UnsupportedVersion { major, minor }),
    }
}

/// The range of `bytes` without leading and trailing SP and HT
fn trim_lws(bytes: &[u8]) -> Range<usize> {
    let start = bytes.iter().position(|b| !matches!(b, b' ' | b'\t')).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !matches!(b, b' ' | b'\t')).map_or(start, |end| end + 1);
    start..end
}

/// Builds one header from its name line and continuation lines
fn parse_field(head: &Bytes, lines: &[Range<usize>]) -> Result<(HeaderName, HeaderValue), ParseError> {
    let first = &head[lines[0].clone()];
    let colon = first.iter().position(|b| *b == b':').ok_or_else(|| {
        ParseError::invalid_header(format!("header line without colon: {}", String::from_utf8_lossy(first)))
    })?;

    let name = HeaderName::from_bytes(&first[..colon]).map_err(ParseError::invalid_header)?;

    let value_start = lines[0].start + colon + 1;
    let trimmed = trim_lws(&head[value_start..lines[0].end]);
    let value = if lines.len() == 1 {
        HeaderValue::from_maybe_shared(head.slice(value_start + trimmed.start..value_start + trimmed.end))
    } else {
        // folded lines are joined with a single space
        let mut joined = head[value_start + trimmed.start..value_start + trimmed.end].to_vec();
        for line in &lines[1..] {
            let part = &head[line.clone()];
            let part = &part[trim_lws(part)];
            if !part.is_empty() {
                if !joined.is_empty() {
                    joined.push(b' ');
                }
                joined.extend_from_slice(part);
            }
        }
        HeaderValue::from_bytes(&joined)
    };

    Ok((name, value.map_err(ParseError::invalid_header)?))
}

/// Selects the body framing of a request.
///
/// `Transfer-Encoding` wins over `Content-Length`. Its last coding must be `chunked`,
/// and any other coding in front of it is not supported.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    if header.version() == Version::HTTP_09 {
        return Ok(PayloadSize::new_empty());
    }

    if let Some(codings) = transfer_codings(header.headers())? {
        match codings.as_slice() {
            [] => {}
            [.., last] if last != "chunked" => {
                return Err(ParseError::invalid_transfer_encoding(format!("{} is not chunked", codings.join(", "))));
            }
            [_] => return Ok(PayloadSize::new_chunked()),
            [first, ..] => return Err(ParseError::unsupported_transfer_encoding(first)),
        }
    }

    match content_length(header.headers())? {
        None | Some(0) => Ok(PayloadSize::new_empty()),
        Some(length) => Ok(PayloadSize::new_length(length)),
    }
}

/// The lower-cased transfer codings, `identity` dropped
fn transfer_codings(headers: &HeaderMap) -> Result<Option<Vec<String>>, ParseError> {
    if !headers.contains_key(TRANSFER_ENCODING) {
        return Ok(None);
    }

    let mut codings = Vec::new();
    for value in headers.get_all(TRANSFER_ENCODING) {
        let value = value.to_str().map_err(ParseError::invalid_transfer_encoding)?;
        for coding in value.split(',') {
            // parameters are irrelevant to the framing
            let coding = coding.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
            if !coding.is_empty() && coding != "identity" {
                codings.push(coding);
            }
        }
    }
    Ok(Some(codings))
}

fn content_length(headers: &HeaderMap) -> Result<Option<u64>, ParseError> {
    let mut length = None;
    for value in headers.get_all(CONTENT_LENGTH) {
        let value = value.to_str().map_err(ParseError::invalid_content_length)?;
        for item in value.split(',') {
            let item = item.trim();
            ensure!(
                !item.is_empty() && item.bytes().all(|b| b.is_ascii_digit()),
                ParseError::invalid_content_length(format!("value {item} is not a length"))
            );
            let parsed = item.parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {item} is not u64")))?;
            match length {
                Some(previous) if previous != parsed => {
                    return Err(ParseError::invalid_content_length("conflicting content-length values"));
                }
                _ => length = Some(parsed),
            }
        }
    }
    Ok(length)
}
