//! Decoder implementation for HTTP chunked transfer encoding.
//!
//! This module decodes bodies framed as specified in
//! [RFC 2616 Section 3.6.1](https://www.rfc-editor.org/rfc/rfc2616#section-3.6.1):
//! a hex size line with optional `;extension`, the chunk data, CRLF, and finally a
//! zero-sized chunk followed by optional trailers and an empty line.
//!
//! Extensions are recognized and ignored, trailers are consumed and discarded. In
//! lenient mode a bare LF is accepted wherever CRLF is expected.

use crate::protocol::{ParseError, PayloadItem};
use ChunkedState::*;
use bytes::{Buf, Bytes, BytesMut};
use std::task::Poll;
use tokio_util::codec::Decoder;
use tracing::trace;

/// A decoder for handling HTTP chunked transfer encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
    size_digits: usize,
    lenient: bool,
}

impl ChunkedDecoder {
    /// Creates a decoder ready to read the size line of the first chunk; `lenient`
    /// accepts a bare LF as line terminator
    pub fn new(lenient: bool) -> Self {
        Self { state: Size, remaining_size: 0, size_digits: 0, lenient }
    }

    /// True once the terminating chunk and trailers have been consumed
    pub fn is_finished(&self) -> bool {
        self.state == End
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the chunk size in hex
    Size,
    /// Whitespace after the size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// LF after the size line
    SizeLf,
    /// Chunk data
    Body,
    /// CR after chunk data
    BodyCr,
    /// LF after chunk data
    BodyLf,
    /// A trailer field
    Trailer,
    /// LF after a trailer field
    TrailerLf,
    /// CR of the final empty line, or the start of a trailer
    EndCr,
    /// LF of the final empty line
    EndLf,
    End,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                // need more data
                return Ok(None);
            }

            let mut buf = None;

            self.state = match self.step(src, &mut buf) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(e),
            };

            if let Some(bytes) = buf {
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.has_remaining() {
            $src.get_u8()
        } else {
            return Poll::Pending;
        }
    }};
}

type Step = Poll<Result<ChunkedState, ParseError>>;

fn invalid(reason: &str) -> Step {
    Poll::Ready(Err(ParseError::invalid_body(reason)))
}

impl ChunkedDecoder {
    fn step(&mut self, src: &mut BytesMut, buf: &mut Option<Bytes>) -> Step {
        match self.state {
            Size => self.read_size(src),
            SizeLws => self.read_size_lws(src),
            Extension => self.read_extension(src),
            SizeLf => self.read_size_lf(src),
            Body => self.read_body(src, buf),
            BodyCr => self.read_body_cr(src),
            BodyLf => self.read_body_lf(src),
            Trailer => self.read_trailer(src),
            TrailerLf => Self::read_trailer_lf(src),
            EndCr => self.read_end_cr(src),
            EndLf => Self::read_end_lf(src),
            End => Poll::Ready(Ok(End)),
        }
    }

    /// The state after a complete size line
    fn after_size_line(&self) -> Step {
        if self.size_digits == 0 {
            return invalid("chunk size line without size");
        }
        if self.remaining_size == 0 { Poll::Ready(Ok(EndCr)) } else { Poll::Ready(Ok(Body)) }
    }

    fn read_size(&mut self, src: &mut BytesMut) -> Step {
        let digit = match try_next_byte!(src) {
            b @ b'0'..=b'9' => b - b'0',
            b @ b'a'..=b'f' => b + 10 - b'a',
            b @ b'A'..=b'F' => b + 10 - b'A',
            b'\t' | b' ' => return Poll::Ready(Ok(SizeLws)),
            b';' => return Poll::Ready(Ok(Extension)),
            b'\r' => return Poll::Ready(Ok(SizeLf)),
            b'\n' if self.lenient => return self.after_size_line(),
            _ => return invalid("invalid chunk size line: Invalid Size"),
        };

        let Some(size) = self.remaining_size.checked_mul(16).and_then(|size| size.checked_add(u64::from(digit))) else {
            return invalid("invalid overflow chunked length");
        };
        self.remaining_size = size;
        self.size_digits += 1;
        Poll::Ready(Ok(Size))
    }

    fn read_size_lws(&self, src: &mut BytesMut) -> Step {
        match try_next_byte!(src) {
            // LWS can follow the chunk size, but no more digits can come
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' if self.lenient => self.after_size_line(),
            _ => invalid("invalid chunk size linear white space"),
        }
    }

    fn read_extension(&self, src: &mut BytesMut) -> Step {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' if self.lenient => self.after_size_line(),
            b'\n' => invalid("invalid chunk extension contains newline"),
            _ => Poll::Ready(Ok(Extension)),
        }
    }

    fn read_size_lf(&self, src: &mut BytesMut) -> Step {
        match try_next_byte!(src) {
            b'\n' => self.after_size_line(),
            _ => invalid("invalid chunk size LF"),
        }
    }

    fn read_body(&mut self, src: &mut BytesMut, buf: &mut Option<Bytes>) -> Step {
        if self.remaining_size == 0 {
            return Poll::Ready(Ok(BodyCr));
        }

        // cap remaining bytes at the max capacity of usize
        let remaining = usize::try_from(self.remaining_size).unwrap_or(usize::MAX);
        let read_size = remaining.min(src.len());

        self.remaining_size -= read_size as u64;
        *buf = Some(src.split_to(read_size).freeze());

        if self.remaining_size > 0 { Poll::Ready(Ok(Body)) } else { Poll::Ready(Ok(BodyCr)) }
    }

    fn read_body_cr(&mut self, src: &mut BytesMut) -> Step {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(BodyLf)),
            b'\n' if self.lenient => self.next_chunk(),
            _ => invalid("invalid chunk body CR"),
        }
    }

    fn read_body_lf(&mut self, src: &mut BytesMut) -> Step {
        match try_next_byte!(src) {
            b'\n' => self.next_chunk(),
            _ => invalid("invalid chunk body LF"),
        }
    }

    fn next_chunk(&mut self) -> Step {
        self.size_digits = 0;
        Poll::Ready(Ok(Size))
    }

    fn read_trailer(&self, src: &mut BytesMut) -> Step {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(TrailerLf)),
            b'\n' if self.lenient => Poll::Ready(Ok(EndCr)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_trailer_lf(src: &mut BytesMut) -> Step {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(EndCr)),
            _ => invalid("invalid trailer end LF"),
        }
    }

    fn read_end_cr(&self, src: &mut BytesMut) -> Step {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(EndLf)),
            b'\n' if self.lenient => Poll::Ready(Ok(End)),
            _ => Poll::Ready(Ok(Trailer)),
        }
    }

    fn read_end_lf(src: &mut BytesMut) -> Step {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(End)),
            _ => invalid("invalid chunk end LF"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut ChunkedDecoder, buffer: &mut BytesMut) -> Result<Vec<u8>, ParseError> {
        let mut body = Vec::new();
        while let Some(item) = decoder.decode(buffer)? {
            match item {
                PayloadItem::Chunk(bytes) => body.extend_from_slice(&bytes),
                PayloadItem::Eof => return Ok(body),
            }
        }
        Err(ParseError::invalid_body("incomplete"))
    }

    #[test]
    fn test_basic() {
        let mut buffer: BytesMut = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(false);

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(item.is_chunk());
        assert_eq!(item.as_bytes().unwrap(), &Bytes::from_static(b"1234567890abcdef"));
        assert!(!decoder.is_finished());

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_hello() {
        let mut buffer = BytesMut::from(&b"5\r\nHello\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(false);
        assert_eq!(decode_all(&mut decoder, &mut buffer).unwrap(), b"Hello");
        assert!(decoder.is_finished());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_chunks() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(false);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b", world"));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_chunks_with_extensions() {
        let mut buffer: BytesMut = BytesMut::from(&b"5;chunk-ext=value\r\nhello\r\n0;last\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(false);
        assert_eq!(decode_all(&mut decoder, &mut buffer).unwrap(), b"hello");
    }

    #[test]
    fn test_chunks_with_trailers() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhello\r\n0\r\nTrailer: value\r\nOther: x\r\n\r\nGET"[..]);
        let mut decoder = ChunkedDecoder::new(false);
        assert_eq!(decode_all(&mut decoder, &mut buffer).unwrap(), b"hello");
        // the next message is left alone
        assert_eq!(&buffer[..], b"GET");
    }

    #[test]
    fn test_incomplete_chunk() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new(false);

        let chunk = decoder.decode(&mut buffer).unwrap();
        assert_eq!(chunk.unwrap().as_bytes().unwrap(), &Bytes::copy_from_slice(b"hel"));
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"lo\r\n0\r");
        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"lo"));
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"\n\r\n");
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_invalid_chunk_size() {
        let mut decoder = ChunkedDecoder::new(false);
        let err = decoder.decode(&mut BytesMut::from(&b"xyz\r\n"[..])).unwrap_err();
        assert!(matches!(err, ParseError::InvalidBody { .. }));
        assert_eq!(err.status_code(), Some(http::StatusCode::BAD_REQUEST));

        let mut decoder = ChunkedDecoder::new(false);
        assert!(decoder.decode(&mut BytesMut::from(&b"-5\r\n"[..])).is_err());

        let mut decoder = ChunkedDecoder::new(false);
        assert!(decoder.decode(&mut BytesMut::from(&b"\r\n"[..])).is_err());
    }

    #[test]
    fn test_overflow() {
        let mut decoder = ChunkedDecoder::new(false);
        assert!(decoder.decode(&mut BytesMut::from(&b"1ffffffffffffffff\r\n"[..])).is_err());
    }

    #[test]
    fn test_missing_crlf() {
        let mut buffer: BytesMut = BytesMut::from(&b"5\r\nhelloBad"[..]);
        let mut decoder = ChunkedDecoder::new(false);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::copy_from_slice(b"hello"));
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn test_bare_lf() {
        let wire = &b"5\nhello\n0\n\n"[..];
        assert!(decode_all(&mut ChunkedDecoder::new(false), &mut BytesMut::from(wire)).is_err());
        assert_eq!(decode_all(&mut ChunkedDecoder::new(true), &mut BytesMut::from(wire)).unwrap(), b"hello");
    }

    #[test]
    fn test_large_chunk() {
        let size = 1024 * 1024;
        let mut data = Vec::with_capacity(size + 16);
        data.extend(format!("{size:x}\r\n").into_bytes());
        data.extend(vec![b'A'; size]);
        data.extend(b"\r\n0\r\n\r\n");

        let mut buffer = BytesMut::from(&data[..]);
        let mut decoder = ChunkedDecoder::new(false);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().len(), size);
        assert!(chunk.as_bytes().unwrap().iter().all(|&b| b == b'A'));

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }

    #[test]
    fn test_zero_size_chunk() {
        let mut buffer: BytesMut = BytesMut::from(&b"0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(false);

        let eof = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(eof.is_eof());
    }
}
