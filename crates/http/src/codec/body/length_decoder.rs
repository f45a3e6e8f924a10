//! Decoder implementation for bodies framed by `Content-Length`.
//!
//! The decoder never consumes more than the declared length: anything past it belongs
//! to the next message on the connection.

use crate::protocol::{ParseError, PayloadItem};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// The number of bytes remaining to be read from the payload
    length: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }

    /// True once the declared length has been read
    pub fn is_finished(&self) -> bool {
        self.length == 0
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = usize::try_from(self.length).map_or(src.len(), |length| length.min(src.len()));
        let bytes = src.split_to(len).freeze();

        self.length -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut buffer: BytesMut = BytesMut::from(&b"101234567890abcdef\r\n\r\n"[..]);

        let mut length_decoder = LengthDecoder::new(10);
        let payload = length_decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(payload.is_chunk());

        let bytes = payload.as_bytes().unwrap();
        assert_eq!(&bytes[..], b"1012345678");
        assert_eq!(&buffer[..], b"90abcdef\r\n\r\n");
        assert!(length_decoder.is_finished());
        assert!(length_decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_zero_length() {
        let mut decoder = LengthDecoder::new(0);
        assert!(decoder.is_finished());
        assert!(decoder.decode(&mut BytesMut::new()).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_split_reads() {
        let mut decoder = LengthDecoder::new(6);
        let mut buffer = BytesMut::from(&b"abc"[..]);
        assert_eq!(decoder.decode(&mut buffer).unwrap().unwrap().into_bytes().unwrap(), &b"abc"[..]);
        assert!(!decoder.is_finished());
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"defGET /");
        assert_eq!(decoder.decode(&mut buffer).unwrap().unwrap().into_bytes().unwrap(), &b"def"[..]);
        assert!(decoder.is_finished());
        assert_eq!(&buffer[..], b"GET /");
    }
}
