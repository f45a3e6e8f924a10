//! Decoder for request payloads.
//!
//! The framing is picked from the request headers: `Content-Length` bodies go through
//! [`LengthDecoder`], `Transfer-Encoding: chunked` bodies through [`ChunkedDecoder`].
//! Requests without either have no body and get no decoder at all.

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// Decode payload with a fixed content length
    Length(LengthDecoder),

    /// Decode payload using chunked transfer encoding
    Chunked(ChunkedDecoder),
}

impl PayloadDecoder {
    pub fn chunked(lenient: bool) -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new(lenient)) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    /// The decoder for a request payload, `None` when there is nothing to decode
    pub fn from_size(payload_size: PayloadSize, lenient: bool) -> Option<Self> {
        match payload_size {
            PayloadSize::Length(size) => Some(Self::fix_length(size)),
            PayloadSize::Chunked => Some(Self::chunked(lenient)),
            PayloadSize::Empty | PayloadSize::UntilClose => None,
        }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    pub fn is_finished(&self) -> bool {
        match &self.kind {
            Kind::Length(decoder) => decoder.is_finished(),
            Kind::Chunked(decoder) => decoder.is_finished(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
        }
    }
}
