use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::protocol::{PayloadItem, PayloadSize, SendError};
use bytes::{Buf, BytesMut};

use tokio_util::codec::Encoder;

/// encode payload for response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// content-length payload
    Length(LengthEncoder),

    /// transfer-encoding chunked payload
    Chunked(ChunkedEncoder),

    /// raw bytes ended by closing the connection
    UntilClose { eof: bool },
}

impl PayloadEncoder {
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedEncoder::new()) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthEncoder::new(size)) }
    }

    pub fn until_close() -> Self {
        Self { kind: Kind::UntilClose { eof: false } }
    }

    /// The encoder for a response payload, `None` when the response has no body
    pub fn from_size(payload_size: PayloadSize) -> Option<Self> {
        match payload_size {
            PayloadSize::Length(size) => Some(Self::fix_length(size)),
            PayloadSize::Chunked => Some(Self::chunked()),
            PayloadSize::UntilClose => Some(Self::until_close()),
            PayloadSize::Empty => None,
        }
    }

    pub fn is_finish(&self) -> bool {
        match &self.kind {
            Kind::Length(encoder) => encoder.is_finish(),
            Kind::Chunked(encoder) => encoder.is_finish(),
            Kind::UntilClose { eof } => *eof,
        }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match &mut self.kind {
            Kind::Length(encoder) => encoder.encode(item, dst),
            Kind::Chunked(encoder) => encoder.encode(item, dst),
            Kind::UntilClose { eof } => {
                match item {
                    PayloadItem::Chunk(mut bytes) => {
                        while bytes.has_remaining() {
                            let chunk = bytes.chunk();
                            let len = chunk.len();
                            dst.extend_from_slice(chunk);
                            bytes.advance(len);
                        }
                    }
                    PayloadItem::Eof => *eof = true,
                }
                Ok(())
            }
        }
    }
}
