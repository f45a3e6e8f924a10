use crate::protocol::{PayloadItem, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

/// Writes a body declared with `Content-Length`, refusing to go past or stop short
/// of the declared length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                let remaining = bytes.remaining() as u64;
                if remaining > self.length {
                    return Err(SendError::invalid_body("response body longer than its content-length"));
                }
                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let len = chunk.len();
                    dst.extend_from_slice(chunk);
                    bytes.advance(len);
                }
                self.length -= remaining;
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                if self.length > 0 {
                    return Err(SendError::invalid_body(format!("response body {} bytes short of its content-length", self.length)));
                }
                Ok(())
            }
        }
    }
}
