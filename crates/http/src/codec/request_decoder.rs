//! HTTP request decoder module
//!
//! [`RequestDecoder`] alternates between two phases: the head is decoded by
//! [`HeaderDecoder`], then, when the request has a body, payload items are produced by
//! [`PayloadDecoder`] until [`PayloadItem::Eof`]. Bytes past the end of the body stay
//! in the buffer for the next pipelined request.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use ferrule_http::codec::RequestDecoder;
//! use ferrule_http::protocol::{Message, PayloadItem};
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("POST / HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi");
//!
//! let Some(Message::Header((header, _))) = decoder.decode(&mut buffer).unwrap() else { panic!() };
//! assert_eq!(header.method(), "POST");
//! let Some(Message::Payload(PayloadItem::Chunk(body))) = decoder.decode(&mut buffer).unwrap() else { panic!() };
//! assert_eq!(&body[..], b"hi");
//! ```

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::config::ChannelConfig;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;
use triomphe::Arc;

/// A decoder for HTTP requests that handles both headers and payload
///
/// The decoder maintains its state through the `payload_decoder` field:
/// - `None`: Currently parsing headers
/// - `Some(PayloadDecoder)`: Currently parsing payload
#[derive(Debug)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
    lenient: bool,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::with_config(Arc::new(ChannelConfig::default()))
    }

    pub fn with_config(config: Arc<ChannelConfig>) -> Self {
        let lenient = config.allow_bare_lf();
        Self { header_decoder: HeaderDecoder::new(config), payload_decoder: None, lenient }
    }

    /// True while a request body is being read
    pub fn is_reading_body(&self) -> bool {
        self.payload_decoder.is_some()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // parse payload if have payload_decoder
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    // no need payload decoder in this request now
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        // parse request
        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = PayloadDecoder::from_size(payload_size, self.lenient);
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(message) => Ok(Some(message)),
            // trailing empty lines are not a request
            None if buf.iter().all(|b| matches!(b, b'\r' | b'\n')) && !self.is_reading_body() => {
                buf.clear();
                Ok(None)
            }
            None => Err(ParseError::ConnectionLost),
        }
    }
}
