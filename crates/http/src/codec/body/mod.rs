//! Body framing for request and response payloads.
//!
//! ## Decoders
//! - [`ChunkedDecoder`]: `Transfer-Encoding: chunked`
//! - [`LengthDecoder`]: `Content-Length`
//! - [`PayloadDecoder`]: picks one of the above per request
//!
//! ## Encoders
//! - [`ChunkedEncoder`]
//! - [`LengthEncoder`]
//! - [`PayloadEncoder`]: adds raw close-delimited output for pre-1.1 clients

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use chunked_decoder::ChunkedDecoder;
pub use chunked_encoder::ChunkedEncoder;
pub use length_decoder::LengthDecoder;
pub use length_encoder::LengthEncoder;
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
