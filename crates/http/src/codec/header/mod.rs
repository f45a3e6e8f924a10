//! HTTP head processing
//!
//! - [`HeaderDecoder`]: request line and header block of incoming requests, plus the
//!   selection of the body framing
//! - [`HeaderEncoder`]: status line and headers of outgoing responses

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
