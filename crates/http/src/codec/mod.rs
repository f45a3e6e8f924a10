//! HTTP codec module for encoding and decoding HTTP messages
//!
//! - Request handling: [`RequestDecoder`], built from the head decoder in [`header`]
//!   and the body decoders in [`body`]
//! - Response handling: [`ResponseEncoder`], built from the head encoder in [`header`]
//!   and the body encoders in [`body`]
//!
//! Both sides are `tokio_util` codecs, so the connection drives them through
//! `FramedRead` and `FramedWrite`.

pub mod body;
pub mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
