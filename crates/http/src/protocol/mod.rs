//! Core HTTP protocol abstractions.
//!
//! - **Message Handling** ([`Message`], [`PayloadItem`], [`PayloadSize`]): what flows
//!   through the codecs
//! - **Request Processing** ([`RequestHeader`]): request headers plus the typed lookups
//!   the channel relies on
//! - **Response Processing** ([`ResponseHead`]): response headers before body attachment
//! - **Body Streaming** ([`body`]): [`ReqBody`](body::ReqBody) and its sender
//! - **Error Handling**: [`HttpError`], [`ParseError`], [`SendError`]

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
