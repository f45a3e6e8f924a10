//! HTTP request body streaming.
//!
//! The connection reads body bytes off the wire and hands them to the request handler
//! through a bounded channel:
//!
//! - [`ReqBody`]: the consumer side, implementing `http_body::Body`
//! - [`ReqBodySender`]: the producer side, owned by the connection's read loop
//!
//! The channel bound is the backpressure between a slow body consumer and the
//! transport. A handler that drops its `ReqBody` unread makes the sender discard the
//! rest of the body, so the connection stays in sync for the next request. When the
//! connection goes away mid-body, the consumer sees [`ParseError::ConnectionLost`].
//!
//! [`ParseError::ConnectionLost`]: crate::protocol::ParseError::ConnectionLost

mod req_body;

pub use req_body::ReqBody;
pub use req_body::ReqBodySender;
