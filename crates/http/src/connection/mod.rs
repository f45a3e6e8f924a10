//! The server side of one HTTP/1.x connection.
//!
//! [`HttpConnection`] owns both halves of a transport and runs the channel state
//! machine over them: request heads and bodies are decoded from the read half and
//! handed to a [`Handler`](crate::handler::Handler), responses are written back to the
//! write half in request order.
//!
//! Persistence follows the request version:
//!
//! - HTTP/1.1 keeps the connection and pipelines unless the request says
//!   `Connection: close`
//! - HTTP/1.0 keeps it only with `Connection: keep-alive`, and reads the next
//!   request once the previous one is answered
//! - HTTP/0.9 closes after one response
//!
//! The read side goes through the [`ChannelState`]s, which pick the timeout that
//! applies while waiting for input.

mod http_connection;
mod state;

pub use http_connection::HttpConnection;
pub use state::ChannelState;
