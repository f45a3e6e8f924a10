//! An asynchronous HTTP/1.1 server protocol engine
//!
//! This crate turns a byte stream into a sequence of HTTP requests and writes their
//! responses back, handling everything RFC 2616 asks of a server connection in
//! between. It is built on tokio and keeps bodies streaming in both directions.
//!
//! # Features
//!
//! - HTTP/0.9, HTTP/1.0 and HTTP/1.1 requests
//! - Persistent connections and pipelining with in-order responses
//! - Chunked transfer-coding for requests and responses
//! - `Expect: 100-continue`
//! - Conditional requests through [`precondition`]
//! - Typed header values from `ferrule-headers`
//!
//! # Example
//!
//! ```no_run
//! use std::error::Error;
//! use std::sync::Arc;
//!
//! use http::{Request, Response};
//! use http_body_util::BodyExt;
//! use tokio::net::TcpListener;
//! use tracing::warn;
//! use ferrule_http::config::ChannelConfig;
//! use ferrule_http::connection::HttpConnection;
//! use ferrule_http::handler::make_handler;
//! use ferrule_http::protocol::body::ReqBody;
//!
//! async fn echo(request: Request<ReqBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
//!     let path = request.uri().path().to_owned();
//!     let body = request.into_body().collect().await?.to_bytes();
//!     Ok(Response::new(format!("{path}: {} bytes\n", body.len())))
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let handler = Arc::new(make_handler(echo));
//!     let config = triomphe::Arc::new(ChannelConfig::builder().max_pipeline(8).log_transactions(true).build());
//!
//!     loop {
//!         let (stream, peer) = listener.accept().await?;
//!         let (handler, config) = (Arc::clone(&handler), triomphe::Arc::clone(&config));
//!         tokio::spawn(async move {
//!             let (reader, writer) = stream.into_split();
//!             if let Err(e) = HttpConnection::with_config(reader, writer, config).process(handler).await {
//!                 warn!(%peer, cause = %e, "connection aborted");
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: the channel state machine, one per transport
//! - [`protocol`]: request, response and body types, errors
//! - [`codec`]: request decoding and response encoding, body framing
//! - [`handler`]: the application side
//! - [`precondition`]: `If-*` request header evaluation
//! - [`config`]: per-server channel settings
//!
//! ## Request Processing
//!
//! Requests are dispatched to a [`handler::Handler`] as soon as their head is read; the
//! body follows through [`protocol::body::ReqBody`]. Handlers of pipelined requests run
//! concurrently, their responses are written in request order.
//!
//! ## Response Framing
//!
//! A response body with an exact size hint is sent with `Content-Length`, any other
//! body is chunked for HTTP/1.1 clients and delimited by closing the connection for
//! older ones.
//!
//! ## Error Handling
//!
//! - [`protocol::HttpError`]: Top-level error type
//! - [`protocol::ParseError`]: Request parsing errors, each mapped to the status the
//!   peer gets with [`ParseError::status_code`](protocol::ParseError::status_code)
//! - [`protocol::SendError`]: Response sending errors

pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod precondition;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
