//! The application side of a connection.
//!
//! A [`Handler`] receives every request read off the connection, with a streaming
//! [`ReqBody`], and produces exactly one response for it. Handlers run concurrently
//! when requests are pipelined; the connection writes their responses back in
//! request order.
//!
//! Plain async functions become handlers through [`make_handler`]:
//!
//! ```
//! use std::error::Error;
//! use http::{Request, Response};
//! use ferrule_http::handler::make_handler;
//! use ferrule_http::protocol::body::ReqBody;
//!
//! async fn hello(_request: Request<ReqBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
//!     Ok(Response::new("hello".to_string()))
//! }
//!
//! let handler = make_handler(hello);
//! # let _ = handler;
//! ```

use std::error::Error;
use std::future::Future;

use http::{Request, Response};
use http_body::Body;

use crate::protocol::body::ReqBody;

#[trait_variant::make(Handler: Send)]
pub trait LocalHandler {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<RespBody, Err, F, Fut> Handler for HandlerFn<F>
where
    RespBody: Body,
    F: Fn(Request<ReqBody>) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
{
    type RespBody = RespBody;
    type Error = Err;

    fn call(&self, req: Request<ReqBody>) -> impl Future<Output = Result<Response<Self::RespBody>, Self::Error>> + Send {
        (self.f)(req)
    }
}

pub fn make_handler<F, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<ReqBody>) -> Ret,
{
    HandlerFn { f }
}
