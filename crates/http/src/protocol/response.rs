//! HTTP response header handling implementation.

use http::Response;

/// The header portion of an HTTP response, with an empty body placeholder.
pub type ResponseHead = Response<()>;
