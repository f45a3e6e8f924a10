//! HTTP request header handling implementation.
//!
//! [`RequestHeader`] wraps a bodyless `http::Request` together with the typed view of
//! its headers. The typed view is built once per request and parses each header at
//! most once; it travels on with the request as an extension when the body is attached.

use ferrule_headers::{Expectation, Headers, ParsedHeader};
use http::header::{CONNECTION, EXPECT};
use http::request::Parts;
use http::{HeaderMap, HeaderName, Method, Request, Uri, Version};

/// Represents an HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
    typed: Headers,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    ///
    /// The typed headers are stored in the request extensions, so parsed values are
    /// shared with whoever looks at the request later.
    pub fn body<T>(self, body: T) -> Request<T> {
        let mut request = self.inner.map(|()| body);
        request.extensions_mut().insert(self.typed);
        request
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn typed_headers(&self) -> &Headers {
        &self.typed
    }

    /// The typed value of a header, `None` when absent or unparsable
    pub fn parsed(&self, name: &HeaderName) -> Option<&ParsedHeader> {
        self.typed.get(name)
    }

    /// Lower-cased `Connection` tokens
    pub fn connection_tokens(&self) -> &[String] {
        self.parsed(&CONNECTION).and_then(ParsedHeader::as_tokens).unwrap_or_default()
    }

    pub fn has_connection_token(&self, token: &str) -> bool {
        self.connection_tokens().iter().any(|t| t.eq_ignore_ascii_case(token))
    }

    /// The `Expect` entries; a present but unparsable header yields `None`
    pub fn expectations(&self) -> Option<&[Expectation]> {
        if !self.typed.contains(&EXPECT) {
            return Some(&[]);
        }
        self.parsed(&EXPECT).and_then(ParsedHeader::as_expect)
    }

    pub fn is_head(&self) -> bool {
        *self.method() == Method::HEAD
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self::from(Request::from_parts(parts, ()))
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        let typed = Headers::from(inner.headers());
        Self { inner, typed }
    }
}
