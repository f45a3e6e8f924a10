use std::io;

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

/// Everything that can go wrong while reading a request off the wire
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("request line too long, exceed the limit {max_size}")]
    TooLongRequestLine { max_size: usize },

    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid request line: {reason}")]
    InvalidRequestLine { reason: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {version}")]
    InvalidVersion { version: String },

    #[error("http version {major}.{minor} not supported")]
    UnsupportedVersion { major: u32, minor: u32 },

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid transfer-encoding header: {reason}")]
    InvalidTransferEncoding { reason: String },

    #[error("transfer-encoding {coding} not supported")]
    UnsupportedTransferEncoding { coding: String },

    #[error("expectation {expectation} not supported")]
    UnsupportedExpectation { expectation: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("connection lost")]
    ConnectionLost,

    #[error("timed out waiting for the request")]
    TimedOut,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_long_request_line(max_size: usize) -> Self {
        Self::TooLongRequestLine { max_size }
    }

    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_request_line<S: ToString>(str: S) -> Self {
        Self::InvalidRequestLine { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_version<S: ToString>(str: S) -> Self {
        Self::InvalidVersion { version: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_transfer_encoding<S: ToString>(str: S) -> Self {
        Self::InvalidTransferEncoding { reason: str.to_string() }
    }

    pub fn unsupported_transfer_encoding<S: ToString>(coding: S) -> Self {
        Self::UnsupportedTransferEncoding { coding: coding.to_string() }
    }

    pub fn unsupported_expectation<S: ToString>(expectation: S) -> Self {
        Self::UnsupportedExpectation { expectation: expectation.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// The status reported to the peer before closing, `None` when the connection
    /// is simply dropped
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::TooLongRequestLine { .. } => Some(StatusCode::URI_TOO_LONG),
            Self::UnsupportedVersion { .. } => Some(StatusCode::HTTP_VERSION_NOT_SUPPORTED),
            Self::UnsupportedTransferEncoding { .. } => Some(StatusCode::NOT_IMPLEMENTED),
            Self::UnsupportedExpectation { .. } => Some(StatusCode::EXPECTATION_FAILED),
            Self::TooLargeHeader { .. }
            | Self::TooManyHeaders { .. }
            | Self::InvalidRequestLine { .. }
            | Self::InvalidHeader { .. }
            | Self::InvalidVersion { .. }
            | Self::InvalidMethod
            | Self::InvalidUri
            | Self::InvalidContentLength { .. }
            | Self::InvalidTransferEncoding { .. }
            | Self::InvalidBody { .. } => Some(StatusCode::BAD_REQUEST),
            Self::ConnectionLost | Self::TimedOut | Self::Io { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
