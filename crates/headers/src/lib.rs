//! Typed HTTP header values
//!
//! This crate implements the header grammars of RFC 2616 on top of a small tokenizer,
//! together with a two-layer header store that keeps the raw wire values and caches
//! their parsed form.
//!
//! # Parsing and generating
//!
//! [`parse_header`] turns the raw values of a header into a [`ParsedHeader`] and
//! [`generate_header`] turns it back. Parsing never fails loudly: a value that does not
//! follow the grammar simply has no parsed form. For every value `v` that parses,
//! `parse(generate(v)) == v`.
//!
//! ```
//! use ferrule_headers::{generate_header, parse_header, ETag, ParsedHeader};
//!
//! let parsed = parse_header("ETag", &["W/\"v1\""]).unwrap();
//! assert_eq!(parsed, ParsedHeader::ETag(ETag::weak("v1")));
//! assert_eq!(generate_header("etag", &parsed).unwrap(), vec!["W/\"v1\"".to_string()]);
//! ```
//!
//! # Header names
//!
//! Lookups are case-insensitive. [`canonical_name`] returns the capitalization used on
//! the wire, e.g. `WWW-Authenticate` or `Content-Type`; names without a registration are
//! dash capitalized.
//!
//! # Extension headers
//!
//! The standard header table is fixed. Codecs for other headers are added with
//! [`register_header`].

mod accept;
mod auth;
mod cache_control;
mod cookie;
mod date;
mod etag;
mod grammar;
mod headers;
mod mime_type;
mod range;
mod registry;
pub mod tokenizer;
mod value;

pub use accept::{Expectation, Qualified};
pub use auth::{Challenge, ChallengeParams, Credentials};
pub use cache_control::{CacheDirective, CacheValue};
pub use cookie::Cookie;
pub use date::{format_date, now, parse_date};
pub use etag::{ETag, ETagMatch};
pub use grammar::{Params, dash_capitalize, quote};
pub use headers::{Headers, latin1_decode, latin1_encode};
pub use mime_type::MimeType;
pub use range::{ByteRange, ByteRanges, ContentRange};
pub use registry::{HeaderCodec, RegisterError, canonical_name, generate_header, header_codec, parse_header, register_header};
pub use value::{IfRange, ParsedHeader};
