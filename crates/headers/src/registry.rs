//! Header name to codec mapping
//!
//! The standard headers are resolved through a fixed table built once on first use.
//! Applications may register codecs for extension headers with [`register_header`];
//! standard entries can not be replaced.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::trace;

use crate::accept;
use crate::auth;
use crate::cache_control;
use crate::cookie;
use crate::date::{format_date, now, parse_date};
use crate::etag::{ETag, ETagMatch};
use crate::grammar::{self, dash_capitalize};
use crate::mime_type::MimeType;
use crate::range;
use crate::tokenizer::{Token, tokenize};
use crate::value::{IfRange, ParsedHeader};

/// The parse and generate functions of one header
///
/// `parse` receives every raw value of the header in order and must not panic;
/// `generate` returns `None` when handed a value of the wrong shape.
#[derive(Debug, Clone, Copy)]
pub struct HeaderCodec {
    pub parse: fn(&[&str]) -> Option<ParsedHeader>,
    pub generate: fn(&ParsedHeader) -> Option<Vec<String>>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error("{0} is a standard header and can not be registered again")]
    Standard(String),
}

#[derive(Debug, Clone)]
struct Registration {
    canonical: Cow<'static, str>,
    codec: HeaderCodec,
}

static STANDARD: Lazy<HashMap<String, Registration>> = Lazy::new(|| {
    STANDARD_CODECS
        .iter()
        .map(|(canonical, codec)| {
            (canonical.to_ascii_lowercase(), Registration { canonical: Cow::Borrowed(*canonical), codec: *codec })
        })
        .collect()
});

static EXTENSIONS: Lazy<ArcSwap<HashMap<String, Registration>>> = Lazy::new(ArcSwap::default);

/// Registers a codec for a non-standard header, replacing an earlier extension registration
///
/// # Errors
///
/// Returns [`RegisterError::Standard`] when `canonical_name` names a standard header.
pub fn register_header(canonical_name: &str, codec: HeaderCodec) -> Result<(), RegisterError> {
    let key = canonical_name.to_ascii_lowercase();
    if STANDARD.contains_key(&key) {
        return Err(RegisterError::Standard(canonical_name.to_owned()));
    }

    trace!(header = canonical_name, "register header codec");
    let registration = Registration { canonical: Cow::Owned(canonical_name.to_owned()), codec };
    EXTENSIONS.rcu(|current| {
        let mut next = HashMap::clone(current);
        next.insert(key.clone(), registration.clone());
        next
    });
    Ok(())
}

fn lookup(name: &str) -> Option<Registration> {
    let key = name.to_ascii_lowercase();
    if let Some(registration) = STANDARD.get(&key) {
        return Some(registration.clone());
    }
    EXTENSIONS.load().get(&key).cloned()
}

/// The codec for `name`, case-insensitively
pub fn header_codec(name: &str) -> Option<HeaderCodec> {
    lookup(name).map(|registration| registration.codec)
}

/// The capitalization used on the wire: the registered spelling for known headers,
/// dash capitalized otherwise
pub fn canonical_name(name: &str) -> Cow<'static, str> {
    match lookup(name) {
        Some(registration) => registration.canonical,
        None => Cow::Owned(dash_capitalize(name)),
    }
}

/// Parses the raw values of a header, `None` when there are none, the header is not
/// known, or the values do not follow the grammar
pub fn parse_header<S: AsRef<str>>(name: &str, raw: &[S]) -> Option<ParsedHeader> {
    if raw.is_empty() {
        return None;
    }
    let codec = header_codec(name)?;
    let raw = raw.iter().map(AsRef::as_ref).collect::<Vec<_>>();
    (codec.parse)(&raw)
}

/// Generates raw values for a parsed header, the inverse of [`parse_header`]
pub fn generate_header(name: &str, value: &ParsedHeader) -> Option<Vec<String>> {
    (header_codec(name)?.generate)(value)
}

macro_rules! codec {
    ($parse:expr, $generate:expr) => {
        HeaderCodec { parse: $parse, generate: $generate }
    };
}

static STANDARD_CODECS: &[(&str, HeaderCodec)] = &[
    // general
    ("Cache-Control", codec!(parse_cache_control, generate_cache_control)),
    ("Connection", codec!(parse_tokens, generate_tokens)),
    ("Date", codec!(parse_last_date, generate_date)),
    ("Transfer-Encoding", codec!(parse_tokens, generate_tokens)),
    // request
    ("Accept", codec!(parse_accept, generate_accept)),
    ("Accept-Charset", codec!(parse_accept_charset, generate_qualities)),
    ("Accept-Encoding", codec!(parse_accept_encoding, generate_accept_encoding)),
    ("Accept-Language", codec!(parse_qualities, generate_qualities)),
    ("Authorization", codec!(parse_credentials, generate_credentials)),
    ("Cookie", codec!(parse_cookie, generate_cookie)),
    ("Expect", codec!(parse_expect, generate_expect)),
    ("From", codec!(parse_text, generate_text)),
    ("Host", codec!(parse_text, generate_text)),
    ("If-Match", codec!(parse_etags, generate_etags)),
    ("If-Modified-Since", codec!(parse_if_modified_since, generate_date)),
    ("If-None-Match", codec!(parse_etags, generate_etags)),
    ("If-Range", codec!(parse_if_range, generate_if_range)),
    ("If-Unmodified-Since", codec!(parse_last_date, generate_date)),
    ("Max-Forwards", codec!(parse_integer, generate_integer)),
    ("Range", codec!(parse_range, generate_range)),
    ("Referer", codec!(parse_text, generate_text)),
    ("TE", codec!(parse_qualities, generate_qualities)),
    ("User-Agent", codec!(parse_text, generate_text)),
    // response
    ("Accept-Ranges", codec!(parse_tokens, generate_tokens)),
    ("Age", codec!(parse_integer, generate_integer)),
    ("ETag", codec!(parse_etag, generate_etag)),
    ("Location", codec!(parse_text, generate_text)),
    ("Retry-After", codec!(parse_retry_after, generate_retry_after)),
    ("Server", codec!(parse_text, generate_text)),
    ("Set-Cookie", codec!(parse_set_cookie, generate_set_cookie)),
    ("Set-Cookie2", codec!(parse_set_cookie2, generate_set_cookie2)),
    ("Vary", codec!(parse_tokens, generate_tokens)),
    ("WWW-Authenticate", codec!(parse_challenges, generate_challenges)),
    // entity
    ("Allow", codec!(parse_case_tokens, generate_tokens)),
    ("Content-Encoding", codec!(parse_tokens, generate_tokens)),
    ("Content-Language", codec!(parse_tokens, generate_tokens)),
    ("Content-Length", codec!(parse_integer, generate_integer)),
    ("Content-Location", codec!(parse_text, generate_text)),
    ("Content-Range", codec!(parse_content_range, generate_content_range)),
    ("Content-Type", codec!(parse_content_type, generate_content_type)),
    ("Expires", codec!(parse_expires, generate_date)),
    ("Last-Modified", codec!(parse_last_date, generate_date)),
];

fn parse_tokens(raw: &[&str]) -> Option<ParsedHeader> {
    token_list(raw, true)
}

fn parse_case_tokens(raw: &[&str]) -> Option<ParsedHeader> {
    token_list(raw, false)
}

// a quoted string is not a token, whatever it contains
fn token_list(raw: &[&str], fold_case: bool) -> Option<ParsedHeader> {
    let tokens = tokenize(raw, fold_case).ok()?;
    if tokens.iter().any(|token| matches!(token, Token::Quoted(_))) {
        return None;
    }
    Some(ParsedHeader::Tokens(grammar::words(&tokens)))
}

fn generate_tokens(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![grammar::generate_list(value.as_tokens()?.iter().cloned())])
}

fn parse_text(raw: &[&str]) -> Option<ParsedHeader> {
    Some(ParsedHeader::Text(grammar::last(raw)?.to_owned()))
}

fn generate_text(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![value.as_text()?.to_owned()])
}

fn parse_integer(raw: &[&str]) -> Option<ParsedHeader> {
    grammar::integer(grammar::last(raw)?).map(ParsedHeader::Integer)
}

fn generate_integer(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![value.as_integer()?.to_string()])
}

fn parse_last_date(raw: &[&str]) -> Option<ParsedHeader> {
    parse_date(grammar::last(raw)?).map(ParsedHeader::Date)
}

// some clients append `; length=1234` to If-Modified-Since
fn parse_if_modified_since(raw: &[&str]) -> Option<ParsedHeader> {
    let value = grammar::last(raw)?;
    let value = value.split_once(';').map_or(value, |(date, _)| date);
    parse_date(value).map(ParsedHeader::Date)
}

// an unparsable Expires means already expired
fn parse_expires(raw: &[&str]) -> Option<ParsedHeader> {
    Some(ParsedHeader::Date(parse_date(grammar::last(raw)?).unwrap_or(0)))
}

fn generate_date(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![format_date(value.as_date()?)])
}

fn parse_retry_after(raw: &[&str]) -> Option<ParsedHeader> {
    let value = grammar::last(raw)?;
    match grammar::integer(value) {
        Some(delay) => Some(ParsedHeader::Date(now().saturating_add(delay))),
        None => parse_date(value).map(ParsedHeader::Date),
    }
}

fn generate_retry_after(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![value.as_date()?.saturating_sub(now()).to_string()])
}

fn parse_etag(raw: &[&str]) -> Option<ParsedHeader> {
    ETag::from_tokens(&tokenize(raw, true).ok()?).map(ParsedHeader::ETag)
}

fn generate_etag(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![value.as_etag()?.to_string()])
}

fn parse_etags(raw: &[&str]) -> Option<ParsedHeader> {
    grammar::list(&tokenize(raw, true).ok()?, ETagMatch::from_tokens).map(ParsedHeader::ETags)
}

fn generate_etags(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![grammar::generate_list(value.as_etags()?.iter().map(ToString::to_string))])
}

fn parse_if_range(raw: &[&str]) -> Option<ParsedHeader> {
    if let Ok(tokens) = tokenize(raw, true)
        && let Some(etag) = ETag::from_tokens(&tokens)
    {
        return Some(ParsedHeader::IfRange(IfRange::ETag(etag)));
    }
    parse_date(grammar::last(raw)?).map(|date| ParsedHeader::IfRange(IfRange::Date(date)))
}

fn generate_if_range(value: &ParsedHeader) -> Option<Vec<String>> {
    match value.as_if_range()? {
        IfRange::ETag(etag) => Some(vec![etag.to_string()]),
        IfRange::Date(date) => Some(vec![format_date(*date)]),
    }
}

fn parse_content_type(raw: &[&str]) -> Option<ParsedHeader> {
    MimeType::parse(grammar::last(raw)?).map(ParsedHeader::MimeType)
}

fn generate_content_type(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![value.as_mime_type()?.to_string()])
}

fn parse_accept(raw: &[&str]) -> Option<ParsedHeader> {
    grammar::list(&tokenize(raw, true).ok()?, accept::accept_item).map(ParsedHeader::Accept)
}

fn generate_accept(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![grammar::generate_list(value.as_accept()?.iter().map(accept::generate_accept_item))])
}

fn qualities(raw: &[&str]) -> Option<Vec<accept::Qualified<String>>> {
    grammar::list(&tokenize(raw, true).ok()?, accept::quality_item)
}

fn parse_qualities(raw: &[&str]) -> Option<ParsedHeader> {
    qualities(raw).map(ParsedHeader::Qualities)
}

fn parse_accept_charset(raw: &[&str]) -> Option<ParsedHeader> {
    qualities(raw).map(accept::add_default_charset).map(ParsedHeader::Qualities)
}

fn parse_accept_encoding(raw: &[&str]) -> Option<ParsedHeader> {
    qualities(raw).map(accept::add_default_encoding).map(ParsedHeader::Qualities)
}

fn generate_qualities(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![grammar::generate_list(value.as_qualities()?.iter().map(accept::generate_quality_item))])
}

// the injected identity entry is implied, so it is not written back
fn generate_accept_encoding(value: &ParsedHeader) -> Option<Vec<String>> {
    let items = value.as_qualities()?.iter().filter(|item| !accept::is_default_encoding(item));
    Some(vec![grammar::generate_list(items.map(accept::generate_quality_item))])
}

fn parse_cache_control(raw: &[&str]) -> Option<ParsedHeader> {
    grammar::list(&tokenize(raw, true).ok()?, cache_control::directive).map(ParsedHeader::CacheControl)
}

fn generate_cache_control(value: &ParsedHeader) -> Option<Vec<String>> {
    let directives = value.as_cache_control()?.iter().map(cache_control::generate_directive);
    Some(vec![grammar::generate_list(directives)])
}

fn parse_range(raw: &[&str]) -> Option<ParsedHeader> {
    range::byte_ranges(&tokenize(raw, true).ok()?).map(ParsedHeader::Range)
}

fn generate_range(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![range::generate_byte_ranges(value.as_range()?)])
}

fn parse_content_range(raw: &[&str]) -> Option<ParsedHeader> {
    range::content_range(grammar::last(raw)?).map(ParsedHeader::ContentRange)
}

fn generate_content_range(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![range::generate_content_range(value.as_content_range()?)])
}

fn parse_cookie(raw: &[&str]) -> Option<ParsedHeader> {
    cookie::parse_cookie(raw).map(ParsedHeader::Cookies)
}

fn generate_cookie(value: &ParsedHeader) -> Option<Vec<String>> {
    cookie::generate_cookie(value.as_cookies()?)
}

fn parse_set_cookie(raw: &[&str]) -> Option<ParsedHeader> {
    cookie::parse_set_cookie(raw).map(ParsedHeader::Cookies)
}

fn generate_set_cookie(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(cookie::generate_set_cookie(value.as_cookies()?))
}

fn parse_set_cookie2(raw: &[&str]) -> Option<ParsedHeader> {
    cookie::parse_set_cookie2(raw).map(ParsedHeader::Cookies)
}

fn generate_set_cookie2(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(cookie::generate_set_cookie2(value.as_cookies()?))
}

fn parse_expect(raw: &[&str]) -> Option<ParsedHeader> {
    grammar::list(&tokenize(raw, true).ok()?, accept::expectation).map(ParsedHeader::Expect)
}

fn generate_expect(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![grammar::generate_list(value.as_expect()?.iter().map(accept::generate_expectation))])
}

fn parse_credentials(raw: &[&str]) -> Option<ParsedHeader> {
    auth::credentials(grammar::last(raw)?).map(ParsedHeader::Credentials)
}

fn generate_credentials(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(vec![auth::generate_credentials(value.as_credentials()?)])
}

fn parse_challenges(raw: &[&str]) -> Option<ParsedHeader> {
    auth::challenges(&tokenize(raw, false).ok()?).map(ParsedHeader::Challenges)
}

fn generate_challenges(value: &ParsedHeader) -> Option<Vec<String>> {
    Some(value.as_challenges()?.iter().map(auth::generate_challenge).collect())
}
