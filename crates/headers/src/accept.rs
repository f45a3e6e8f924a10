//! Content negotiation headers and `Expect`
//!
//! `Accept-Charset` and `Accept-Encoding` get the defaults RFC 2616 implies when a
//! value does not mention them: `iso-8859-1` at full quality, and `identity` at a
//! quality so low that it is only picked as a last resort.

use crate::grammar::{self, Params};
use crate::mime_type::MimeType;
use crate::tokenizer::Token;

pub(crate) const DEFAULT_CHARSET: &str = "iso-8859-1";
pub(crate) const DEFAULT_ENCODING: &str = "identity";
pub(crate) const DEFAULT_ENCODING_QUALITY: f32 = 0.0001;

/// A value with its `q` weight
#[derive(Debug, Clone, PartialEq)]
pub struct Qualified<T> {
    pub value: T,
    pub quality: f32,
}

impl<T> Qualified<T> {
    pub fn new(value: T, quality: f32) -> Self {
        Self { value, quality }
    }
}

/// One `Expect` entry, e.g. `100-continue`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub name: String,
    pub value: Option<String>,
    pub params: Params,
}

impl Expectation {
    pub fn is_continue(&self) -> bool {
        self.name == "100-continue"
    }
}

/// Splits parameters at the first `q`: parameters before it belong to the media type,
/// the ones after it are accept extensions and are dropped
pub(crate) fn accept_item(field: &[Token]) -> Option<Qualified<MimeType>> {
    let (head, params) = grammar::args(field)?;
    let (media_type, media_subtype) = grammar::media_range(head)?;

    let (params, quality) = match params.iter().position(|(key, _)| key == "q") {
        Some(index) => {
            let quality = grammar::parse_quality(params[index].1.as_deref())?;
            (params[..index].to_vec(), quality)
        }
        None => (params, 1.0),
    };

    Some(Qualified::new(MimeType { media_type, media_subtype, params }, quality))
}

pub(crate) fn generate_accept_item(item: &Qualified<MimeType>) -> String {
    let mut out = item.value.generate(true);
    if let Some(q) = grammar::format_quality(item.quality) {
        out.push_str(";q=");
        out.push_str(&q);
    }
    out
}

pub(crate) fn quality_item(field: &[Token]) -> Option<Qualified<String>> {
    let (head, params) = grammar::args(field)?;
    let value = grammar::single(head)?.to_owned();
    let quality = match params.iter().find(|(key, _)| key == "q") {
        Some((_, q)) => grammar::parse_quality(q.as_deref())?,
        None => 1.0,
    };
    Some(Qualified::new(value, quality))
}

pub(crate) fn generate_quality_item(item: &Qualified<String>) -> String {
    match grammar::format_quality(item.quality) {
        Some(q) => format!("{};q={q}", grammar::quote_if_needed(&item.value, true)),
        None => grammar::quote_if_needed(&item.value, true),
    }
}

pub(crate) fn add_default_charset(mut charsets: Vec<Qualified<String>>) -> Vec<Qualified<String>> {
    if !charsets.iter().any(|c| c.value == "*" || c.value == DEFAULT_CHARSET) {
        charsets.push(Qualified::new(DEFAULT_CHARSET.to_owned(), 1.0));
    }
    charsets
}

pub(crate) fn add_default_encoding(mut encodings: Vec<Qualified<String>>) -> Vec<Qualified<String>> {
    if !encodings.iter().any(|e| e.value == "*" || e.value == DEFAULT_ENCODING) {
        encodings.push(Qualified::new(DEFAULT_ENCODING.to_owned(), DEFAULT_ENCODING_QUALITY));
    }
    encodings
}

#[allow(clippy::float_cmp, reason = "the injected default is an exact constant")]
pub(crate) fn is_default_encoding(item: &Qualified<String>) -> bool {
    item.value == DEFAULT_ENCODING && item.quality == DEFAULT_ENCODING_QUALITY
}

pub(crate) fn expectation(field: &[Token]) -> Option<Expectation> {
    let (head, params) = grammar::args(field)?;
    let (name, value) = grammar::key_value(head)?;
    Some(Expectation { name, value, params })
}

pub(crate) fn generate_expectation(expectation: &Expectation) -> String {
    let mut out = expectation.name.clone();
    if let Some(value) = &expectation.value {
        out.push('=');
        out.push_str(&grammar::quote_if_needed(value, true));
    }
    if !expectation.params.is_empty() {
        out.push(';');
        out.push_str(&grammar::generate_key_values(&expectation.params, true));
    }
    out
}
