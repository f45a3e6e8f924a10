use std::fmt;

use crate::grammar::{self, Params};
use crate::tokenizer::tokenize;

/// A media type with its ordered parameters
///
/// Type and subtype are compared lower-cased; parameter values keep their case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    pub media_type: String,
    pub media_subtype: String,
    pub params: Params,
}

impl MimeType {
    pub fn new(media_type: impl Into<String>, media_subtype: impl Into<String>) -> Self {
        Self { media_type: media_type.into(), media_subtype: media_subtype.into(), params: Vec::new() }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), Some(value.into())));
        self
    }

    /// The value of the first parameter called `key`
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).and_then(|(_, v)| v.as_deref())
    }

    /// Parses a `Content-Type` value
    pub fn parse(value: &str) -> Option<Self> {
        let tokens = tokenize(&[value], false).ok()?;
        let (head, params) = grammar::args(&tokens)?;
        let (media_type, media_subtype) = grammar::media_range(head)?;
        let params = params.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();
        Some(Self { media_type: media_type.to_ascii_lowercase(), media_subtype: media_subtype.to_ascii_lowercase(), params })
    }

    pub(crate) fn generate(&self, fold_case: bool) -> String {
        let mut out = format!("{}/{}", self.media_type, self.media_subtype);
        if !self.params.is_empty() {
            out.push(';');
            out.push_str(&grammar::generate_key_values(&self.params, fold_case));
        }
        out
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.generate(false))
    }
}
