use std::fmt;

use crate::grammar::quote;
use crate::tokenizer::Token;

/// An entity tag, `"xyzzy"` or `W/"xyzzy"`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ETag {
    pub tag: String,
    pub weak: bool,
}

impl ETag {
    pub fn strong(tag: impl Into<String>) -> Self {
        Self { tag: tag.into(), weak: false }
    }

    pub fn weak(tag: impl Into<String>) -> Self {
        Self { tag: tag.into(), weak: true }
    }

    /// Compares two tags. The strong comparison function only accepts two identical
    /// strong tags; the weak one ignores the weak flag on both sides.
    pub fn matches(&self, other: &ETag, strong: bool) -> bool {
        if strong && (self.weak || other.weak) {
            return false;
        }
        self.tag == other.tag
    }

    /// The opaque tag must be a quoted string, `W/` may prefix it
    pub(crate) fn from_tokens(tokens: &[Token]) -> Option<Self> {
        match tokens {
            [Token::Quoted(tag)] => Some(Self::strong(tag.as_str())),
            [Token::Text(w), slash, Token::Quoted(tag)] if w.eq_ignore_ascii_case("w") && slash.is_separator('/') => {
                Some(Self::weak(tag.as_str()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weak {
            f.write_str("W/")?;
        }
        f.write_str(&quote(&self.tag))
    }
}

/// One entry of an `If-Match` / `If-None-Match` list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ETagMatch {
    /// `*`, matching any current entity
    Any,
    Tag(ETag),
}

impl ETagMatch {
    pub(crate) fn from_tokens(tokens: &[Token]) -> Option<Self> {
        match tokens {
            [Token::Text(star)] if star == "*" => Some(ETagMatch::Any),
            _ => ETag::from_tokens(tokens).map(ETagMatch::Tag),
        }
    }
}

impl fmt::Display for ETagMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ETagMatch::Any => f.write_str("*"),
            ETagMatch::Tag(etag) => etag.fmt(f),
        }
    }
}
