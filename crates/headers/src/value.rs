use crate::accept::{Expectation, Qualified};
use crate::auth::{Challenge, Credentials};
use crate::cache_control::CacheDirective;
use crate::cookie::Cookie;
use crate::etag::{ETag, ETagMatch};
use crate::mime_type::MimeType;
use crate::range::{ByteRanges, ContentRange};

/// `If-Range` carries either a validator or a date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfRange {
    ETag(ETag),
    Date(u64),
}

/// The typed form of a header, as produced by [`parse_header`](crate::parse_header)
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedHeader {
    /// comma separated tokens, e.g. `Connection` or `Vary`
    Tokens(Vec<String>),
    /// the last raw value, e.g. `Host` or `Location`
    Text(String),
    Integer(u64),
    /// seconds since the epoch
    Date(u64),
    ETag(ETag),
    ETags(Vec<ETagMatch>),
    IfRange(IfRange),
    MimeType(MimeType),
    Accept(Vec<Qualified<MimeType>>),
    Qualities(Vec<Qualified<String>>),
    CacheControl(Vec<CacheDirective>),
    Range(ByteRanges),
    ContentRange(ContentRange),
    Cookies(Vec<Cookie>),
    Expect(Vec<Expectation>),
    Credentials(Credentials),
    Challenges(Vec<Challenge>),
}

macro_rules! accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Option<&$ty> {
            match self {
                ParsedHeader::$variant(value) => Some(value),
                _ => None,
            }
        }
    };
}

impl ParsedHeader {
    accessor!(as_tokens, Tokens, [String]);
    accessor!(as_text, Text, str);
    accessor!(as_etag, ETag, ETag);
    accessor!(as_etags, ETags, [ETagMatch]);
    accessor!(as_if_range, IfRange, IfRange);
    accessor!(as_mime_type, MimeType, MimeType);
    accessor!(as_accept, Accept, [Qualified<MimeType>]);
    accessor!(as_qualities, Qualities, [Qualified<String>]);
    accessor!(as_cache_control, CacheControl, [CacheDirective]);
    accessor!(as_range, Range, ByteRanges);
    accessor!(as_content_range, ContentRange, ContentRange);
    accessor!(as_cookies, Cookies, [Cookie]);
    accessor!(as_expect, Expect, [Expectation]);
    accessor!(as_credentials, Credentials, Credentials);
    accessor!(as_challenges, Challenges, [Challenge]);

    pub fn as_integer(&self) -> Option<u64> {
        match self {
            ParsedHeader::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<u64> {
        match self {
            ParsedHeader::Date(value) => Some(*value),
            _ => None,
        }
    }
}
