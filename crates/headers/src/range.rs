use std::fmt;

use crate::grammar;
use crate::tokenizer::Token;

/// A single `first-last` byte range; either bound may be missing, but not both
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        f.write_str("-")?;
        if let Some(end) = self.end {
            write!(f, "{end}")?;
        }
        Ok(())
    }
}

/// The value of a `Range` request header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteRanges {
    pub unit: String,
    pub ranges: Vec<ByteRange>,
}

impl ByteRanges {
    pub fn bytes(ranges: Vec<ByteRange>) -> Self {
        Self { unit: "bytes".to_owned(), ranges }
    }
}

/// The value of a `Content-Range` response header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRange {
    pub unit: String,
    /// inclusive `(first, last)`, `None` for `*`
    pub range: Option<(u64, u64)>,
    /// `None` when the complete length is unknown
    pub complete_length: Option<u64>,
}

pub(crate) fn byte_ranges(tokens: &[Token]) -> Option<ByteRanges> {
    let [unit, eq, specs @ ..] = tokens else {
        return None;
    };
    let unit = unit.as_str()?;
    if !eq.is_separator('=') || unit != "bytes" {
        return None;
    }

    let ranges = grammar::split(specs, ',').map(byte_range).collect::<Option<Vec<_>>>()?;
    if ranges.is_empty() {
        return None;
    }
    Some(ByteRanges { unit: unit.to_owned(), ranges })
}

fn byte_range(spec: &[Token]) -> Option<ByteRange> {
    let (start, end) = grammar::single(spec)?.split_once('-')?;
    let start = bound(start)?;
    let end = bound(end)?;
    match (start, end) {
        (None, None) => None,
        (Some(start), Some(end)) if start > end => None,
        _ => Some(ByteRange { start, end }),
    }
}

// Some(None) for an empty bound, None for garbage
fn bound(value: &str) -> Option<Option<u64>> {
    if value.is_empty() { Some(None) } else { value.parse().ok().map(Some) }
}

pub(crate) fn generate_byte_ranges(ranges: &ByteRanges) -> String {
    let specs = ranges.ranges.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
    format!("{}={specs}", ranges.unit)
}

pub(crate) fn content_range(value: &str) -> Option<ContentRange> {
    let mut parts = value.split_whitespace();
    let unit = parts.next()?.to_ascii_lowercase();
    let rest = parts.next()?;
    if parts.next().is_some() || unit != "bytes" {
        return None;
    }

    let (range, length) = rest.split_once('/')?;
    let range = match range {
        "*" => None,
        range => {
            let (first, last) = range.split_once('-')?;
            Some((first.parse().ok()?, last.parse().ok()?))
        }
    };
    let complete_length = match length {
        "*" => None,
        length => Some(length.parse().ok()?),
    };
    Some(ContentRange { unit, range, complete_length })
}

pub(crate) fn generate_content_range(content_range: &ContentRange) -> String {
    let range = match content_range.range {
        Some((first, last)) => format!("{first}-{last}"),
        None => "*".to_owned(),
    };
    let length = content_range.complete_length.map_or_else(|| "*".to_owned(), |length| length.to_string());
    format!("{} {range}/{length}", content_range.unit)
}
