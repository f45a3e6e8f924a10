//! Two-layer header storage
//!
//! [`Headers`] keeps the raw values of every header in arrival order, next to a
//! lazily filled cache of their parsed form. Reading the parsed form of a header parses
//! its raw values once; setting a parsed value drops the raw values, which are generated
//! again on the next raw access. Any write to one layer invalidates the other.
//!
//! Raw values are decoded as ISO-8859-1 for parsing, so every byte sequence has a
//! textual form and generating it back yields the original bytes.

use std::collections::HashMap;

use http::{HeaderMap, HeaderName, HeaderValue};
use once_cell::sync::OnceCell;
use tracing::warn;

use crate::registry::{canonical_name, generate_header, parse_header};
use crate::value::ParsedHeader;

#[derive(Debug, Clone, Default)]
struct Entry {
    raw: OnceCell<Vec<HeaderValue>>,
    parsed: OnceCell<Option<ParsedHeader>>,
}

impl Entry {
    fn from_raw(values: Vec<HeaderValue>) -> Self {
        Self { raw: OnceCell::with_value(values), parsed: OnceCell::new() }
    }

    fn from_parsed(value: ParsedHeader) -> Self {
        Self { raw: OnceCell::new(), parsed: OnceCell::with_value(Some(value)) }
    }
}

/// An ordered, case-insensitive header multimap with a parsed value cache
#[derive(Debug, Clone, Default)]
pub struct Headers {
    order: Vec<HeaderName>,
    entries: HashMap<HeaderName, Entry>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.entries.contains_key(name)
    }

    /// The raw values of `name`, generating them from the parsed value when needed
    pub fn raw(&self, name: &HeaderName) -> Option<&[HeaderValue]> {
        let entry = self.entries.get(name)?;
        Some(entry.raw.get_or_init(|| {
            let parsed = entry.parsed.get().and_then(Option::as_ref);
            parsed.map(|value| generate_values(name, value)).unwrap_or_default()
        }))
    }

    /// The parsed value of `name`, `None` when absent or not parsable
    pub fn get(&self, name: &HeaderName) -> Option<&ParsedHeader> {
        let entry = self.entries.get(name)?;
        entry
            .parsed
            .get_or_init(|| {
                let raw = entry.raw.get().map(Vec::as_slice).unwrap_or_default();
                parse_header(name.as_str(), &decode_values(raw))
            })
            .as_ref()
    }

    /// Replaces all raw values of `name`
    pub fn set_raw(&mut self, name: HeaderName, values: Vec<HeaderValue>) {
        self.insert(name, Entry::from_raw(values));
    }

    /// Appends one raw value, dropping the cached parsed value
    pub fn append_raw(&mut self, name: HeaderName, value: HeaderValue) {
        let mut values = self.raw(&name).map(<[_]>::to_vec).unwrap_or_default();
        values.push(value);
        self.insert(name, Entry::from_raw(values));
    }

    /// Replaces `name` with a parsed value; the raw values are generated on demand
    pub fn set(&mut self, name: HeaderName, value: ParsedHeader) {
        self.insert(name, Entry::from_parsed(value));
    }

    pub fn remove(&mut self, name: &HeaderName) -> bool {
        if self.entries.remove(name).is_none() {
            return false;
        }
        self.order.retain(|n| n != name);
        true
    }

    /// Every header with its raw values, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &[HeaderValue])> {
        self.order.iter().filter_map(|name| Some((name, self.raw(name)?)))
    }

    /// Every header with the capitalization used on the wire
    pub fn iter_canonical(&self) -> impl Iterator<Item = (std::borrow::Cow<'static, str>, &[HeaderValue])> {
        self.iter().map(|(name, values)| (canonical_name(name.as_str()), values))
    }

    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.len());
        for (name, values) in self.iter() {
            for value in values {
                map.append(name.clone(), value.clone());
            }
        }
        map
    }

    fn insert(&mut self, name: HeaderName, entry: Entry) {
        if self.entries.insert(name.clone(), entry).is_none() {
            self.order.push(name);
        }
    }
}

impl From<&HeaderMap> for Headers {
    fn from(map: &HeaderMap) -> Self {
        let mut headers = Headers::new();
        for name in map.keys() {
            headers.set_raw(name.clone(), map.get_all(name).iter().cloned().collect());
        }
        headers
    }
}

impl From<HeaderMap> for Headers {
    fn from(map: HeaderMap) -> Self {
        Self::from(&map)
    }
}

impl From<Headers> for HeaderMap {
    fn from(headers: Headers) -> Self {
        headers.to_header_map()
    }
}

/// ISO-8859-1 decoding, total over all byte sequences
pub fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}

/// The inverse of [`latin1_decode`]; characters beyond U+00FF fall back to UTF-8
pub fn latin1_encode(value: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.len());
    for c in value.chars() {
        match u8::try_from(c) {
            Ok(byte) => bytes.push(byte),
            Err(_) => bytes.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
        }
    }
    bytes
}

fn decode_values(values: &[HeaderValue]) -> Vec<String> {
    values.iter().map(|value| latin1_decode(value.as_bytes())).collect()
}

fn generate_values(name: &HeaderName, value: &ParsedHeader) -> Vec<HeaderValue> {
    let Some(generated) = generate_header(name.as_str(), value) else {
        warn!(header = %name, "can't generate header from parsed value, header dropped");
        return Vec::new();
    };
    generated
        .iter()
        .filter_map(|value| match HeaderValue::from_bytes(&latin1_encode(value)) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(header = %name, cause = %e, "generated invalid header value, value dropped");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etag::ETag;
    use http::header::{CONTENT_LENGTH, ETAG, HOST, IF_NONE_MATCH};

    #[test]
    fn test_lazy_parse() {
        let mut map = HeaderMap::new();
        map.append(CONTENT_LENGTH, HeaderValue::from_static("12"));
        map.append(IF_NONE_MATCH, HeaderValue::from_static("\"a\""));
        map.append(IF_NONE_MATCH, HeaderValue::from_static("\"b\""));

        let headers = Headers::from(&map);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get(&CONTENT_LENGTH), Some(&ParsedHeader::Integer(12)));
        assert_eq!(headers.get(&IF_NONE_MATCH).and_then(ParsedHeader::as_etags).map(<[_]>::len), Some(2));
        assert_eq!(headers.get(&HOST), None);
    }

    #[test]
    fn test_set_parsed_regenerates_raw() {
        let mut headers = Headers::new();
        headers.set(ETAG, ParsedHeader::ETag(ETag::weak("v1")));
        assert_eq!(headers.raw(&ETAG), Some(&[HeaderValue::from_static("W/\"v1\"")][..]));
    }

    #[test]
    fn test_set_raw_invalidates_parsed() {
        let mut headers = Headers::new();
        headers.set(CONTENT_LENGTH, ParsedHeader::Integer(1));
        headers.set_raw(CONTENT_LENGTH, vec![HeaderValue::from_static("2")]);
        assert_eq!(headers.get(&CONTENT_LENGTH), Some(&ParsedHeader::Integer(2)));

        headers.append_raw(CONTENT_LENGTH, HeaderValue::from_static("3"));
        assert_eq!(headers.get(&CONTENT_LENGTH), Some(&ParsedHeader::Integer(3)));
        assert_eq!(headers.raw(&CONTENT_LENGTH).map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_unparsable_raw_is_kept() {
        let mut headers = Headers::new();
        headers.set_raw(CONTENT_LENGTH, vec![HeaderValue::from_static("lots")]);
        assert_eq!(headers.get(&CONTENT_LENGTH), None);
        assert_eq!(headers.raw(&CONTENT_LENGTH), Some(&[HeaderValue::from_static("lots")][..]));
    }

    #[test]
    fn test_order_and_canonical_names() {
        let mut headers = Headers::new();
        headers.set_raw(HOST, vec![HeaderValue::from_static("example.com")]);
        headers.set(ETAG, ParsedHeader::ETag(ETag::strong("x")));
        headers.set_raw(HOST, vec![HeaderValue::from_static("example.org")]);

        let names = headers.iter_canonical().map(|(name, _)| name.into_owned()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Host", "ETag"]);

        assert!(headers.remove(&HOST));
        assert!(!headers.remove(&HOST));
        assert_eq!(headers.to_header_map().len(), 1);
    }

    #[test]
    fn test_latin1_round_trip() {
        let bytes = (0..=255u8).collect::<Vec<_>>();
        assert_eq!(latin1_encode(&latin1_decode(&bytes)), bytes);
    }
}
