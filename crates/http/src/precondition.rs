//! Conditional request evaluation.
//!
//! [`check_preconditions`] applies `If-Match`, `If-Unmodified-Since`,
//! `If-None-Match` and `If-Modified-Since` to a response the application is about to
//! send, in RFC 2616 §13.3.4 precedence. When a condition short-circuits the request
//! the replacement response is returned instead of the original one:
//!
//! ```
//! use http::{Method, Request, Response, StatusCode};
//! use ferrule_http::precondition::{Precondition, check_preconditions};
//!
//! let request = Request::builder().method(Method::GET).header("If-None-Match", "\"foo\"").body(()).unwrap();
//! let response = Response::builder().header("ETag", "\"foo\"").body(()).unwrap();
//!
//! let Precondition::ShortCircuit(not_modified) = check_preconditions(&request, &response, true) else { panic!() };
//! assert_eq!(not_modified.status(), StatusCode::NOT_MODIFIED);
//! assert_eq!(not_modified.headers()["etag"], "\"foo\"");
//! ```
//!
//! Unparsable conditional headers are treated as absent, they never fail a request.
//! A [`Headers`] view found in the message extensions is used as is, so headers the
//! connection already parsed are not parsed again.

use std::borrow::Cow;

use ferrule_headers::{ETag, ETagMatch, Headers, IfRange, ParsedHeader, now};
use http::header::{
    CACHE_CONTROL, CONTENT_LOCATION, DATE, ETAG, EXPIRES, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE,
    IF_UNMODIFIED_SINCE, LAST_MODIFIED, PROXY_AUTHENTICATE, RANGE, SERVER, VARY, WARNING, WWW_AUTHENTICATE,
};
use http::{Extensions, HeaderMap, HeaderName, Method, Request, Response, StatusCode};
use tracing::debug;

/// Headers a `304 Not Modified` keeps from the response it replaces
static NOT_MODIFIED_HEADERS: [HeaderName; 10] = [
    DATE,
    ETAG,
    CONTENT_LOCATION,
    EXPIRES,
    CACHE_CONTROL,
    VARY,
    SERVER,
    PROXY_AUTHENTICATE,
    WWW_AUTHENTICATE,
    WARNING,
];

/// The outcome of [`check_preconditions`]
#[derive(Debug)]
pub enum Precondition {
    /// send the response as it is
    Proceed,
    /// send this bodyless `304` or `412` instead
    ShortCircuit(Response<()>),
}

impl Precondition {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Precondition::Proceed)
    }

    /// The replacing status, if any
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Precondition::Proceed => None,
            Precondition::ShortCircuit(response) => Some(response.status()),
        }
    }
}

/// Validators of the response being checked
struct Validators {
    etag: Option<ETag>,
    last_modified: Option<u64>,
}

impl Validators {
    fn of(headers: &Headers) -> Self {
        Self {
            etag: headers.get(&ETAG).and_then(ParsedHeader::as_etag).cloned(),
            last_modified: headers.get(&LAST_MODIFIED).and_then(ParsedHeader::as_date),
        }
    }

    /// Whether any entry of an `If-Match`/`If-None-Match` list selects the entity
    fn matches_any(&self, tags: &[ETagMatch], entity_exists: bool, strong: bool) -> bool {
        tags.iter().any(|tag| match tag {
            ETagMatch::Any => entity_exists,
            ETagMatch::Tag(tag) => self.etag.as_ref().is_some_and(|etag| etag.matches(tag, strong)),
        })
    }
}

/// Decides whether `response` may be sent for `request`.
///
/// Only successful responses are checked: an error or redirect chosen by the
/// application always wins over the conditional headers.
pub fn check_preconditions<B, T>(request: &Request<B>, response: &Response<T>, entity_exists: bool) -> Precondition {
    if !response.status().is_success() {
        return Precondition::Proceed;
    }

    let conditions = typed_headers(request.extensions(), request.headers());
    let validators = Validators::of(&typed_headers(response.extensions(), response.headers()));
    let safe = is_safe(request.method());

    if let Some(tags) = conditions.get(&IF_MATCH).and_then(ParsedHeader::as_etags)
        && !validators.matches_any(tags, entity_exists, true)
    {
        debug!("If-Match does not select the current entity");
        return precondition_failed();
    }

    if let Some(since) = conditions.get(&IF_UNMODIFIED_SINCE).and_then(ParsedHeader::as_date)
        && validators.last_modified.is_none_or(|last_modified| last_modified > since)
    {
        debug!(since, "entity modified since If-Unmodified-Since");
        return precondition_failed();
    }

    if let Some(tags) = conditions.get(&IF_NONE_MATCH).and_then(ParsedHeader::as_etags) {
        // a weak validator can't stand for the bytes of a sub-range
        let strong = !safe || conditions.contains(&RANGE);
        if !validators.matches_any(tags, entity_exists, strong) {
            return Precondition::Proceed;
        }
        if safe {
            return not_modified(response);
        }
        debug!(method = %request.method(), "If-None-Match selects the entity of an unsafe request");
        return precondition_failed();
    }

    if let Some(since) = conditions.get(&IF_MODIFIED_SINCE).and_then(ParsedHeader::as_date)
        && since <= now()
        && validators.last_modified.is_some_and(|last_modified| last_modified <= since)
    {
        return not_modified(response);
    }

    Precondition::Proceed
}

/// Whether a `Range` request may be answered with partial content, as decided by
/// `If-Range`. A weak validator never matches, an unparsable value never matches.
pub fn check_if_range<B, T>(request: &Request<B>, response: &Response<T>) -> bool {
    if !request.headers().contains_key(IF_RANGE) {
        return true;
    }

    let conditions = typed_headers(request.extensions(), request.headers());
    let validators = Validators::of(&typed_headers(response.extensions(), response.headers()));
    match conditions.get(&IF_RANGE).and_then(ParsedHeader::as_if_range) {
        Some(IfRange::ETag(tag)) => validators.etag.as_ref().is_some_and(|etag| etag.matches(tag, true)),
        Some(IfRange::Date(date)) => validators.last_modified.is_some_and(|last_modified| last_modified <= *date),
        None => false,
    }
}

/// The cached typed view of a message, or a fresh one over its header map
fn typed_headers<'a>(extensions: &'a Extensions, headers: &HeaderMap) -> Cow<'a, Headers> {
    match extensions.get::<Headers>() {
        Some(typed) => Cow::Borrowed(typed),
        None => Cow::Owned(Headers::from(headers)),
    }
}

fn is_safe(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

fn precondition_failed() -> Precondition {
    let mut response = Response::new(());
    *response.status_mut() = StatusCode::PRECONDITION_FAILED;
    Precondition::ShortCircuit(response)
}

fn not_modified<T>(original: &Response<T>) -> Precondition {
    let mut response = Response::new(());
    *response.status_mut() = StatusCode::NOT_MODIFIED;
    *response.version_mut() = original.version();

    let headers = response.headers_mut();
    for name in &NOT_MODIFIED_HEADERS {
        for value in original.headers().get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    Precondition::ShortCircuit(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_headers::format_date;
    use http::HeaderValue;

    const LAST_MODIFIED_AT: u64 = 1_000_000_000;

    fn request(method: Method, headers: &[(HeaderName, &str)]) -> Request<()> {
        let mut request = Request::new(());
        *request.method_mut() = method;
        for (name, value) in headers {
            request.headers_mut().append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        request
    }

    fn response(etag: Option<&str>) -> Response<()> {
        let mut response = Response::new(());
        let headers = response.headers_mut();
        if let Some(etag) = etag {
            headers.insert(ETAG, HeaderValue::from_str(etag).unwrap());
        }
        headers.insert(LAST_MODIFIED, HeaderValue::from_str(&format_date(LAST_MODIFIED_AT)).unwrap());
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
        headers.insert("x-private", HeaderValue::from_static("1"));
        response
    }

    fn check(method: Method, headers: &[(HeaderName, &str)], etag: Option<&str>) -> Option<StatusCode> {
        check_preconditions(&request(method, headers), &response(etag), true).status()
    }

    #[test]
    fn test_without_conditions() {
        assert_eq!(check(Method::GET, &[], Some("\"foo\"")), None);
    }

    #[test]
    fn test_if_none_match_not_modified() {
        let request = request(Method::GET, &[(IF_NONE_MATCH, "\"foo\"")]);
        let Precondition::ShortCircuit(response) = check_preconditions(&request, &response(Some("\"foo\"")), true) else {
            panic!("expected short circuit");
        };

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[ETAG], "\"foo\"");
        assert_eq!(response.headers()[CACHE_CONTROL], "max-age=60");
        assert!(!response.headers().contains_key(LAST_MODIFIED));
        assert!(!response.headers().contains_key("x-private"));
    }

    #[test]
    fn test_if_none_match_other_tag() {
        assert_eq!(check(Method::GET, &[(IF_NONE_MATCH, "\"bar\", \"baz\"")], Some("\"foo\"")), None);
    }

    #[test]
    fn test_if_none_match_unsafe_method() {
        assert_eq!(
            check(Method::PUT, &[(IF_NONE_MATCH, "\"foo\"")], Some("\"foo\"")),
            Some(StatusCode::PRECONDITION_FAILED)
        );
        assert_eq!(check(Method::PUT, &[(IF_NONE_MATCH, "*")], None), Some(StatusCode::PRECONDITION_FAILED));
    }

    #[test]
    fn test_if_none_match_weak() {
        assert_eq!(check(Method::GET, &[(IF_NONE_MATCH, "W/\"foo\"")], Some("\"foo\"")), Some(StatusCode::NOT_MODIFIED));
        assert_eq!(check(Method::DELETE, &[(IF_NONE_MATCH, "W/\"foo\"")], Some("\"foo\"")), None);
        assert_eq!(check(Method::GET, &[(IF_NONE_MATCH, "W/\"foo\""), (RANGE, "bytes=0-5")], Some("\"foo\"")), None);
    }

    #[test]
    fn test_if_none_match_star() {
        let request = request(Method::GET, &[(IF_NONE_MATCH, "*")]);
        assert_eq!(check_preconditions(&request, &response(None), true).status(), Some(StatusCode::NOT_MODIFIED));
        assert!(check_preconditions(&request, &response(None), false).is_proceed());
    }

    #[test]
    fn test_if_match() {
        assert_eq!(check(Method::PUT, &[(IF_MATCH, "\"foo\"")], Some("\"foo\"")), None);
        assert_eq!(check(Method::PUT, &[(IF_MATCH, "\"bar\"")], Some("\"foo\"")), Some(StatusCode::PRECONDITION_FAILED));
        assert_eq!(check(Method::PUT, &[(IF_MATCH, "\"foo\"")], None), Some(StatusCode::PRECONDITION_FAILED));
        // weak tags never match strongly
        assert_eq!(check(Method::GET, &[(IF_MATCH, "W/\"foo\"")], Some("W/\"foo\"")), Some(StatusCode::PRECONDITION_FAILED));
    }

    #[test]
    fn test_if_match_star() {
        let request = request(Method::PUT, &[(IF_MATCH, "*")]);
        assert!(check_preconditions(&request, &response(None), true).is_proceed());
        assert_eq!(check_preconditions(&request, &response(None), false).status(), Some(StatusCode::PRECONDITION_FAILED));
    }

    #[test]
    fn test_error_response_skips_preconditions() {
        let request = request(Method::PUT, &[(IF_MATCH, "\"bar\"")]);
        let mut response = response(Some("\"foo\""));
        *response.status_mut() = StatusCode::NOT_FOUND;
        assert!(check_preconditions(&request, &response, false).is_proceed());
    }

    #[test]
    fn test_if_unmodified_since() {
        let before = format_date(LAST_MODIFIED_AT - 1);
        let at = format_date(LAST_MODIFIED_AT);
        assert_eq!(check(Method::PUT, &[(IF_UNMODIFIED_SINCE, &at)], None), None);
        assert_eq!(check(Method::PUT, &[(IF_UNMODIFIED_SINCE, &before)], None), Some(StatusCode::PRECONDITION_FAILED));
        assert_eq!(check(Method::PUT, &[(IF_UNMODIFIED_SINCE, "yesterday-ish")], None), None);

        let mut response = Response::new(());
        *response.status_mut() = StatusCode::OK;
        let request = request(Method::PUT, &[(IF_UNMODIFIED_SINCE, &at)]);
        assert_eq!(check_preconditions(&request, &response, true).status(), Some(StatusCode::PRECONDITION_FAILED));
    }

    #[test]
    fn test_if_modified_since() {
        let at = format_date(LAST_MODIFIED_AT);
        let before = format_date(LAST_MODIFIED_AT - 1);
        let future = format_date(now() + 3600);
        assert_eq!(check(Method::GET, &[(IF_MODIFIED_SINCE, &at)], None), Some(StatusCode::NOT_MODIFIED));
        assert_eq!(check(Method::HEAD, &[(IF_MODIFIED_SINCE, &at)], None), Some(StatusCode::NOT_MODIFIED));
        assert_eq!(check(Method::GET, &[(IF_MODIFIED_SINCE, &before)], None), None);
        assert_eq!(check(Method::GET, &[(IF_MODIFIED_SINCE, &future)], None), None);
        assert_eq!(check(Method::GET, &[(IF_MODIFIED_SINCE, "garbage")], None), None);
        assert_eq!(check(Method::POST, &[(IF_MODIFIED_SINCE, &at)], None), Some(StatusCode::NOT_MODIFIED));
        assert_eq!(check(Method::DELETE, &[(IF_MODIFIED_SINCE, &before)], None), None);
    }

    #[test]
    fn test_cached_headers_are_used() {
        // the typed view wins over the raw map it was built from
        let cached = Headers::from(request(Method::GET, &[(IF_NONE_MATCH, "\"foo\"")]).headers());
        let mut bare = request(Method::GET, &[]);
        bare.extensions_mut().insert(cached);
        assert_eq!(check_preconditions(&bare, &response(Some("\"foo\"")), true).status(), Some(StatusCode::NOT_MODIFIED));
    }

    #[test]
    fn test_if_none_match_overrides_if_modified_since() {
        let at = format_date(LAST_MODIFIED_AT);
        assert_eq!(check(Method::GET, &[(IF_NONE_MATCH, "\"bar\""), (IF_MODIFIED_SINCE, &at)], Some("\"foo\"")), None);
    }

    #[test]
    fn test_if_range() {
        let check = |value: &str, etag: Option<&str>| {
            check_if_range(&request(Method::GET, &[(RANGE, "bytes=0-1"), (IF_RANGE, value)]), &response(etag))
        };
        assert!(check_if_range(&request(Method::GET, &[(RANGE, "bytes=0-1")]), &response(None)));
        assert!(check("\"foo\"", Some("\"foo\"")));
        assert!(!check("\"bar\"", Some("\"foo\"")));
        assert!(!check("W/\"foo\"", Some("W/\"foo\"")));
        assert!(check(&format_date(LAST_MODIFIED_AT), None));
        assert!(check(&format_date(LAST_MODIFIED_AT + 10), None));
        assert!(!check(&format_date(LAST_MODIFIED_AT - 10), None));
        assert!(!check("not a validator", None));
    }
}
