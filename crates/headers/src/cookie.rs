//! Cookies in their three wire forms
//!
//! - `Cookie`: Netscape `name=value; name2=value2`, or RFC 2965 when the header starts
//!   with `$Version`, where `$Path`, `$Domain` and `$Port` attach to the cookie before them.
//! - `Set-Cookie`: the Netscape response form with `expires`, `path`, `domain` and `secure`.
//! - `Set-Cookie2`: the RFC 2965 response form.
//!
//! A malformed entry in a response header is skipped instead of failing the whole header.
//! A header without a single valid cookie does not parse.

use tracing::debug;

use crate::date::{format_date, now, parse_date};
use crate::grammar::{self, quote};
use crate::tokenizer::{Token, tokenize};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    /// `Some(vec![])` for a bare `Port` attribute
    pub ports: Option<Vec<u16>>,
    /// seconds since the epoch
    pub expires: Option<u64>,
    pub discard: bool,
    pub secure: bool,
    pub comment: Option<String>,
    pub comment_url: Option<String>,
    pub version: u32,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), ..Self::default() }
    }
}

pub(crate) fn parse_cookie(values: &[&str]) -> Option<Vec<Cookie>> {
    let header = values.join(";");
    let cookies =
        if header.trim_start().starts_with('$') { parse_rfc2965_cookie(&header)? } else { parse_netscape_cookie(&header) };
    (!cookies.is_empty()).then_some(cookies)
}

fn parse_netscape_cookie(header: &str) -> Vec<Cookie> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            // `$` names are RFC 2965 attributes
            (!name.is_empty() && !name.starts_with('$')).then(|| Cookie::new(name, value.trim()))
        })
        .collect()
}

fn parse_rfc2965_cookie(header: &str) -> Option<Vec<Cookie>> {
    let tokens = tokenize(&[header], false).ok()?;
    let mut cookies: Vec<Cookie> = Vec::new();
    let mut version = 0;

    for part in grammar::split(&tokens, ',').flat_map(|field| grammar::split(field, ';')) {
        if part.is_empty() {
            continue;
        }
        if !matches!(part.first(), Some(Token::Text(_))) {
            return None;
        }
        let (name, value) = grammar::key_value(part)?;
        let name = name.to_ascii_lowercase();
        match (name.as_str(), value) {
            ("$version", Some(v)) => version = v.trim().parse().ok()?,
            ("$path", value) => cookies.last_mut()?.path = value,
            ("$domain", value) => cookies.last_mut()?.domain = value,
            ("$port", value) => cookies.last_mut()?.ports = Some(ports(value.as_deref())?),
            (name, _) if name.starts_with('$') => return None,
            (name, value) => {
                let mut cookie = Cookie::new(name, value.unwrap_or_default());
                cookie.version = version;
                cookies.push(cookie);
            }
        }
    }
    Some(cookies)
}

fn ports(value: Option<&str>) -> Option<Vec<u16>> {
    match value {
        None => Some(Vec::new()),
        Some(value) => value.split(',').map(|port| port.trim().parse().ok()).collect(),
    }
}

pub(crate) fn generate_cookie(cookies: &[Cookie]) -> Option<Vec<String>> {
    let first = cookies.first()?;

    if cookies.iter().all(is_netscape) {
        let pairs = cookies.iter().map(|c| format!("{}={}", c.name, c.value)).collect::<Vec<_>>();
        return Some(vec![pairs.join(";")]);
    }

    let mut version = first.version;
    let mut parts = vec![format!("$Version=\"{version}\"")];
    for cookie in cookies {
        if cookie.version != version {
            version = cookie.version;
            parts.push(format!("$Version=\"{version}\""));
        }
        parts.push(format!("{}={}", cookie.name, quote(&cookie.value)));
        if let Some(path) = &cookie.path {
            parts.push(format!("$Path={}", quote(path)));
        }
        if let Some(domain) = &cookie.domain {
            parts.push(format!("$Domain={}", quote(domain)));
        }
        if let Some(ports) = &cookie.ports {
            if ports.is_empty() {
                parts.push("$Port".to_owned());
            } else {
                parts.push(format!("$Port={}", quote(&join_ports(ports))));
            }
        }
    }
    Some(vec![parts.join(";")])
}

/// Whether the plain `name=value` form carries everything about `cookie`
fn is_netscape(cookie: &Cookie) -> bool {
    cookie.version == 0
        && cookie.path.is_none()
        && cookie.domain.is_none()
        && cookie.ports.is_none()
        && !cookie.value.contains(';')
        && cookie.value.trim() == cookie.value
}

fn join_ports(ports: &[u16]) -> String {
    ports.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

const NETSCAPE_ATTRIBUTES: [&str; 5] = ["expires", "max-age", "path", "domain", "secure"];

pub(crate) fn parse_set_cookie(values: &[&str]) -> Option<Vec<Cookie>> {
    let cookies = values
        .iter()
        .filter_map(|value| {
            let cookie = parse_netscape_set_cookie(value);
            if cookie.is_none() {
                debug!(value, "skip invalid set-cookie value");
            }
            cookie
        })
        .collect::<Vec<_>>();
    (!cookies.is_empty()).then_some(cookies)
}

fn parse_netscape_set_cookie(value: &str) -> Option<Cookie> {
    let mut parts = value.split(';');
    let (name, cookie_value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() || name.starts_with('$') {
        return None;
    }
    let mut attributes = Vec::new();
    for part in parts {
        let (key, value) = match part.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value.trim())),
            None => (part.trim(), None),
        };
        if key.is_empty() {
            continue;
        }
        let key = key.to_ascii_lowercase();
        if !NETSCAPE_ATTRIBUTES.contains(&key.as_str()) {
            continue;
        }
        // netscape cookies do not quote, but people send quoted expiry dates anyway
        let value = value.map(|v| v.trim_matches(|c: char| c == '"' || c.is_whitespace()).to_owned());
        attributes.push((key, value));
    }

    let mut cookie = Cookie::new(name, cookie_value.trim());
    apply_attributes(&mut cookie, attributes)?;
    Some(cookie)
}

pub(crate) fn parse_set_cookie2(values: &[&str]) -> Option<Vec<Cookie>> {
    let tokens = tokenize(values, true).ok()?;
    let mut cookies = Vec::new();
    for field in grammar::split(&tokens, ',') {
        match parse_rfc2965_set_cookie(field) {
            Some(cookie) => cookies.push(cookie),
            None => debug!("skip invalid set-cookie2 value"),
        }
    }
    (!cookies.is_empty()).then_some(cookies)
}

fn parse_rfc2965_set_cookie(field: &[Token]) -> Option<Cookie> {
    let mut parts = grammar::split(field, ';');
    let (name, value) = grammar::key_value(parts.next()?)?;
    if name.starts_with('$') {
        return None;
    }
    let attributes = parts
        .filter(|part| !part.is_empty())
        .map(grammar::key_value)
        .collect::<Option<Vec<_>>>()?;

    let mut cookie = Cookie::new(name, value?);
    apply_attributes(&mut cookie, attributes)?;
    Some(cookie)
}

fn apply_attributes(cookie: &mut Cookie, attributes: Vec<(String, Option<String>)>) -> Option<()> {
    let mut had_max_age = false;
    for (key, value) in attributes {
        match (key.as_str(), value) {
            ("discard", _) => cookie.discard = true,
            ("secure", _) => cookie.secure = true,
            ("port", value) => cookie.ports = Some(ports(value.as_deref())?),
            ("max-age", Some(value)) => {
                let seconds: u64 = value.trim().parse().ok()?;
                cookie.expires = Some(now().saturating_add(seconds));
                had_max_age = true;
            }
            ("expires", Some(value)) if !had_max_age => cookie.expires = Some(parse_date(&value)?),
            ("comment", value) => cookie.comment = value,
            ("commenturl", value) => cookie.comment_url = value,
            ("domain", value) => cookie.domain = value,
            ("path", value) => cookie.path = value,
            ("version", Some(value)) => cookie.version = value.trim().parse().ok()?,
            _ => {}
        }
    }
    Some(())
}

pub(crate) fn generate_set_cookie(cookies: &[Cookie]) -> Vec<String> {
    cookies
        .iter()
        .map(|cookie| {
            let mut out = format!("{}={}", cookie.name, cookie.value);
            if let Some(expires) = cookie.expires {
                out.push_str("; expires=");
                out.push_str(&format_date(expires));
            }
            if let Some(path) = &cookie.path {
                out.push_str("; path=");
                out.push_str(path);
            }
            if let Some(domain) = &cookie.domain {
                out.push_str("; domain=");
                out.push_str(domain);
            }
            if cookie.secure {
                out.push_str("; secure");
            }
            out
        })
        .collect()
}

pub(crate) fn generate_set_cookie2(cookies: &[Cookie]) -> Vec<String> {
    cookies
        .iter()
        .map(|cookie| {
            let mut out = vec![format!("{}={}", cookie.name, quote(&cookie.value))];
            if let Some(comment) = &cookie.comment {
                out.push(format!("Comment={}", quote(comment)));
            }
            if let Some(comment_url) = &cookie.comment_url {
                out.push(format!("CommentURL={}", quote(comment_url)));
            }
            if cookie.discard {
                out.push("Discard".to_owned());
            }
            if let Some(domain) = &cookie.domain {
                out.push(format!("Domain={}", quote(domain)));
            }
            if let Some(expires) = cookie.expires {
                out.push(format!("Max-Age={}", expires.saturating_sub(now())));
            }
            if let Some(path) = &cookie.path {
                out.push(format!("Path={}", quote(path)));
            }
            if let Some(ports) = &cookie.ports {
                if ports.is_empty() {
                    out.push("Port".to_owned());
                } else {
                    out.push(format!("Port={}", quote(&join_ports(ports))));
                }
            }
            if cookie.secure {
                out.push("Secure".to_owned());
            }
            out.push(format!("Version=\"{}\"", cookie.version));
            out.join(";")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_netscape_cookie() {
        let cookies = parse_cookie(&["foo=bar; baz = qux ;empty="]).unwrap();
        assert_eq!(cookies, vec![Cookie::new("foo", "bar"), Cookie::new("baz", "qux"), Cookie::new("empty", "")]);
        assert_eq!(generate_cookie(&cookies).unwrap(), vec!["foo=bar;baz=qux;empty=".to_owned()]);
    }

    #[test]
    fn test_rfc2965_cookie() {
        let header = r#"$Version="1"; Customer="WILE_E_COYOTE"; $Path="/acme"; Part="Rocket"; $Port="80,8080""#;
        let cookies = parse_cookie(&[header]).unwrap();

        let mut customer = Cookie::new("customer", "WILE_E_COYOTE");
        customer.version = 1;
        customer.path = Some("/acme".into());
        let mut part = Cookie::new("part", "Rocket");
        part.version = 1;
        part.ports = Some(vec![80, 8080]);
        assert_eq!(cookies, vec![customer, part]);

        let generated = generate_cookie(&cookies).unwrap();
        assert_eq!(
            generated,
            vec![r#"$Version="1";customer="WILE_E_COYOTE";$Path="/acme";part="Rocket";$Port="80,8080""#.to_owned()]
        );
        assert_eq!(parse_cookie(&[generated[0].as_str()]).unwrap(), cookies);
    }

    #[test]
    fn test_attribute_before_cookie_is_invalid() {
        assert_eq!(parse_cookie(&["$Version=1; $Path=/"]), None);
    }

    #[test]
    fn test_set_cookie() {
        let cookies = parse_set_cookie(&[
            "sid=abc; expires=Sun, 06 Nov 1994 08:49:37 GMT; path=/; domain=.example.com; secure",
            "broken",
            "other=1",
        ])
        .unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].expires, Some(784_111_777));
        assert_eq!(cookies[0].path.as_deref(), Some("/"));
        assert!(cookies[0].secure);
        assert_eq!(
            generate_set_cookie(&cookies[..1]),
            vec!["sid=abc; expires=Sun, 06 Nov 1994 08:49:37 GMT; path=/; domain=.example.com; secure".to_owned()]
        );
    }

    #[test]
    fn test_set_cookie_invalid_expiry_skips_cookie() {
        let cookies = parse_set_cookie(&["a=b; expires=never", "c=d"]).unwrap();
        assert_eq!(cookies, vec![Cookie::new("c", "d")]);
    }

    #[test]
    fn test_without_cookies() {
        assert_eq!(parse_cookie(&[""]), None);
        assert_eq!(parse_cookie(&["no pairs; here"]), None);
        assert_eq!(parse_cookie(&["$Version=1"]), None);
        assert_eq!(parse_set_cookie(&["broken", "=x"]), None);
        assert_eq!(parse_set_cookie2(&[""]), None);
        assert_eq!(generate_cookie(&[]), None);
    }

    #[test]
    fn test_netscape_cookie_skips_attributes() {
        assert_eq!(parse_cookie(&["a=1; $Path=/"]).unwrap(), vec![Cookie::new("a", "1")]);
    }

    #[test]
    fn test_set_cookie_keeps_netscape_attributes_only() {
        let cookies = parse_set_cookie(&["a=b; version=1; comment=hi; path=\" /x\""]).unwrap();
        let mut expected = Cookie::new("a", "b");
        expected.path = Some("/x".into());
        assert_eq!(cookies, vec![expected]);
    }

    #[test]
    fn test_mixed_versions_are_kept() {
        let cookies = parse_cookie(&["$Version=1; a=x; $Version=2; b=y"]).unwrap();
        assert_eq!(cookies.iter().map(|c| c.version).collect::<Vec<_>>(), vec![1, 2]);
        let generated = generate_cookie(&cookies).unwrap();
        assert_eq!(generated, vec![r#"$Version="1";a="x";$Version="2";b="y""#.to_owned()]);
        assert_eq!(parse_cookie(&[generated[0].as_str()]).unwrap(), cookies);
    }

    #[test]
    fn test_set_cookie2() {
        let cookies = parse_set_cookie2(&[r#"Part="Rocket"; Version="1"; Path="/acme"; Discard, x="y""#]).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "part");
        assert_eq!(cookies[0].value, "Rocket");
        assert_eq!(cookies[0].version, 1);
        assert!(cookies[0].discard);

        let generated = generate_set_cookie2(&cookies[..1]);
        assert_eq!(generated, vec![r#"part="Rocket";Discard;Path="/acme";Version="1""#.to_owned()]);
    }
}
