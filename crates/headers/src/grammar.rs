//! Building blocks shared by the individual header grammars

use crate::tokenizer::{Token, is_separator};

/// An ordered parameter list, `;key=value` pairs where the value may be missing
pub type Params = Vec<(String, Option<String>)>;

pub(crate) fn split(tokens: &[Token], sep: char) -> impl Iterator<Item = &[Token]> {
    tokens.split(move |t| t.is_separator(sep))
}

/// Parses a comma separated list, skipping empty elements
pub(crate) fn list<'a, T>(tokens: &'a [Token], f: impl Fn(&'a [Token]) -> Option<T>) -> Option<Vec<T>> {
    split(tokens, ',').filter(|field| !field.is_empty()).map(f).collect()
}

pub(crate) fn single(tokens: &[Token]) -> Option<&str> {
    match tokens {
        [token] => token.as_str(),
        _ => None,
    }
}

/// `key` or `key=value`
pub(crate) fn key_value(field: &[Token]) -> Option<(String, Option<String>)> {
    match field {
        [key] => Some((key.as_str()?.to_owned(), None)),
        [key, eq, value] if eq.is_separator('=') => Some((key.as_str()?.to_owned(), Some(value.as_str()?.to_owned()))),
        _ => None,
    }
}

/// Splits `head;k=v;k2` into the head tokens and its parameters
pub(crate) fn args(field: &[Token]) -> Option<(&[Token], Params)> {
    let mut parts = split(field, ';');
    let head = parts.next()?;
    let params = parts.map(key_value).collect::<Option<Params>>()?;
    Some((head, params))
}

/// `type/subtype` out of a token run
pub(crate) fn media_range(tokens: &[Token]) -> Option<(String, String)> {
    match tokens {
        [t, slash, s] if slash.is_separator('/') => Some((t.as_str()?.to_owned(), s.as_str()?.to_owned())),
        _ => None,
    }
}

/// The words and quoted strings of a token run, separators dropped
pub(crate) fn words(tokens: &[Token]) -> Vec<String> {
    tokens.iter().filter_map(Token::as_str).map(str::to_owned).collect()
}

pub(crate) fn last<'a>(values: &[&'a str]) -> Option<&'a str> {
    values.last().copied()
}

pub(crate) fn integer(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

/// Wraps a string in double quotes, escaping `\` and `"`
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '\\' || c == '"' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Whether a value must be quoted to survive tokenizing unchanged
pub(crate) fn needs_quoting(value: &str, fold_case: bool) -> bool {
    value.is_empty() || value.chars().any(is_separator) || (fold_case && value.chars().any(|c| c.is_ascii_uppercase()))
}

pub(crate) fn quote_if_needed(value: &str, fold_case: bool) -> String {
    if needs_quoting(value, fold_case) { quote(value) } else { value.to_owned() }
}

pub(crate) fn generate_key_values(params: &[(String, Option<String>)], fold_case: bool) -> String {
    params
        .iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{key}={}", quote_if_needed(value, fold_case)),
            None => key.clone(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

pub(crate) fn generate_list<I: IntoIterator<Item = String>>(items: I) -> String {
    items.into_iter().collect::<Vec<_>>().join(", ")
}

/// Capitalizes every dash separated part: `content-type` becomes `Content-Type`
pub fn dash_capitalize(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Formats a quality value, `None` when it is the implied 1.0
#[allow(clippy::float_cmp, reason = "1.0 is the exact default value")]
pub(crate) fn format_quality(q: f32) -> Option<String> {
    if q == 1.0 { None } else { Some(format!("{q}")) }
}

pub(crate) fn parse_quality(value: Option<&str>) -> Option<f32> {
    let q: f32 = value?.trim().parse().ok()?;
    (0.0..=1.0).contains(&q).then_some(q)
}
