use crate::grammar;
use crate::registry::canonical_name;
use crate::tokenizer::Token;

/// One `Cache-Control` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDirective {
    pub name: String,
    pub value: CacheValue,
}

impl CacheDirective {
    pub fn new(name: impl Into<String>, value: CacheValue) -> Self {
        Self { name: name.into(), value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    None,
    /// `max-age`, `s-maxage`, `min-fresh` and a valued `max-stale`
    Seconds(u64),
    /// the optional field list of `private` and `no-cache`, lower-cased
    Fields(Vec<String>),
    /// any value of an extension directive
    Token(String),
}

pub(crate) fn directive(field: &[Token]) -> Option<CacheDirective> {
    let (name, value) = grammar::key_value(field)?;
    let value = match (name.as_str(), value) {
        ("max-age" | "min-fresh" | "s-maxage", None) => CacheValue::Seconds(0),
        ("max-age" | "min-fresh" | "s-maxage" | "max-stale", Some(v)) => CacheValue::Seconds(grammar::integer(&v)?),
        ("private" | "no-cache", Some(v)) => CacheValue::Fields(
            v.split(',').map(|f| f.trim().to_ascii_lowercase()).filter(|f| !f.is_empty()).collect(),
        ),
        (_, Some(v)) => CacheValue::Token(v),
        (_, None) => CacheValue::None,
    };
    Some(CacheDirective { name, value })
}

pub(crate) fn generate_directive(directive: &CacheDirective) -> String {
    match &directive.value {
        CacheValue::None => directive.name.clone(),
        CacheValue::Seconds(seconds) => format!("{}={seconds}", directive.name),
        CacheValue::Fields(fields) => {
            let fields = fields.iter().map(|f| canonical_name(f)).collect::<Vec<_>>().join(", ");
            format!("{}={}", directive.name, grammar::quote(&fields))
        }
        CacheValue::Token(value) => format!("{}={}", directive.name, grammar::quote_if_needed(value, true)),
    }
}
