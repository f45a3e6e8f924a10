//! Tokenizer for header field values
//!
//! Splits raw header values into words, quoted strings and separators following the
//! RFC 2616 section 2.2 grammar. Whitespace is insignificant except between two words,
//! where it is reported as a single space separator.
//!
//! # Example
//!
//! ```
//! use ferrule_headers::tokenizer::{tokenize, Token};
//!
//! let tokens = tokenize(&["text/html; q=0.5"], true).unwrap();
//! assert_eq!(tokens[0], Token::Text("text".into()));
//! assert_eq!(tokens[1], Token::Separator('/'));
//! ```

use thiserror::Error;

/// Separator characters defined by RFC 2616 section 2.2
pub const SEPARATORS: &str = " \t\"()<>@,;:\\/[]?={}";

/// One lexical element of a header value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A run of non-separator characters, ASCII lower-cased when case folding is on
    Text(String),
    /// The content of a quoted-string with the escapes resolved, never case folded
    Quoted(String),
    /// A separator character; `' '` marks whitespace found between two words
    Separator(char),
}

impl Token {
    /// Returns the string content for words and quoted strings, `None` for separators
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::Text(s) | Token::Quoted(s) => Some(s),
            Token::Separator(_) => None,
        }
    }

    pub fn is_separator(&self, c: char) -> bool {
        matches!(self, Token::Separator(s) if *s == c)
    }
}

/// A header value that breaks the lexical rules, as opposed to one that is merely
/// semantically unparsable
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("invalid control character {0:#04x} in header value")]
    ControlCharacter(u32),

    #[error("missing character after '\\'")]
    DanglingEscape,

    #[error("missing end quote")]
    UnterminatedQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Spacing {
    AfterSeparator,
    AfterWord,
    InSpaces,
}

pub fn is_separator(c: char) -> bool {
    SEPARATORS.contains(c)
}

fn is_control(c: char) -> bool {
    (c as u32) < 0x20 || c == '\x7f'
}

/// Tokenizes header values, joining multiple raw values with `,` first
///
/// With `fold_case` on, words are ASCII lower-cased; quoted strings always keep their case.
///
/// # Errors
///
/// Returns [`TokenizeError`] for control characters outside quoted strings, a trailing
/// backslash inside a quoted string, or a quoted string that never ends.
pub fn tokenize<S: AsRef<str>>(values: &[S], fold_case: bool) -> Result<Vec<Token>, TokenizeError> {
    let joined = values.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");

    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut quoted: Option<String> = None;
    let mut escaped = false;
    let mut spacing = Spacing::AfterSeparator;

    for c in joined.chars() {
        if let Some(content) = quoted.as_mut() {
            if escaped {
                content.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                let content = std::mem::take(content);
                quoted = None;
                tokens.push(Token::Quoted(content));
            } else {
                content.push(c);
            }
            continue;
        }

        if is_separator(c) {
            flush_word(&mut word, &mut tokens, fold_case);
            match c {
                '"' => {
                    quoted = Some(String::new());
                    spacing = Spacing::AfterWord;
                }
                ' ' | '\t' => {
                    if spacing == Spacing::AfterWord {
                        spacing = Spacing::InSpaces;
                    }
                }
                _ => {
                    spacing = Spacing::AfterSeparator;
                    tokens.push(Token::Separator(c));
                }
            }
        } else if is_control(c) {
            return Err(TokenizeError::ControlCharacter(c as u32));
        } else {
            if spacing == Spacing::InSpaces {
                tokens.push(Token::Separator(' '));
            }
            spacing = Spacing::AfterWord;
            word.push(c);
        }
    }

    if escaped {
        return Err(TokenizeError::DanglingEscape);
    }
    if quoted.is_some() {
        return Err(TokenizeError::UnterminatedQuote);
    }
    flush_word(&mut word, &mut tokens, fold_case);

    Ok(tokens)
}

fn flush_word(word: &mut String, tokens: &mut Vec<Token>, fold_case: bool) {
    if word.is_empty() {
        return;
    }
    let mut text = std::mem::take(word);
    if fold_case {
        text.make_ascii_lowercase();
    }
    tokens.push(Token::Text(text));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Token {
        Token::Text(s.into())
    }

    fn sep(c: char) -> Token {
        Token::Separator(c)
    }

    #[test]
    fn test_simple_list() {
        let tokens = tokenize(&["gzip, Deflate"], true).unwrap();
        assert_eq!(tokens, vec![text("gzip"), sep(','), text("deflate")]);
    }

    #[test]
    fn test_values_are_joined_with_comma() {
        let tokens = tokenize(&["a", "b"], true).unwrap();
        assert_eq!(tokens, vec![text("a"), sep(','), text("b")]);
    }

    #[test]
    fn test_quoted_keeps_case_and_escapes() {
        let tokens = tokenize(&[r#"Foo="B\"aR""#], true).unwrap();
        assert_eq!(tokens, vec![text("foo"), sep('='), Token::Quoted("B\"aR".into())]);
    }

    #[test]
    fn test_no_fold() {
        let tokens = tokenize(&["Text/HTML"], false).unwrap();
        assert_eq!(tokens, vec![text("Text"), sep('/'), text("HTML")]);
    }

    #[test]
    fn test_space_between_words_is_significant() {
        let tokens = tokenize(&["Basic   realm=x"], false).unwrap();
        assert_eq!(tokens, vec![text("Basic"), sep(' '), text("realm"), sep('='), text("x")]);

        // around separators it is not
        let tokens = tokenize(&["a ,  b"], false).unwrap();
        assert_eq!(tokens, vec![text("a"), sep(','), text("b")]);
    }

    #[test]
    fn test_control_character_is_an_error() {
        assert_eq!(tokenize(&["a\x01b"], true), Err(TokenizeError::ControlCharacter(1)));
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(tokenize(&["\"abc"], true), Err(TokenizeError::UnterminatedQuote));
        assert_eq!(tokenize(&["\"abc\\"], true), Err(TokenizeError::DanglingEscape));
    }

    #[test]
    fn test_empty() {
        assert!(tokenize::<&str>(&[], true).unwrap().is_empty());
        assert!(tokenize(&["   "], true).unwrap().is_empty());
    }
}
