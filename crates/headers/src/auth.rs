use crate::grammar::quote;
use crate::tokenizer::Token;

/// `Authorization` credentials, the scheme lower-cased and the rest kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub scheme: String,
    pub token: String,
}

/// One `WWW-Authenticate` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub scheme: String,
    pub params: ChallengeParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeParams {
    /// `realm="x", nonce="y"`
    Map(Vec<(String, String)>),
    /// a single token68 style string
    Opaque(String),
}

pub(crate) fn credentials(value: &str) -> Option<Credentials> {
    let (scheme, token) = value.split_once(' ')?;
    Some(Credentials { scheme: scheme.to_ascii_lowercase(), token: token.to_owned() })
}

pub(crate) fn generate_credentials(credentials: &Credentials) -> String {
    format!("{} {}", credentials.scheme, credentials.token)
}

/// Walks `scheme [opaque | k=v, k=v], scheme ...`
///
/// A comma followed by `word=` continues the current challenge; a comma followed by
/// anything else starts a new one.
pub(crate) fn challenges(tokens: &[Token]) -> Option<Vec<Challenge>> {
    let tokens = tokens.iter().filter(|t| !t.is_separator(' ')).collect::<Vec<_>>();
    let mut challenges = Vec::new();
    let mut index = 0;

    while index < tokens.len() {
        let scheme = tokens[index].as_str()?.to_owned();
        index += 1;

        let mut params = Vec::new();
        let mut last: Option<String> = None;
        while index < tokens.len() {
            let token = tokens[index];
            if token.is_separator('=') {
                let key = last.take()?;
                let value = tokens.get(index + 1)?.as_str()?.to_owned();
                params.push((key, value));
                index += 2;
            } else if token.is_separator(',') {
                let continues = tokens.get(index + 2).is_some_and(|t| t.is_separator('='));
                index += 1;
                if !continues {
                    break;
                }
            } else {
                last = Some(token.as_str()?.to_owned());
                index += 1;
            }
        }

        let params = match last {
            Some(opaque) if params.is_empty() => ChallengeParams::Opaque(opaque),
            Some(_) => return None,
            None => ChallengeParams::Map(params),
        };
        challenges.push(Challenge { scheme, params });
    }

    Some(challenges)
}

pub(crate) fn generate_challenge(challenge: &Challenge) -> String {
    match &challenge.params {
        ChallengeParams::Opaque(opaque) => format!("{} {opaque}", challenge.scheme),
        ChallengeParams::Map(params) => {
            let params = params.iter().map(|(k, v)| format!("{k}={}", quote(v))).collect::<Vec<_>>().join(", ");
            format!("{} {params}", challenge.scheme)
        }
    }
}
