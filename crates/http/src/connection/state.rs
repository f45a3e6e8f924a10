use std::time::Duration;

use http::Version;

use crate::config::ChannelConfig;
use crate::protocol::RequestHeader;

/// Where the read side of a connection is, as far as timeouts are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// nothing received yet on a fresh connection
    AwaitingRequestLine,
    /// a request head has started arriving
    ReadingHeaders,
    /// the body of the last request is being forwarded to its handler
    ReadingBody,
    /// a persistent connection waits for its next request
    IdleBetweenRequests,
}

impl ChannelState {
    /// The stall allowed in this state before the connection is dropped
    pub fn timeout(self, config: &ChannelConfig) -> Duration {
        match self {
            ChannelState::IdleBetweenRequests => config.between_requests_timeout(),
            ChannelState::AwaitingRequestLine | ChannelState::ReadingHeaders | ChannelState::ReadingBody => {
                config.input_timeout()
            }
        }
    }
}

/// What a request allows the connection to do after its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Persistence {
    /// keep reading, pipelined requests included
    KeepAlive,
    /// keep the connection, but read the next request only once this one is answered
    NoPipeline,
    /// close after the response
    Close,
}

impl Persistence {
    pub(crate) fn of(header: &RequestHeader, allow_persistent: bool) -> Self {
        if !allow_persistent {
            return Persistence::Close;
        }

        let tokens = header.connection_tokens();
        let has = |token: &str| tokens.iter().any(|t| t.eq_ignore_ascii_case(token));
        match header.version() {
            Version::HTTP_09 => Persistence::Close,
            Version::HTTP_10 if has("keep-alive") && !has("close") => Persistence::NoPipeline,
            Version::HTTP_10 => Persistence::Close,
            _ if has("close") => Persistence::Close,
            _ => Persistence::KeepAlive,
        }
    }

    pub(crate) fn is_persistent(self) -> bool {
        self != Persistence::Close
    }
}
