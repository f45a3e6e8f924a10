//! Per-server channel settings.
//!
//! A [`ChannelConfig`] is built once and shared read-only by every connection:
//!
//! ```
//! use std::time::Duration;
//! use ferrule_http::config::ChannelConfig;
//!
//! let config = ChannelConfig::builder().max_pipeline(8).between_requests_timeout(Duration::from_secs(5)).build();
//! assert_eq!(config.max_pipeline(), 8);
//! assert_eq!(config.max_headers(), 100);
//! ```

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    max_pipeline: usize,
    input_timeout: Duration,
    between_requests_timeout: Duration,
    max_headers: usize,
    max_header_line: usize,
    max_header_bytes: usize,
    allow_bare_lf: bool,
    allow_persistent: bool,
    log_transactions: bool,
    linger_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_pipeline: 4,
            input_timeout: Duration::from_secs(240),
            between_requests_timeout: Duration::from_secs(15),
            max_headers: 100,
            max_header_line: 8 * 1024,
            max_header_bytes: 64 * 1024,
            allow_bare_lf: false,
            allow_persistent: true,
            log_transactions: false,
            linger_timeout: Duration::from_secs(20),
        }
    }
}

impl ChannelConfig {
    pub fn builder() -> ChannelConfigBuilder {
        ChannelConfigBuilder { config: ChannelConfig::default() }
    }

    /// Requests read but not yet fully answered before reading pauses
    pub fn max_pipeline(&self) -> usize {
        self.max_pipeline
    }

    /// How long a partially received request may stall
    pub fn input_timeout(&self) -> Duration {
        self.input_timeout
    }

    /// How long an idle persistent connection waits for the next request
    pub fn between_requests_timeout(&self) -> Duration {
        self.between_requests_timeout
    }

    pub fn max_headers(&self) -> usize {
        self.max_headers
    }

    pub fn max_header_line(&self) -> usize {
        self.max_header_line
    }

    pub fn max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }

    pub fn allow_bare_lf(&self) -> bool {
        self.allow_bare_lf
    }

    pub fn allow_persistent(&self) -> bool {
        self.allow_persistent
    }

    pub fn log_transactions(&self) -> bool {
        self.log_transactions
    }

    /// How long incoming bytes are drained after the write half is shut down,
    /// zero disables lingering
    pub fn linger_timeout(&self) -> Duration {
        self.linger_timeout
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfigBuilder {
    config: ChannelConfig,
}

impl ChannelConfigBuilder {
    /// At least one request is always allowed in flight
    pub fn max_pipeline(mut self, max_pipeline: usize) -> Self {
        self.config.max_pipeline = max_pipeline.max(1);
        self
    }

    pub fn input_timeout(mut self, timeout: Duration) -> Self {
        self.config.input_timeout = timeout;
        self
    }

    pub fn between_requests_timeout(mut self, timeout: Duration) -> Self {
        self.config.between_requests_timeout = timeout;
        self
    }

    pub fn max_headers(mut self, max_headers: usize) -> Self {
        self.config.max_headers = max_headers;
        self
    }

    pub fn max_header_line(mut self, max_header_line: usize) -> Self {
        self.config.max_header_line = max_header_line;
        self
    }

    pub fn max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.config.max_header_bytes = max_header_bytes;
        self
    }

    pub fn allow_bare_lf(mut self, allow: bool) -> Self {
        self.config.allow_bare_lf = allow;
        self
    }

    pub fn allow_persistent(mut self, allow: bool) -> Self {
        self.config.allow_persistent = allow;
        self
    }

    pub fn log_transactions(mut self, log: bool) -> Self {
        self.config.log_transactions = log;
        self
    }

    pub fn linger_timeout(mut self, timeout: Duration) -> Self {
        self.config.linger_timeout = timeout;
        self
    }

    pub fn build(self) -> ChannelConfig {
        self.config
    }
}
