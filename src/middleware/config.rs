//! Request-logging configuration.
//!
//! [`LogConfig`] is a plain value: build it once (from code or from a config
//! file via serde), hand it to [`HttpLogger`](super::HttpLogger), and derive
//! per-route variants with [`HttpLogger::clone_with`](super::HttpLogger::clone_with).
//! Nothing mutates a config after a logger owns it.
//!
//! ```toml
//! [log]
//! requestHeader  = true
//! requestBody    = true
//! responseHeader = false
//! responseBody   = true
//! level          = "debug"
//! maxBodyCapture = 65536
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::Error;

/// Default cap on how much of a request body is copied for logging.
pub const DEFAULT_MAX_BODY_CAPTURE: usize = 64 * 1024;

// ── LogLevel ──────────────────────────────────────────────────────────────────

/// Severity at which request/response lines are emitted.
///
/// `Panic` and `Fatal` are accepted for compatibility with existing
/// configuration files. Both log at `ERROR`; a log line never aborts a request.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq)]
#[serde(from = "String")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Panic,
    Fatal,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info  => "info",
            Self::Warn  => "warn",
            Self::Error => "error",
            Self::Panic => "panic",
            Self::Fatal => "fatal",
        }
    }

    /// Like [`str::parse`], but unknown names fall back to `Info`.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info"  => Ok(Self::Info),
            "warn"  => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "panic" => Ok(Self::Panic),
            "fatal" => Ok(Self::Fatal),
            _ => Err(Error::InvalidLogLevel(s.to_owned())),
        }
    }
}

impl From<String> for LogLevel {
    fn from(s: String) -> Self {
        Self::parse_or_default(&s)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── LogConfig ─────────────────────────────────────────────────────────────────

/// What [`HttpLogger`](super::HttpLogger) captures, and at which level it logs.
///
/// Everything is off by default except the request/response summary lines,
/// which are always emitted at `level`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    pub request_header: bool,
    pub request_body: bool,
    pub response_header: bool,
    pub response_body: bool,
    pub level: LogLevel,
    /// Body bytes copied into each log line, for requests and responses
    /// alike. Longer bodies still reach the handler and the client in full.
    pub max_body_capture: usize,
}

impl LogConfig {
    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder(Self::default())
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            request_header: false,
            request_body: false,
            response_header: false,
            response_body: false,
            level: LogLevel::Info,
            max_body_capture: DEFAULT_MAX_BODY_CAPTURE,
        }
    }
}

/// Typed overrides on top of an existing [`LogConfig`].
#[derive(Clone, Debug)]
pub struct LogConfigBuilder(LogConfig);

impl LogConfigBuilder {
    pub fn request_header(mut self, on: bool) -> Self {
        self.0.request_header = on;
        self
    }

    pub fn request_body(mut self, on: bool) -> Self {
        self.0.request_body = on;
        self
    }

    pub fn response_header(mut self, on: bool) -> Self {
        self.0.response_header = on;
        self
    }

    pub fn response_body(mut self, on: bool) -> Self {
        self.0.response_body = on;
        self
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.0.level = level;
        self
    }

    pub fn max_body_capture(mut self, bytes: usize) -> Self {
        self.0.max_body_capture = bytes;
        self
    }

    pub fn build(self) -> LogConfig {
        self.0
    }
}

impl From<LogConfig> for LogConfigBuilder {
    fn from(config: LogConfig) -> Self {
        Self(config)
    }
}
