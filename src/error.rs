//! Unified error type.

/// The error type returned by the crate's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. Request logging
/// never produces an `Error` either: a capture that fails degrades the log
/// line, never the response. This type surfaces infrastructure and setup
/// failures only.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Binding to a port or accepting a connection failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// `Server::try_bind` was given something that is not `host:port`.
    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),

    /// A log level name outside `debug|info|warn|error|panic|fatal`.
    #[error("unknown log level `{0}`")]
    InvalidLogLevel(String),
}
