//! Error types for template relay operations.

use thiserror::Error;

/// Main error type for relay operations outside the request path.
///
/// Request-level failures are [`crate::protocol::RequestError`] and travel back
/// to the client as `{"ok": false}` responses instead.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Invalid value for a named config field
    #[error("invalid config for '{0}': {1}")]
    InvalidConfig(String, String),

    /// Template source exists but could not be read
    #[error("cannot read template source '{0}': {1}")]
    TemplateSource(String, String),

    /// Listener could not be bound
    #[error("failed to bind {0}: {1}")]
    Bind(String, String),

    /// Connect, read or write against a remote server failed
    #[error("transport error for {0}: {1}")]
    Transport(String, String),

    /// A wire message could not be encoded or decoded
    #[error("protocol error: {0}")]
    Protocol(String),

    /// CLI `KEY=VALUE` token without a `=`
    #[error("Bad field '{0}'. Use KEY=VALUE.")]
    InvalidField(String),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
