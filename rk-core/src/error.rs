//! Global error type for the Rentkar client.
//!
//! All error categories across the workspace are unified into a single
//! `RkError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using RkError.
pub type RkResult<T> = Result<T, RkError>;

/// Unified error type covering all error categories in Rentkar.
#[derive(Error, Debug)]
pub enum RkError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Storage errors --
    /// SQLite database error.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection pool error.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// Database integrity check failed.
    #[error("database integrity check failed: {0}")]
    IntegrityCheck(String),

    // -- Network errors --
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// WebSocket transport error.
    #[error("socket error: {0}")]
    Socket(String),

    /// An operation required an open socket.
    #[error("socket not connected")]
    SocketNotConnected,

    /// Server returned an error response.
    #[error("server error (status {status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Error message from server.
        message: String,
    },

    /// The server rejected our credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No auth token is available locally, so nothing was attempted.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    // -- Push errors --
    /// The user or OS denied notification permission.
    #[error("notification permission denied")]
    PermissionDenied,

    /// The push messaging SDK failed.
    #[error("push error: {0}")]
    Push(String),

    /// Local notification could not be presented.
    #[error("notification error: {0}")]
    Notification(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RkError {
    /// Whether retrying the same operation later could succeed.
    ///
    /// Credential and permission failures are never transient: retrying
    /// without user action produces the same result.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RkError::Http(_)
                | RkError::Timeout(_)
                | RkError::Socket(_)
                | RkError::SocketNotConnected
                | RkError::ServerError { .. }
        )
    }
}

impl From<serde_json::Error> for RkError {
    fn from(e: serde_json::Error) -> Self {
        RkError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RkError {
    fn from(e: toml::de::Error) -> Self {
        RkError::Config(e.to_string())
    }
}
