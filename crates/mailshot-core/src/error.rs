//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur while preparing a campaign.
#[derive(Debug, Error)]
pub enum Error {
    /// Delay range has its bounds reversed.
    #[error("Invalid delay range: min {min}s is greater than max {max}s")]
    InvalidDelayRange {
        /// Lower bound in seconds.
        min: u64,
        /// Upper bound in seconds.
        max: u64,
    },

    /// Message has no bodies to send.
    #[error("Message must contain at least one body")]
    EmptyMessage,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential storage error.
    #[error("Credential error: {0}")]
    Credential(#[from] crate::credentials::CredentialError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure while opening the transport session.
///
/// Both variants are fatal for the run: nothing is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Endpoint unreachable, TLS failure, or the server refused the session.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The endpoint rejected the credentials or the pairing request.
    #[error("Authentication failed: {0}")]
    Authentication(String),
}

/// Failure of a single send attempt.
///
/// Transports must pick the tier explicitly; the engine never guesses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Scoped to the current recipient. The run continues.
    #[error("{0}")]
    Recoverable(String),

    /// The session itself is unusable. Remaining recipients are aborted.
    #[error("{0}")]
    Fatal(String),
}

impl SendError {
    /// Creates a recoverable error.
    pub fn recoverable(reason: impl Into<String>) -> Self {
        Self::Recoverable(reason.into())
    }

    /// Creates a fatal error.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal(reason.into())
    }

    /// Returns true if the error ends the run.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Returns the human-readable reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Recoverable(reason) | Self::Fatal(reason) => reason,
        }
    }
}
