//! Error types for Airmore operations.

/// Result type alias for Airmore operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Airmore error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request error (device unreachable, timeout, bad response body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Device answered with a non-success status.
    #[error("{action} failed with HTTP {status}")]
    Status {
        /// Airmore action key.
        action: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// Device address is not a valid IP address.
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Returns true if the device rejected the session's authorization.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unauthorized() {
        let revoked = Error::Status {
            action: "MessageSend",
            status: 403,
        };
        assert!(revoked.is_unauthorized());
        assert_eq!(revoked.to_string(), "MessageSend failed with HTTP 403");

        let busy = Error::Status {
            action: "MessageSend",
            status: 503,
        };
        assert!(!busy.is_unauthorized());
        assert!(!Error::InvalidAddress("x".into()).is_unauthorized());
    }
}
