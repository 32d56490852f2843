//! Error types for SMTP operations.

use std::io;

use crate::reply::{ReplyClass, ReplyCode};

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error, including TLS handshake failures.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Server returned an error reply.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server closed the connection mid-reply.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// Hostname cannot be used for TLS verification.
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// Message exceeds the server's advertised SIZE.
    #[error("Message is {size} bytes, server accepts at most {limit}")]
    MessageTooLarge {
        /// Encoded message size.
        size: usize,
        /// Advertised limit.
        limit: usize,
    },

    /// Command argument that cannot be sent on one line.
    #[error("Invalid command argument: {0}")]
    InvalidArgument(String),

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Reply code, if the server sent one.
    #[must_use]
    pub const fn code(&self) -> Option<u16> {
        match self {
            Self::SmtpError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Class of the server's reply, if there was one.
    #[must_use]
    pub const fn reply_class(&self) -> Option<ReplyClass> {
        match self {
            Self::SmtpError { code, .. } => Some(ReplyCode::new(*code).class()),
            _ => None,
        }
    }

    /// True for a 5xx reply: retrying the same command will not help.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.reply_class() == Some(ReplyClass::Permanent)
    }

    /// True for a 4xx reply.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.reply_class() == Some(ReplyClass::Transient)
    }
}
