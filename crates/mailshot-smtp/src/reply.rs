//! Server replies (RFC 5321 section 4.2).
//!
//! A reply is one or more lines sharing a three-digit code. Every line but
//! the last has `-` after the code:
//!
//! ```text
//! 250-smtp.example.com
//! 250-SIZE 35882577
//! 250 AUTH LOGIN PLAIN
//! ```

use crate::error::{Error, Result};

/// Reply class from the first digit of the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 2xx: the command succeeded.
    Completed,
    /// 3xx: the server waits for more input.
    Intermediate,
    /// 4xx: failed now, may succeed later.
    Transient,
    /// 5xx: failed, repeating it will not help.
    Permanent,
}

/// Three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Greeting: ready for commands.
    pub const SERVICE_READY: Self = Self(220);
    /// Answer to QUIT.
    pub const CLOSING: Self = Self(221);
    /// Login accepted.
    pub const AUTH_SUCCESS: Self = Self(235);
    /// Command completed.
    pub const OK: Self = Self(250);
    /// Server expects the next SASL step.
    pub const AUTH_CONTINUE: Self = Self(334);
    /// Answer to DATA: send the message.
    pub const START_DATA: Self = Self(354);
    /// Server is shutting the session down.
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// Server wants a login first.
    pub const AUTH_REQUIRED: Self = Self(530);
    /// Login rejected.
    pub const AUTH_FAILED: Self = Self(535);
    /// Recipient mailbox missing or refused.
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);

    /// Wraps a numeric code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Numeric value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Class of this code; anything outside 2xx-4xx counts as permanent.
    #[must_use]
    pub const fn class(self) -> ReplyClass {
        match self.0 / 100 {
            2 => ReplyClass::Completed,
            3 => ReplyClass::Intermediate,
            4 => ReplyClass::Transient,
            _ => ReplyClass::Permanent,
        }
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A complete reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Shared code.
    pub code: ReplyCode,
    /// Text of each line with the code and separator removed.
    pub lines: Vec<String>,
}

impl Reply {
    /// Assembles a reply from raw lines as read off the wire (no CRLF).
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` for an empty reply, a missing or non-numeric
    /// code, or lines that disagree on the code.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        let first = raw
            .first()
            .map(AsRef::as_ref)
            .ok_or_else(|| Error::Protocol("Empty reply".into()))?;
        let digits = first
            .get(..3)
            .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| Error::Protocol(format!("Malformed reply line: {first}")))?;
        let code = digits
            .parse()
            .map_err(|_| Error::Protocol(format!("Malformed reply line: {first}")))?;

        let lines = raw
            .iter()
            .map(|line| {
                let line = line.as_ref();
                if line.starts_with(digits) {
                    Ok(line.get(4..).unwrap_or_default().to_string())
                } else {
                    Err(Error::Protocol(format!("Reply code changed mid-reply: {line}")))
                }
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            code: ReplyCode(code),
            lines,
        })
    }

    /// True for 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code.class() == ReplyClass::Completed
    }

    /// All lines joined with newlines.
    #[must_use]
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Passes the reply through if it carries `expected`.
    ///
    /// # Errors
    ///
    /// Returns `Error::SmtpError` with the reply's code and text otherwise.
    pub fn expect_code(self, expected: ReplyCode) -> Result<Self> {
        if self.code == expected {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Passes the reply through if it is 2xx.
    ///
    /// # Errors
    ///
    /// Returns `Error::SmtpError` with the reply's code and text otherwise.
    pub fn expect_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Converts the reply into an `Error::SmtpError`.
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::smtp_error(self.code.as_u16(), self.text())
    }
}

/// True if `line` ends a reply: a space after the code, or the bare code.
#[must_use]
pub fn is_final_line(line: &str) -> bool {
    match line.as_bytes().get(3) {
        Some(separator) => *separator == b' ',
        None => line.len() == 3,
    }
}
