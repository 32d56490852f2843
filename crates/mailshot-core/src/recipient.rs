//! Validated recipient records.

use serde::{Deserialize, Serialize};

/// What the identifier column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Email address campaign.
    #[default]
    Email,
    /// SMS campaign; identifiers are phone numbers made of digits only.
    PhoneDigits,
}

impl IdentifierKind {
    /// Get display name for the identifier kind.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::PhoneDigits => "phone number",
        }
    }

    /// Checks an already-trimmed identifier against the format rules.
    ///
    /// # Errors
    ///
    /// Returns the reason the identifier is unusable.
    pub fn check(self, identifier: &str, min_length: usize) -> Result<(), RowValidationError> {
        if identifier.is_empty() {
            return Err(RowValidationError::EmptyIdentifier);
        }

        match self {
            Self::Email if !looks_like_email(identifier) => {
                Err(RowValidationError::InvalidEmail(identifier.to_string()))
            }
            Self::PhoneDigits
                if !identifier.bytes().all(|b| b.is_ascii_digit())
                    || identifier.len() < min_length =>
            {
                Err(RowValidationError::InvalidPhone(identifier.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// An `@` with a `.` somewhere after it, and no whitespace or control
/// characters anywhere.
fn looks_like_email(identifier: &str) -> bool {
    !identifier
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
        && identifier
            .find('@')
            .is_some_and(|at| identifier[at + 1..].contains('.'))
}

/// Why a row was left out of the campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowValidationError {
    /// Row has fewer fields than the configured columns need.
    TooFewFields {
        /// Number of fields present.
        found: usize,
        /// Number of fields required.
        required: usize,
    },
    /// Identifier field is blank.
    EmptyIdentifier,
    /// Identifier does not look like an email address.
    InvalidEmail(String),
    /// Identifier is not an all-digit phone number of sufficient length.
    InvalidPhone(String),
}

impl RowValidationError {
    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::TooFewFields { .. } => "row",
            Self::EmptyIdentifier | Self::InvalidEmail(_) | Self::InvalidPhone(_) => "identifier",
        }
    }
}

impl std::fmt::Display for RowValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewFields { found, required } => {
                write!(f, "Too few columns ({found} found, {required} required)")
            }
            Self::EmptyIdentifier => write!(f, "Identifier is empty"),
            Self::InvalidEmail(value) => write!(f, "Invalid email '{}'", value.escape_debug()),
            Self::InvalidPhone(value) => {
                write!(f, "Invalid phone number '{}'", value.escape_debug())
            }
        }
    }
}

impl std::error::Error for RowValidationError {}

/// A validated campaign recipient.
///
/// Construction checks the identifier, so every `Recipient` in circulation is sendable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Recipient {
    display_name: String,
    identifier: String,
    source_row: usize,
}

impl Recipient {
    /// Creates a recipient after checking the identifier format.
    ///
    /// # Errors
    ///
    /// Returns a `RowValidationError` if the identifier fails the `kind` rules.
    pub fn new(
        display_name: impl Into<String>,
        identifier: impl Into<String>,
        source_row: usize,
        kind: IdentifierKind,
        min_identifier_length: usize,
    ) -> Result<Self, RowValidationError> {
        let identifier = identifier.into();
        kind.check(&identifier, min_identifier_length)?;
        Ok(Self {
            display_name: display_name.into(),
            identifier,
            source_row,
        })
    }

    /// Name used for `{name}` substitution and the progress trace.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Email address or phone number.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// 1-based row in the input file.
    #[must_use]
    pub const fn source_row(&self) -> usize {
        self.source_row
    }
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name, self.identifier)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(IdentifierKind::Email.check("user@example.com", 0).is_ok());
        assert!(IdentifierKind::Email.check("first.last@sub.example.org", 0).is_ok());
    }

    #[test]
    fn test_invalid_email() {
        let kind = IdentifierKind::Email;
        assert_eq!(
            kind.check("not-an-email", 0),
            Err(RowValidationError::InvalidEmail("not-an-email".into()))
        );
        assert!(kind.check("user@localhost", 0).is_err());
        assert!(kind.check("dotted.name@", 0).is_err());
        assert!(kind.check("asha @example.com", 0).is_err());
        assert!(kind.check("asha@example.com\tx", 0).is_err());
        assert!(kind.check("asha@example.com\u{0}", 0).is_err());
        assert_eq!(
            kind.check("asha@example.com>\r\nRCPT TO:<evil@attacker.io", 0),
            Err(RowValidationError::InvalidEmail(
                "asha@example.com>\r\nRCPT TO:<evil@attacker.io".into()
            ))
        );
        assert_eq!(kind.check("", 0), Err(RowValidationError::EmptyIdentifier));
    }

    #[test]
    fn test_phone_digits() {
        let kind = IdentifierKind::PhoneDigits;
        assert!(kind.check("9812345678", 7).is_ok());
        assert!(kind.check("1234567", 7).is_ok());
        assert!(kind.check("12345", 7).is_err());
        assert!(kind.check("+9812345678", 7).is_err());
        assert!(kind.check("98123 45678", 7).is_err());
    }

    #[test]
    fn test_recipient_accessors() {
        let recipient =
            Recipient::new("Sita", "9812345678", 4, IdentifierKind::PhoneDigits, 7).unwrap();
        assert_eq!(recipient.display_name(), "Sita");
        assert_eq!(recipient.identifier(), "9812345678");
        assert_eq!(recipient.source_row(), 4);
        assert_eq!(recipient.to_string(), "Sita (9812345678)");
    }

    #[test]
    fn test_recipient_rejects_bad_identifier() {
        let result = Recipient::new("Ram", "12345", 2, IdentifierKind::PhoneDigits, 7);
        assert_eq!(result, Err(RowValidationError::InvalidPhone("12345".into())));
    }

    #[test]
    fn test_error_display() {
        let err = RowValidationError::TooFewFields {
            found: 1,
            required: 3,
        };
        assert_eq!(err.to_string(), "Too few columns (1 found, 3 required)");
        assert_eq!(err.field(), "row");
        assert_eq!(RowValidationError::EmptyIdentifier.field(), "identifier");
        assert_eq!(
            RowValidationError::InvalidEmail("a@b.c\r\nX".into()).to_string(),
            "Invalid email 'a@b.c\\r\\nX'"
        );
    }
}
