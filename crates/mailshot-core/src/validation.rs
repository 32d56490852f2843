//! Row validation: raw tabular rows in, recipients and skip reasons out.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::recipient::{IdentifierKind, Recipient, RowValidationError};

/// Column layout and identifier rules for a campaign's input rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Skip the first row.
    pub has_header: bool,
    /// 0-based column holding the display name.
    pub name_column: usize,
    /// 0-based column holding the email address or phone number.
    pub identifier_column: usize,
    /// Minimum identifier length (phone numbers only).
    pub min_identifier_length: usize,
    /// Email or phone campaign.
    pub identifier_kind: IdentifierKind,
}

impl ValidationConfig {
    /// Layout of an email list: name in column A, address in column B.
    #[must_use]
    pub const fn email() -> Self {
        Self {
            has_header: true,
            name_column: 0,
            identifier_column: 1,
            min_identifier_length: 0,
            identifier_kind: IdentifierKind::Email,
        }
    }

    /// Layout of a phone list: name in column A, number in column C.
    #[must_use]
    pub const fn phone() -> Self {
        Self {
            has_header: true,
            name_column: 0,
            identifier_column: 2,
            min_identifier_length: 7,
            identifier_kind: IdentifierKind::PhoneDigits,
        }
    }

    /// Get the default layout for an identifier kind.
    #[must_use]
    pub const fn for_kind(kind: IdentifierKind) -> Self {
        match kind {
            IdentifierKind::Email => Self::email(),
            IdentifierKind::PhoneDigits => Self::phone(),
        }
    }

    /// Number of fields a row needs to be usable.
    #[must_use]
    pub fn required_fields(&self) -> usize {
        self.name_column.max(self.identifier_column) + 1
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::email()
    }
}

/// A row that did not become a recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSkip {
    /// 1-based row number in the input.
    pub row: usize,
    /// Why it was skipped.
    pub reason: RowValidationError,
}

impl std::fmt::Display for RowSkip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row {}: {}", self.row, self.reason)
    }
}

/// Output of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validated {
    /// Accepted recipients, in input order.
    pub recipients: Vec<Recipient>,
    /// Rejected rows, in input order.
    pub skips: Vec<RowSkip>,
}

impl Validated {
    /// Wraps an already-validated recipient list with no skips.
    #[must_use]
    pub const fn from_recipients(recipients: Vec<Recipient>) -> Self {
        Self {
            recipients,
            skips: Vec::new(),
        }
    }

    /// Returns true if no recipient was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

/// Validates tabular rows into recipients.
///
/// Never fails: malformed rows become [`RowSkip`] entries and processing
/// continues. Rows are numbered from 1, or from 2 when a header is skipped.
pub fn validate<I, R, S>(rows: I, config: &ValidationConfig) -> Validated
where
    I: IntoIterator<Item = R>,
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let first_row = if config.has_header { 2 } else { 1 };
    let required = config.required_fields();
    let mut validated = Validated::default();

    let rows = rows.into_iter().skip(usize::from(config.has_header));
    for (row_number, row) in (first_row..).zip(rows) {
        let fields = row.as_ref();
        match parse_row(fields, row_number, required, config) {
            Ok(recipient) => validated.recipients.push(recipient),
            Err(reason) => {
                debug!(row = row_number, %reason, "Skipping row");
                validated.skips.push(RowSkip {
                    row: row_number,
                    reason,
                });
            }
        }
    }

    validated
}

fn parse_row<S: AsRef<str>>(
    fields: &[S],
    row_number: usize,
    required: usize,
    config: &ValidationConfig,
) -> Result<Recipient, RowValidationError> {
    if fields.len() < required {
        return Err(RowValidationError::TooFewFields {
            found: fields.len(),
            required,
        });
    }

    let identifier = fields[config.identifier_column].as_ref().trim();
    let name = fields[config.name_column].as_ref().trim();
    let name = if name.is_empty() {
        format!("Recipient {}", row_number - 1)
    } else {
        name.to_string()
    };

    Recipient::new(
        name,
        identifier,
        row_number,
        config.identifier_kind,
        config.min_identifier_length,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|f| (*f).to_string()).collect())
            .collect()
    }

    #[test]
    fn test_header_rows_numbered_from_two() {
        let input = rows(&[
            &["Name", "Email"],
            &["Asha", "asha@example.com"],
            &["Bikash", "bikash@example.com"],
            &["Chandra", "chandra@example.com"],
        ]);
        let validated = validate(&input, &ValidationConfig::email());

        let numbers: Vec<usize> = validated
            .recipients
            .iter()
            .map(Recipient::source_row)
            .collect();
        assert_eq!(numbers, vec![2, 3, 4]);
        assert!(validated.skips.is_empty());
    }

    #[test]
    fn test_no_header_rows_numbered_from_one() {
        let input = rows(&[&["Asha", "asha@example.com"]]);
        let config = ValidationConfig {
            has_header: false,
            ..ValidationConfig::email()
        };
        let validated = validate(&input, &config);
        assert_eq!(validated.recipients[0].source_row(), 1);
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let input = rows(&[&["Name", "Email", "Phone"], &["Asha", "x"], &["Bina"]]);
        let validated = validate(&input, &ValidationConfig::phone());

        assert!(validated.recipients.is_empty());
        assert_eq!(validated.skips.len(), 2);
        assert_eq!(
            validated.skips[1],
            RowSkip {
                row: 3,
                reason: RowValidationError::TooFewFields {
                    found: 1,
                    required: 3
                }
            }
        );
    }

    #[test]
    fn test_format_rejection() {
        let input = rows(&[
            &["Name", "Email", "Phone"],
            &["A", "not-an-email", "12345"],
            &["B", "b@example.com", "9812345678"],
        ]);

        let emails = validate(&input, &ValidationConfig::email());
        assert_eq!(emails.recipients.len(), 1);
        assert_eq!(emails.skips[0].row, 2);

        let phones = validate(&input, &ValidationConfig::phone());
        assert_eq!(phones.recipients.len(), 1);
        assert_eq!(phones.recipients[0].identifier(), "9812345678");
        assert_eq!(
            phones.skips[0].reason,
            RowValidationError::InvalidPhone("12345".into())
        );
    }

    #[test]
    fn test_line_breaks_inside_fields_are_skipped() {
        let input = rows(&[
            &["Name", "Email"],
            &[
                "Asha\r\nBcc: evil@attacker.io",
                "asha@example.com>\r\nRCPT TO:<evil@attacker.io",
            ],
            &["Bikash", "bikash@example.com"],
        ]);
        let validated = validate(&input, &ValidationConfig::email());

        assert_eq!(validated.recipients.len(), 1);
        assert_eq!(validated.recipients[0].identifier(), "bikash@example.com");
        assert_eq!(validated.skips.len(), 1);
        assert_eq!(validated.skips[0].row, 2);
        assert!(matches!(
            validated.skips[0].reason,
            RowValidationError::InvalidEmail(_)
        ));
    }

    #[test]
    fn test_blank_name_gets_placeholder() {
        let input = rows(&[&["Name", "Email"], &["", "a@example.com"], &["  ", "b@example.com"]]);
        let validated = validate(&input, &ValidationConfig::email());
        assert_eq!(validated.recipients[0].display_name(), "Recipient 1");
        assert_eq!(validated.recipients[1].display_name(), "Recipient 2");
    }

    #[test]
    fn test_fields_are_trimmed() {
        let input = rows(&[&["Name", "Email"], &["  Asha ", " asha@example.com "]]);
        let validated = validate(&input, &ValidationConfig::email());
        assert_eq!(validated.recipients[0].display_name(), "Asha");
        assert_eq!(validated.recipients[0].identifier(), "asha@example.com");
    }

    #[test]
    fn test_empty_input() {
        let input: Vec<Vec<String>> = Vec::new();
        let validated = validate(&input, &ValidationConfig::email());
        assert!(validated.is_empty());
        assert!(validated.skips.is_empty());
    }

    fn row_strategy() -> impl Strategy<Value = Vec<String>> {
        let name = "[A-Za-z ]{0,8}";
        let identifier = prop_oneof![
            "[a-z]{1,6}@[a-z]{1,6}\\.[a-z]{2,3}",
            "[a-z@.\\-]{0,10}",
        ];
        prop::collection::vec(prop_oneof![name.boxed(), identifier.boxed()], 0..4)
    }

    proptest! {
        #[test]
        fn prop_order_preserved_and_skips_disjoint(
            input in prop::collection::vec(row_strategy(), 0..30),
            has_header in any::<bool>(),
        ) {
            let config = ValidationConfig { has_header, ..ValidationConfig::email() };
            let validated = validate(&input, &config);

            let accepted: Vec<usize> =
                validated.recipients.iter().map(Recipient::source_row).collect();
            prop_assert!(accepted.windows(2).all(|w| w[0] < w[1]));

            for skip in &validated.skips {
                prop_assert!(!accepted.contains(&skip.row));
            }

            let data_rows = input.len().saturating_sub(usize::from(has_header));
            prop_assert_eq!(accepted.len() + validated.skips.len(), data_rows);
        }
    }
}
