//! Campaign settings stored as JSON in the user's config directory.

use std::path::{Path, PathBuf};

use mailshot_airmore::AirmoreSettings;
use mailshot_core::credentials::DEFAULT_SECRET_ENV;
use mailshot_core::{DelayRange, IdentifierKind, Message, ValidationConfig};
use mailshot_smtp::SmtpSettings;
use serde::{Deserialize, Serialize};

/// Application name used for the config directory.
const APP_NAME: &str = "mailshot";
/// Settings file name.
const SETTINGS_FILE: &str = "campaign.json";

/// Settings errors.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Settings file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Settings file is not valid JSON or has the wrong shape.
    #[error("Invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// Column reference is neither an index nor a spreadsheet letter.
    #[error("Invalid column '{0}': use a 0-based number or letters like \"A\"")]
    InvalidColumn(String),

    /// SMTP campaigns need a sender identity.
    #[error("SMTP campaigns require an \"identity\" (the sender address)")]
    MissingIdentity,

    /// Message or delay settings are inconsistent.
    #[error(transparent)]
    Campaign(#[from] mailshot_core::Error),
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Which transport carries the campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportSettings {
    /// Email over SMTP.
    Smtp(SmtpSettings),
    /// SMS through an Airmore phone.
    Airmore(AirmoreSettings),
}

impl TransportSettings {
    /// Identifier format implied by the transport.
    #[must_use]
    pub const fn identifier_kind(&self) -> IdentifierKind {
        match self {
            Self::Smtp(_) => IdentifierKind::Email,
            Self::Airmore(_) => IdentifierKind::PhoneDigits,
        }
    }

    /// Default pacing for the transport.
    #[must_use]
    pub const fn default_delay(&self) -> DelayRange {
        match self {
            Self::Smtp(_) => DelayRange::EMAIL,
            Self::Airmore(_) => DelayRange::SMS,
        }
    }
}

/// A column given either as a 0-based index or as spreadsheet letters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    /// 0-based index.
    Index(usize),
    /// Spreadsheet letters: `"A"` is column 0, `"AA"` is column 26.
    Letters(String),
}

impl ColumnRef {
    /// Resolves to a 0-based index.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidColumn` for anything but ASCII letters.
    pub fn index(&self) -> Result<usize> {
        match self {
            Self::Index(index) => Ok(*index),
            Self::Letters(letters) => {
                let trimmed = letters.trim();
                if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Err(SettingsError::InvalidColumn(letters.clone()));
                }
                let number = trimmed
                    .to_ascii_uppercase()
                    .bytes()
                    .try_fold(0usize, |acc, b| {
                        acc.checked_mul(26)?
                            .checked_add(usize::from(b - b'A') + 1)
                    })
                    .ok_or_else(|| SettingsError::InvalidColumn(letters.clone()))?;
                Ok(number - 1)
            }
        }
    }
}

/// Overrides for the recipient list layout; unset fields use the transport's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    /// Whether the first row is a header.
    pub has_header: Option<bool>,
    /// Column holding the display name.
    pub name_column: Option<ColumnRef>,
    /// Column holding the email address or phone number.
    pub identifier_column: Option<ColumnRef>,
    /// Minimum identifier length.
    pub min_identifier_length: Option<usize>,
}

/// What to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSettings {
    /// Email subject; ignored for SMS.
    #[serde(default)]
    pub subject: Option<String>,
    /// Bodies sent in order to every recipient. `{name}` is replaced with
    /// the recipient's display name.
    pub bodies: Vec<String>,
    /// File attached to every email; ignored for SMS.
    #[serde(default)]
    pub attachment: Option<PathBuf>,
}

/// Everything a campaign needs besides the recipient list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSettings {
    /// Transport and its connection settings.
    pub transport: TransportSettings,
    /// Sender identity (SMTP login and `From` address).
    #[serde(default)]
    pub identity: Option<String>,
    /// Environment variable checked for the secret before the keyring.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
    /// Message content.
    pub message: MessageSettings,
    /// Pacing bounds in seconds as `[min, max]`.
    #[serde(default)]
    pub delay: Option<DelayRange>,
    /// Recipient list layout overrides.
    #[serde(default)]
    pub input: InputSettings,
    /// Skip recipients whose identifier already appeared in the run. Off
    /// unless set here or with `--dedup`.
    #[serde(default)]
    pub skip_duplicates: bool,
}

fn default_secret_env() -> String {
    DEFAULT_SECRET_ENV.to_string()
}

impl CampaignSettings {
    /// Default settings path: `<config_dir>/mailshot/campaign.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join(SETTINGS_FILE)
    }

    /// Loads and checks settings from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// describes an unusable campaign.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let settings: Self = serde_json::from_str(&content)?;
        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<()> {
        self.message()?;
        self.validation_config()?;
        if matches!(self.transport, TransportSettings::Smtp(_)) {
            self.smtp_identity()?;
        }
        Ok(())
    }

    /// The sender identity, required for SMTP.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::MissingIdentity` if unset or blank.
    pub fn smtp_identity(&self) -> Result<&str> {
        self.identity
            .as_deref()
            .map(str::trim)
            .filter(|identity| !identity.is_empty())
            .ok_or(SettingsError::MissingIdentity)
    }

    /// Builds the message template.
    ///
    /// # Errors
    ///
    /// Returns an error if no bodies are configured.
    pub fn message(&self) -> Result<Message> {
        let mut message = Message::sequence(self.message.bodies.iter().cloned())?;
        if let Some(subject) = &self.message.subject {
            message = message.with_subject(subject.clone());
        }
        if let Some(path) = &self.message.attachment {
            message = message.with_attachment(path.clone());
        }
        Ok(message)
    }

    /// Pacing bounds, falling back to the transport's default.
    #[must_use]
    pub fn delay_range(&self) -> DelayRange {
        self.delay.unwrap_or(self.transport.default_delay())
    }

    /// Recipient list layout for the validator.
    ///
    /// # Errors
    ///
    /// Returns an error if a column reference is invalid.
    pub fn validation_config(&self) -> Result<ValidationConfig> {
        let mut config = ValidationConfig::for_kind(self.transport.identifier_kind());
        let input = &self.input;
        if let Some(has_header) = input.has_header {
            config.has_header = has_header;
        }
        if let Some(column) = &input.name_column {
            config.name_column = column.index()?;
        }
        if let Some(column) = &input.identifier_column {
            config.identifier_column = column.index()?;
        }
        if let Some(min) = input.min_identifier_length {
            config.min_identifier_length = min;
        }
        Ok(config)
    }
}
