//! Campaign credentials.
//!
//! The secret (SMTP app password, device token) is never part of the settings
//! file. It comes from an environment variable or the platform's native
//! credential storage:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mailshot";

/// Environment variable consulted when settings do not name one.
pub const DEFAULT_SECRET_ENV: &str = "MAILSHOT_SECRET";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Neither the environment nor the keyring had a secret.
    #[error("No secret for '{identity}': set {env_var} or store one in the keyring")]
    Missing {
        /// Sender identity the secret belongs to.
        identity: String,
        /// Environment variable that was checked.
        env_var: String,
    },
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Sender identity plus its secret.
#[derive(Debug, Clone)]
pub struct Credentials {
    identity: String,
    secret: SecretString,
}

impl Credentials {
    /// Creates credentials from an identity and secret.
    pub fn new(identity: impl Into<String>, secret: impl Into<SecretString>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    /// Resolves the secret for `identity`: environment first, then keyring.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Missing` if neither source has a secret, or a
    /// keyring error if the keyring cannot be queried.
    pub fn resolve(identity: &str, env_var: &str) -> CredentialResult<Self> {
        if let Some(credentials) = Self::from_env_value(identity, std::env::var(env_var).ok()) {
            debug!(identity, env_var, "Using secret from environment");
            return Ok(credentials);
        }

        match load_secret(identity)? {
            Some(secret) => {
                debug!(identity, "Using secret from keyring");
                Ok(Self {
                    identity: identity.to_string(),
                    secret,
                })
            }
            None => Err(CredentialError::Missing {
                identity: identity.to_string(),
                env_var: env_var.to_string(),
            }),
        }
    }

    fn from_env_value(identity: &str, value: Option<String>) -> Option<Self> {
        value
            .filter(|secret| !secret.is_empty())
            .map(|secret| Self::new(identity, secret))
    }

    /// Login name / sender address.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The secret, wrapped so it cannot be printed by accident.
    #[must_use]
    pub const fn secret(&self) -> &SecretString {
        &self.secret
    }
}

/// Stores a secret for `identity` in the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn store_secret(identity: &str, secret: &SecretString) -> CredentialResult<()> {
    let entry = Entry::new(SERVICE_NAME, identity)?;
    entry.set_password(secret.expose_secret())?;
    debug!(identity, "Stored secret in keyring");
    Ok(())
}

/// Retrieves the secret for `identity` from the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn load_secret(identity: &str) -> CredentialResult<Option<SecretString>> {
    let entry = Entry::new(SERVICE_NAME, identity)?;
    match entry.get_password() {
        Ok(secret) => Ok(Some(SecretString::from(secret))),
        Err(keyring::Error::NoEntry) => {
            debug!(identity, "No secret found in keyring");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Deletes the secret for `identity`. Missing entries are not an error.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn delete_secret(identity: &str) -> CredentialResult<()> {
    let entry = Entry::new(SERVICE_NAME, identity)?;
    match entry.delete_credential() {
        Ok(()) => {
            debug!(identity, "Deleted secret from keyring");
            Ok(())
        }
        Err(keyring::Error::NoEntry) => {
            debug!(identity, "No secret to delete");
            Ok(())
        }
        Err(e) => {
            warn!("Failed to delete secret: {e}");
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    // Keyring-backed tests touch the real system keyring and are ignored by
    // default. Run manually with `cargo test -- --ignored`.

    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials::new("sender@example.com", "hunter2-app-password");
        let printed = format!("{credentials:?}");
        assert!(printed.contains("sender@example.com"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_environment_value() {
        let credentials =
            Credentials::from_env_value("sender@example.com", Some("from-env".into())).unwrap();
        assert_eq!(credentials.secret().expose_secret(), "from-env");
        assert_eq!(credentials.identity(), "sender@example.com");

        assert!(Credentials::from_env_value("sender@example.com", Some(String::new())).is_none());
        assert!(Credentials::from_env_value("sender@example.com", None).is_none());
    }

    #[test]
    #[ignore = "Interacts with system keyring"]
    fn test_store_load_delete() {
        let identity = "mailshot-test@example.com";
        store_secret(identity, &SecretString::from("keyring-secret")).unwrap();
        let loaded = load_secret(identity).unwrap().unwrap();
        assert_eq!(loaded.expose_secret(), "keyring-secret");
        delete_secret(identity).unwrap();
        assert!(load_secret(identity).unwrap().is_none());
    }
}
