//! SMTP commands and EHLO capability parsing.

use crate::error::{Error, Result};

/// Client command as written on the wire.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// Greeting that asks for the server's extensions.
    Ehlo {
        /// Name the client announces.
        hostname: String,
    },
    /// Request to switch the connection to TLS.
    StartTls,
    /// Starts a SASL exchange.
    Auth {
        /// SASL mechanism.
        mechanism: AuthMechanism,
        /// Response sent on the same line (RFC 4954 initial response).
        initial_response: Option<String>,
    },
    /// Bare base64 line answering a 334 challenge.
    AuthResponse(String),
    /// Opens a transaction for one sender.
    MailFrom {
        /// Envelope sender.
        from: String,
        /// Declared message size, sent only when the server advertises SIZE.
        size: Option<usize>,
    },
    /// Adds one envelope recipient.
    RcptTo {
        /// Envelope recipient.
        to: String,
    },
    /// Asks to start sending the message text.
    Data,
    /// Abandons the current transaction.
    Rset,
    /// Ends the session.
    Quit,
}

impl Command {
    /// Serializes the command to a CRLF-terminated line.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` if an argument contains CR or LF,
    /// which would end the line early and smuggle in another command.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let line = match self {
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::StartTls => "STARTTLS".to_string(),
            Self::Auth {
                mechanism,
                initial_response: Some(response),
            } => format!("AUTH {} {response}", mechanism.as_str()),
            Self::Auth {
                mechanism,
                initial_response: None,
            } => format!("AUTH {}", mechanism.as_str()),
            Self::AuthResponse(response) => response.clone(),
            Self::MailFrom {
                from,
                size: Some(size),
            } => format!("MAIL FROM:<{from}> SIZE={size}"),
            Self::MailFrom { from, size: None } => format!("MAIL FROM:<{from}>"),
            Self::RcptTo { to } => format!("RCPT TO:<{to}>"),
            Self::Data => "DATA".to_string(),
            Self::Rset => "RSET".to_string(),
            Self::Quit => "QUIT".to_string(),
        };

        if line.contains(['\r', '\n']) {
            return Err(Error::InvalidArgument(format!(
                "line break in {} argument",
                self.verb()
            )));
        }

        let mut buf = line.into_bytes();
        buf.extend_from_slice(b"\r\n");
        Ok(buf)
    }

    /// Command keyword, safe to log.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Ehlo { .. } => "EHLO",
            Self::StartTls => "STARTTLS",
            Self::Auth { .. } | Self::AuthResponse(_) => "AUTH",
            Self::MailFrom { .. } => "MAIL FROM",
            Self::RcptTo { .. } => "RCPT TO",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Quit => "QUIT",
        }
    }
}

// AUTH payloads carry credentials, so Debug shows the verb only.
impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Command").field(&self.verb()).finish()
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - plaintext authentication
    Plain,
    /// LOGIN - legacy plaintext
    Login,
}

impl AuthMechanism {
    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            _ => None,
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
        }
    }
}

/// Server capabilities from the greeting and EHLO response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// STARTTLS advertised.
    pub starttls: bool,
    /// Supported AUTH mechanisms this client can use.
    pub auth: Vec<AuthMechanism>,
    /// Maximum message size, if advertised with a value.
    pub max_size: Option<usize>,
}

impl ServerInfo {
    /// Replaces the capabilities with those in EHLO response lines.
    ///
    /// The first line is the server's greeting and is skipped.
    pub fn apply_ehlo(&mut self, lines: &[String]) {
        self.starttls = false;
        self.auth.clear();
        self.max_size = None;

        for line in lines.iter().skip(1) {
            let mut parts = line.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };
            match keyword.to_uppercase().as_str() {
                "STARTTLS" => self.starttls = true,
                "AUTH" => {
                    for mechanism in parts.filter_map(AuthMechanism::parse) {
                        if !self.auth.contains(&mechanism) {
                            self.auth.push(mechanism);
                        }
                    }
                }
                "SIZE" => {
                    self.max_size = parts
                        .next()
                        .and_then(|s| s.parse().ok())
                        .filter(|&size| size > 0);
                }
                _ => {}
            }
        }
    }

    /// Picks PLAIN when offered, otherwise LOGIN.
    #[must_use]
    pub fn preferred_auth(&self) -> Option<AuthMechanism> {
        [AuthMechanism::Plain, AuthMechanism::Login]
            .into_iter()
            .find(|m| self.auth.contains(m))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize() {
        assert_eq!(
            Command::Ehlo {
                hostname: "client.local".into()
            }
            .serialize()
            .unwrap(),
            b"EHLO client.local\r\n"
        );
        assert_eq!(
            Command::MailFrom {
                from: "a@example.com".into(),
                size: Some(512)
            }
            .serialize()
            .unwrap(),
            b"MAIL FROM:<a@example.com> SIZE=512\r\n"
        );
        assert_eq!(
            Command::RcptTo {
                to: "b@example.com".into()
            }
            .serialize()
            .unwrap(),
            b"RCPT TO:<b@example.com>\r\n"
        );
        assert_eq!(
            Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some("AGEAYg==".into())
            }
            .serialize()
            .unwrap(),
            b"AUTH PLAIN AGEAYg==\r\n"
        );
        assert_eq!(Command::Quit.serialize().unwrap(), b"QUIT\r\n");
    }

    #[test]
    fn test_serialize_refuses_line_breaks() {
        let smuggled = Command::RcptTo {
            to: "asha@example.com>\r\nRCPT TO:<evil@attacker.io".into(),
        };
        let err = smuggled.serialize().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.to_string().contains("RCPT TO"));

        let bare_lf = Command::Ehlo {
            hostname: "client\nDATA".into(),
        };
        assert!(bare_lf.serialize().is_err());

        let secret = Command::AuthResponse("c2Vj\r\ncmV0".into());
        assert!(!secret.serialize().unwrap_err().to_string().contains("c2Vj"));
    }

    #[test]
    fn test_debug_hides_auth_payload() {
        let command = Command::AuthResponse("c2VjcmV0".into());
        let printed = format!("{command:?}");
        assert!(!printed.contains("c2VjcmV0"));
        assert!(printed.contains("AUTH"));
    }

    #[test]
    fn test_apply_ehlo() {
        let lines: Vec<String> = [
            "smtp.example.com Hello",
            "SIZE 35882577",
            "8BITMIME",
            "AUTH LOGIN PLAIN XOAUTH2",
            "STARTTLS",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        let mut info = ServerInfo::default();
        info.apply_ehlo(&lines);

        assert!(info.starttls);
        assert_eq!(info.max_size, Some(35_882_577));
        assert_eq!(info.auth, vec![AuthMechanism::Login, AuthMechanism::Plain]);
        assert_eq!(info.preferred_auth(), Some(AuthMechanism::Plain));
    }

    #[test]
    fn test_apply_ehlo_resets_previous() {
        let mut info = ServerInfo {
            starttls: true,
            ..ServerInfo::default()
        };
        info.apply_ehlo(&["host".to_string(), "SIZE".to_string()]);
        assert!(!info.starttls);
        assert_eq!(info.max_size, None);
        assert_eq!(info.preferred_auth(), None);
    }
}
