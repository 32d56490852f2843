//! [`Transport`] implementation over one authenticated SMTP session.

use std::path::{Path, PathBuf};

use mailshot_core::{ConnectError, Credentials, Recipient, RenderedMessage, SendError, Transport};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::compose::{Attachment, Email, Mailbox, Stamp};
use crate::error::{Error, Result};
use crate::reply::ReplyCode;
use crate::session::Session;
use crate::stream::SmtpStream;

/// Security/encryption mode for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// STARTTLS upgrade after plaintext connect.
    StartTls,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }

    /// Get default port for the security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::Tls => 465,
            Self::StartTls => 587,
        }
    }
}

/// SMTP server settings. The login and password come from [`Credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    /// Server hostname.
    pub host: String,
    /// Server port; defaults by security mode.
    #[serde(default)]
    pub port: Option<u16>,
    /// Security mode.
    #[serde(default)]
    pub security: Security,
    /// Name sent with EHLO.
    #[serde(default = "default_helo_name")]
    pub helo_name: String,
    /// Display name on the `From` header.
    #[serde(default)]
    pub from_name: Option<String>,
}

fn default_helo_name() -> String {
    "localhost".to_string()
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: None,
            security: Security::Tls,
            helo_name: default_helo_name(),
            from_name: None,
        }
    }
}

impl SmtpSettings {
    /// Port to connect to.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.security.default_port())
    }
}

/// Sends each rendered message as its own SMTP transaction.
#[derive(Debug)]
pub struct SmtpTransport {
    settings: SmtpSettings,
    session: Option<Session<SmtpStream>>,
    sender: String,
    attachment: Option<(PathBuf, Attachment)>,
}

impl SmtpTransport {
    /// Creates a disconnected transport.
    #[must_use]
    pub const fn new(settings: SmtpSettings) -> Self {
        Self {
            settings,
            session: None,
            sender: String::new(),
            attachment: None,
        }
    }

    /// The server settings.
    #[must_use]
    pub const fn settings(&self) -> &SmtpSettings {
        &self.settings
    }

    /// Returns true between a successful `connect` and `close`.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Opens the stream and negotiates up to the point of authentication.
    async fn open_session(&self) -> Result<Session<SmtpStream>> {
        let host = self.settings.host.as_str();
        let port = self.settings.port();

        let implicit_tls = self.settings.security == Security::Tls;
        let stream = SmtpStream::open(host, port, implicit_tls).await?;

        let mut session = Session::open(stream).await?;
        session.ehlo(&self.settings.helo_name).await?;

        if self.settings.security == Security::StartTls {
            session = session.starttls(host).await?;
            session.ehlo(&self.settings.helo_name).await?;
        }

        Ok(session)
    }

    /// Loads the attachment once per path and keeps it for later sends.
    async fn cache_attachment(&mut self, path: &Path) -> std::result::Result<(), SendError> {
        if self
            .attachment
            .as_ref()
            .is_some_and(|(cached, _)| cached == path)
        {
            return Ok(());
        }

        let attachment = Attachment::load(path).await.map_err(|e| {
            SendError::recoverable(format!("Cannot read attachment {}: {e}", path.display()))
        })?;
        debug!(file = %path.display(), bytes = attachment.content.len(), "Attachment loaded");
        self.attachment = Some((path.to_path_buf(), attachment));
        Ok(())
    }
}

impl Transport for SmtpTransport {
    async fn connect(&mut self, credentials: &Credentials) -> std::result::Result<(), ConnectError> {
        info!(
            host = %self.settings.host,
            port = self.settings.port(),
            security = self.settings.security.display_name(),
            "Connecting to SMTP server"
        );

        let mut session = self
            .open_session()
            .await
            .map_err(|e| ConnectError::Connection(e.to_string()))?;

        if let Err(error) = session
            .authenticate(credentials.identity(), credentials.secret())
            .await
        {
            if let Err(quit) = session.quit().await {
                debug!(error = %quit, "QUIT after failed login");
            }
            return Err(classify_login(error));
        }

        info!(user = credentials.identity(), "Logged in");
        self.sender = credentials.identity().to_string();
        self.session = Some(session);
        Ok(())
    }

    async fn send_one(
        &mut self,
        recipient: &Recipient,
        message: &RenderedMessage,
    ) -> std::result::Result<(), SendError> {
        if self.session.is_none() {
            return Err(SendError::fatal("SMTP session is not connected"));
        }
        if let Some(path) = message.attachment.as_deref() {
            self.cache_attachment(path).await?;
        }

        let attachment = message
            .attachment
            .as_ref()
            .and(self.attachment.as_ref().map(|(_, a)| a));
        let email = Email {
            from: Mailbox {
                name: self.settings.from_name.as_deref(),
                address: &self.sender,
            },
            to: Mailbox {
                name: Some(recipient.display_name()),
                address: recipient.identifier(),
            },
            subject: message.subject.as_deref(),
            body: &message.body,
            attachment,
        };
        let text = email.to_rfc5322(&Stamp::now());

        let Some(session) = self.session.as_mut() else {
            return Err(SendError::fatal("SMTP session is not connected"));
        };
        deliver(session, &self.sender, recipient.identifier(), text.as_bytes()).await
    }

    async fn close(&mut self) {
        self.attachment = None;
        if let Some(session) = self.session.take() {
            match session.quit().await {
                Ok(()) => debug!("SMTP session closed"),
                Err(error) => warn!(%error, "QUIT failed"),
            }
        }
    }
}

/// Runs one transaction and tiers its failure.
///
/// Recoverable failures are followed by RSET so the next transaction starts
/// clean; a failing RSET makes the failure fatal.
pub(crate) async fn deliver<S>(
    session: &mut Session<S>,
    from: &str,
    to: &str,
    message: &[u8],
) -> std::result::Result<(), SendError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Err(error) = session.send_mail(from, to, message).await else {
        return Ok(());
    };

    let classified = classify_send(&error);
    if classified.is_fatal() {
        return Err(classified);
    }

    if let Err(reset) = session.rset().await {
        return Err(SendError::fatal(format!(
            "{error}; session unusable after RSET failed: {reset}"
        )));
    }
    Err(classified)
}

/// Maps a send-phase error to its tier.
pub(crate) fn classify_send(error: &Error) -> SendError {
    match error {
        Error::SmtpError { code, .. }
            if [
                ReplyCode::SERVICE_UNAVAILABLE,
                ReplyCode::AUTH_REQUIRED,
                ReplyCode::AUTH_FAILED,
            ]
            .contains(&ReplyCode::new(*code)) =>
        {
            SendError::fatal(error.to_string())
        }
        Error::SmtpError { .. } | Error::MessageTooLarge { .. } | Error::InvalidArgument(_) => {
            SendError::recoverable(error.to_string())
        }
        Error::Io(_)
        | Error::Protocol(_)
        | Error::ConnectionClosed
        | Error::InvalidHostname(_)
        | Error::NotSupported(_) => SendError::fatal(error.to_string()),
    }
}

/// Maps a login error: server refusals are authentication failures, broken
/// transport is a connection failure.
fn classify_login(error: Error) -> ConnectError {
    match error {
        Error::SmtpError { .. } | Error::NotSupported(_) => {
            ConnectError::Authentication(error.to_string())
        }
        _ => ConnectError::Connection(error.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::Tls.default_port(), 465);
        assert_eq!(Security::StartTls.default_port(), 587);

        let mut settings = SmtpSettings::default();
        assert_eq!(settings.port(), 465);
        settings.port = Some(2525);
        assert_eq!(settings.port(), 2525);
    }

    #[test]
    fn test_settings_deserialize_defaults() {
        let settings: SmtpSettings =
            serde_json::from_str(r#"{"host": "mail.example.org", "security": "StartTls"}"#)
                .unwrap();
        assert_eq!(settings.port(), 587);
        assert_eq!(settings.helo_name, "localhost");
        assert!(settings.from_name.is_none());
    }

    #[test]
    fn test_classify_send() {
        assert!(classify_send(&Error::smtp_error(421, "closing")).is_fatal());
        assert!(classify_send(&Error::smtp_error(530, "auth required")).is_fatal());
        assert!(classify_send(&Error::smtp_error(535, "bad credentials")).is_fatal());
        assert!(classify_send(&Error::ConnectionClosed).is_fatal());

        assert!(!classify_send(&Error::smtp_error(550, "no such user")).is_fatal());
        assert!(!classify_send(&Error::smtp_error(452, "mailbox full")).is_fatal());
        assert!(!classify_send(&Error::MessageTooLarge { size: 9, limit: 1 }).is_fatal());
        assert!(!classify_send(&Error::InvalidArgument("line break".into())).is_fatal());
    }

    #[test]
    fn test_classify_login() {
        assert!(matches!(
            classify_login(Error::smtp_error(535, "nope")),
            ConnectError::Authentication(_)
        ));
        assert!(matches!(
            classify_login(Error::ConnectionClosed),
            ConnectError::Connection(_)
        ));
    }

    #[tokio::test]
    async fn test_recoverable_rejection_resets() {
        let mock = Builder::new()
            .read(b"220 mx\r\n")
            .write(b"MAIL FROM:<desk@example.org>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<ghost@example.com>\r\n")
            .read(b"550 No such user\r\n")
            .write(b"RSET\r\n")
            .read(b"250 OK\r\n")
            .build();
        let mut session = Session::open(mock).await.unwrap();

        let err = deliver(&mut session, "desk@example.org", "ghost@example.com", b"Hi")
            .await
            .unwrap_err();
        assert_eq!(err, SendError::recoverable("SMTP error 550: No such user"));
    }

    #[tokio::test]
    async fn test_service_unavailable_is_fatal_without_reset() {
        let mock = Builder::new()
            .read(b"220 mx\r\n")
            .write(b"MAIL FROM:<desk@example.org>\r\n")
            .read(b"421 Too many messages, closing\r\n")
            .build();
        let mut session = Session::open(mock).await.unwrap();

        let err = deliver(&mut session, "desk@example.org", "asha@example.com", b"Hi")
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_failed_reset_is_fatal() {
        let mock = Builder::new()
            .read(b"220 mx\r\n")
            .write(b"MAIL FROM:<desk@example.org>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<ghost@example.com>\r\n")
            .read(b"550 No such user\r\n")
            .write(b"RSET\r\n")
            .build();
        let mut session = Session::open(mock).await.unwrap();

        let err = deliver(&mut session, "desk@example.org", "ghost@example.com", b"Hi")
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.reason().contains("RSET"));
    }

    #[tokio::test]
    async fn test_line_break_in_recipient_never_reaches_server() {
        let mock = Builder::new()
            .read(b"220 mx\r\n")
            .write(b"MAIL FROM:<desk@example.org>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RSET\r\n")
            .read(b"250 OK\r\n")
            .build();
        let mut session = Session::open(mock).await.unwrap();

        let err = deliver(
            &mut session,
            "desk@example.org",
            "asha@example.com>\r\nRCPT TO:<evil@attacker.io",
            b"Hi",
        )
        .await
        .unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.reason().contains("line break"));
    }

    #[tokio::test]
    async fn test_send_without_connect_is_fatal() {
        let mut transport = SmtpTransport::new(SmtpSettings::default());
        let recipient = Recipient::new(
            "Asha",
            "asha@example.com",
            2,
            mailshot_core::IdentifierKind::Email,
            0,
        )
        .unwrap();
        let rendered = mailshot_core::Message::new("Hi").render(&recipient);

        let err = transport
            .send_one(&recipient, &rendered[0])
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(!transport.is_connected());
    }
}
