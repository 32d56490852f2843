//! One SMTP session reused for many transactions.
//!
//! ```text
//! open() ──→ ehlo() ──→ [starttls() ──→ ehlo()] ──→ authenticate()
//!                                                        │
//!              ┌──────────── send_mail() ←───────────────┘
//!              │   MAIL FROM → RCPT TO → DATA → message
//!              └── rset() after a rejected transaction ──→ quit()
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, trace};

use crate::command::{AuthMechanism, Command, ServerInfo};
use crate::error::{Error, Result};
use crate::reply::{Reply, ReplyCode, is_final_line};
use crate::stream::SmtpStream;

/// SMTP client session over any byte stream.
#[derive(Debug)]
pub struct Session<S> {
    stream: BufReader<S>,
    info: ServerInfo,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the server does not
    /// answer 220.
    pub async fn open(stream: S) -> Result<Self> {
        let mut session = Self {
            stream: BufReader::new(stream),
            info: ServerInfo::default(),
        };

        let greeting = session
            .read_reply()
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;
        session.info.hostname = greeting
            .lines
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        debug!(server = %session.info.hostname, "SMTP greeting received");

        Ok(session)
    }

    /// Returns the server information.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.info
    }

    /// Sends EHLO and discovers server capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(&mut self, client_hostname: &str) -> Result<()> {
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?
            .expect_success()?;
        self.info.apply_ehlo(&reply.lines);
        Ok(())
    }

    /// Authenticates with PLAIN, or LOGIN when PLAIN is not offered.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotSupported` if the server offers neither mechanism,
    /// or the server's rejection.
    pub async fn authenticate(
        &mut self,
        username: &str,
        secret: &SecretString,
    ) -> Result<AuthMechanism> {
        let mechanism = self
            .info
            .preferred_auth()
            .ok_or_else(|| Error::NotSupported("AUTH PLAIN or LOGIN".into()))?;

        match mechanism {
            AuthMechanism::Plain => {
                let token = format!("\0{username}\0{}", secret.expose_secret());
                self.send_command(&Command::Auth {
                    mechanism,
                    initial_response: Some(STANDARD.encode(token.as_bytes())),
                })
                .await?
                .expect_success()?;
            }
            AuthMechanism::Login => {
                self.send_command(&Command::Auth {
                    mechanism,
                    initial_response: None,
                })
                .await?
                .expect_code(ReplyCode::AUTH_CONTINUE)?;
                self.send_command(&Command::AuthResponse(STANDARD.encode(username)))
                    .await?
                    .expect_code(ReplyCode::AUTH_CONTINUE)?;
                self.send_command(&Command::AuthResponse(
                    STANDARD.encode(secret.expose_secret()),
                ))
                .await?
                .expect_success()?;
            }
        }

        debug!(mechanism = mechanism.as_str(), "SMTP authentication accepted");
        Ok(mechanism)
    }

    /// Runs one complete mail transaction.
    ///
    /// `message` is RFC 5322 text. Line endings are normalized to CRLF, lines
    /// starting with `.` are dot-stuffed, and the terminator is appended.
    ///
    /// # Errors
    ///
    /// Returns `Error::MessageTooLarge` before any command is sent if the
    /// server advertised a smaller SIZE, otherwise the first rejection.
    pub async fn send_mail(&mut self, from: &str, to: &str, message: &[u8]) -> Result<()> {
        let data = encode_data(message);
        if let Some(limit) = self.info.max_size {
            if data.len() > limit {
                return Err(Error::MessageTooLarge {
                    size: data.len(),
                    limit,
                });
            }
        }

        self.send_command(&Command::MailFrom {
            from: from.to_string(),
            size: self.info.max_size.map(|_| data.len()),
        })
        .await?
        .expect_success()?;
        self.send_command(&Command::RcptTo { to: to.to_string() })
            .await?
            .expect_success()?;
        self.send_command(&Command::Data)
            .await?
            .expect_code(ReplyCode::START_DATA)?;

        self.write(&data).await?;
        self.read_reply().await?.expect_success()?;
        Ok(())
    }

    /// Aborts the current transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn rset(&mut self) -> Result<()> {
        self.send_command(&Command::Rset).await?.expect_success()?;
        Ok(())
    }

    /// Sends QUIT and shuts the stream down.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        self.stream.get_mut().shutdown().await?;
        Ok(())
    }

    async fn send_command(&mut self, command: &Command) -> Result<Reply> {
        trace!(command = command.verb(), "SMTP command");
        self.write(&command.serialize()?).await?;
        self.read_reply().await
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let mut buf = String::new();
            if self.stream.read_line(&mut buf).await? == 0 {
                return Err(Error::ConnectionClosed);
            }

            let line = buf.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }

            let is_last = is_final_line(line);
            lines.push(line.to_string());
            if is_last {
                break;
            }
        }

        Reply::parse(&lines)
    }
}

impl Session<SmtpStream> {
    /// Upgrades the session to TLS using STARTTLS.
    ///
    /// Capabilities are cleared; call [`ehlo`](Self::ehlo) again afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not advertised or the upgrade fails.
    pub async fn starttls(mut self, hostname: &str) -> Result<Self> {
        if !self.info.starttls {
            return Err(Error::NotSupported("STARTTLS".into()));
        }
        self.send_command(&Command::StartTls)
            .await?
            .expect_code(ReplyCode::SERVICE_READY)?;

        let Self { stream, info } = self;
        let stream = stream.into_inner().starttls(hostname).await?;
        debug!(server = %info.hostname, "STARTTLS negotiated");

        Ok(Self {
            stream: BufReader::new(stream),
            info: ServerInfo {
                hostname: info.hostname,
                ..ServerInfo::default()
            },
        })
    }
}

/// Prepares message text for the DATA phase.
#[must_use]
pub fn encode_data(message: &[u8]) -> Vec<u8> {
    let body = message
        .strip_suffix(b"\n")
        .map_or(message, |m| m.strip_suffix(b"\r").unwrap_or(m));

    let mut data = Vec::with_capacity(message.len() + 16);
    for line in body.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        // Byte-stuff lines starting with '.'
        if line.first() == Some(&b'.') {
            data.push(b'.');
        }
        data.extend_from_slice(line);
        data.extend_from_slice(b"\r\n");
    }
    data.extend_from_slice(b".\r\n");
    data
}
