//! [`Transport`] implementation sending SMS through an Airmore phone.

use std::time::Duration;

use mailshot_core::{ConnectError, Credentials, Recipient, RenderedMessage, SendError, Transport};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::session::AirmoreSession;

/// Default Airmore port.
pub const DEFAULT_PORT: u16 = 2333;

/// Phone address and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirmoreSettings {
    /// Phone's LAN IP address.
    pub ip: String,
    /// Airmore port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// How long to wait for the user to accept the prompt on the phone.
    #[serde(default = "default_authorization_timeout")]
    pub authorization_timeout_secs: u64,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_request_timeout() -> u64 {
    30
}

const fn default_authorization_timeout() -> u64 {
    60
}

impl Default for AirmoreSettings {
    fn default() -> Self {
        Self {
            ip: "192.168.1.68".to_string(),
            port: DEFAULT_PORT,
            request_timeout_secs: default_request_timeout(),
            authorization_timeout_secs: default_authorization_timeout(),
        }
    }
}

impl AirmoreSettings {
    /// Builds a session from these settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the IP address is invalid.
    pub fn session(&self) -> crate::Result<AirmoreSession> {
        AirmoreSession::new(
            &self.ip,
            self.port,
            Duration::from_secs(self.request_timeout_secs),
            Duration::from_secs(self.authorization_timeout_secs),
        )
    }
}

/// Sends each rendered message as one SMS.
///
/// Airmore authorizes by an on-device prompt, so the credentials passed to
/// `connect` are not used.
#[derive(Debug)]
pub struct AirmoreTransport {
    session: AirmoreSession,
    authorized: bool,
}

impl AirmoreTransport {
    /// Creates a transport for an existing session.
    #[must_use]
    pub const fn new(session: AirmoreSession) -> Self {
        Self {
            session,
            authorized: false,
        }
    }

    /// Creates a transport from settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the IP address is invalid.
    pub fn from_settings(settings: &AirmoreSettings) -> crate::Result<Self> {
        Ok(Self::new(settings.session()?))
    }

    /// Returns true between a successful `connect` and `close`.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.authorized
    }
}

impl Transport for AirmoreTransport {
    async fn connect(&mut self, _credentials: &Credentials) -> Result<(), ConnectError> {
        let url = self.session.base_url().to_string();
        info!(%url, "Connecting to Airmore");

        if !self.session.is_server_running().await {
            return Err(ConnectError::Connection(format!(
                "Airmore server is not running or unreachable at {url}"
            )));
        }

        let already = self
            .session
            .is_authorized()
            .await
            .map_err(|e| ConnectError::Connection(e.to_string()))?;
        if !already {
            info!("Requesting authorization on the phone");
            let accepted = self
                .session
                .request_authorization()
                .await
                .map_err(|e| ConnectError::Connection(e.to_string()))?;
            if !accepted {
                return Err(ConnectError::Authentication(
                    "Authorization was denied or timed out on the phone".into(),
                ));
            }
        }

        info!("Airmore authorization accepted");
        self.authorized = true;
        Ok(())
    }

    async fn send_one(
        &mut self,
        recipient: &Recipient,
        message: &RenderedMessage,
    ) -> Result<(), SendError> {
        if !self.authorized {
            return Err(SendError::fatal("Airmore session is not authorized"));
        }
        if message.attachment.is_some() {
            debug!("Attachments are not supported over SMS, sending text only");
        }

        match self
            .session
            .send_message(recipient.identifier(), &message.body)
            .await
        {
            Ok(()) => Ok(()),
            Err(error) => Err(classify_send(error)),
        }
    }

    async fn close(&mut self) {
        self.authorized = false;
        debug!("Airmore session released");
    }
}

/// Unreachable device or revoked authorization ends the run; anything else
/// only fails this message.
fn classify_send(error: Error) -> SendError {
    match error {
        Error::Http(_) => {
            warn!(%error, "Device unreachable");
            SendError::fatal(error.to_string())
        }
        Error::Status { .. } if error.is_unauthorized() => SendError::fatal(format!(
            "Authorization revoked or expired on the device ({error})"
        )),
        Error::Status { .. } | Error::InvalidAddress(_) => {
            SendError::recoverable(error.to_string())
        }
    }
}
