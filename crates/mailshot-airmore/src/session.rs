//! HTTP client for the Airmore app's LAN API.
//!
//! Every call is a `POST http://<ip>:<port>/?Key=<Action>`; the body, when
//! present, is JSON.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Airmore action keys.
pub mod action {
    /// Reports whether this client is already authorized.
    pub const CHECK_AUTHORIZATION: &str = "PhoneCheckAuthorization";
    /// Shows the accept/deny prompt on the phone and waits for the answer.
    pub const REQUEST_AUTHORIZATION: &str = "PhoneRequestAuthorization";
    /// Sends SMS messages.
    pub const SEND_MESSAGE: &str = "MessageSend";
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct OutgoingSms<'a> {
    phone: &'a str,
    content: &'a str,
}

/// Session with one phone running Airmore.
#[derive(Debug, Clone)]
pub struct AirmoreSession {
    http_client: Client,
    base_url: String,
    authorization_timeout: Duration,
}

impl AirmoreSession {
    /// Creates a session for the phone at `ip:port`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAddress` if `ip` does not parse, or an HTTP error
    /// if the client cannot be built.
    pub fn new(
        ip: &str,
        port: u16,
        request_timeout: Duration,
        authorization_timeout: Duration,
    ) -> Result<Self> {
        let ip: IpAddr = ip
            .parse()
            .map_err(|_| Error::InvalidAddress(ip.to_string()))?;
        let base_url = match ip {
            IpAddr::V4(v4) => format!("http://{v4}:{port}"),
            IpAddr::V6(v6) => format!("http://[{v6}]:{port}"),
        };
        Self::with_base_url(base_url, request_timeout, authorization_timeout)
    }

    /// Creates a session against an explicit base URL.
    ///
    /// # Errors
    ///
    /// Returns an HTTP error if the client cannot be built.
    pub fn with_base_url(
        base_url: impl Into<String>,
        request_timeout: Duration,
        authorization_timeout: Duration,
    ) -> Result<Self> {
        let http_client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authorization_timeout,
        })
    }

    /// Base URL of the device.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns true if anything answers HTTP at the device address.
    pub async fn is_server_running(&self) -> bool {
        match self.http_client.get(format!("{}/", self.base_url)).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, url = %self.base_url, "Airmore server not reachable");
                false
            }
        }
    }

    /// Returns true if the phone has already authorized this client.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn is_authorized(&self) -> Result<bool> {
        let response = self
            .post::<()>(action::CHECK_AUTHORIZATION, None, None)
            .await?;
        read_flag(response).await
    }

    /// Prompts on the phone and waits for the user's answer.
    ///
    /// Returns false if the user denied the request or it timed out on the
    /// device.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn request_authorization(&self) -> Result<bool> {
        let response = self
            .post::<()>(
                action::REQUEST_AUTHORIZATION,
                None,
                Some(self.authorization_timeout),
            )
            .await?;
        read_flag(response).await
    }

    /// Sends one SMS.
    ///
    /// # Errors
    ///
    /// Returns an HTTP error if the device is unreachable, or
    /// `Error::Status` if it rejects the request.
    pub async fn send_message(&self, phone: &str, content: &str) -> Result<()> {
        let body = [OutgoingSms { phone, content }];
        self.post(action::SEND_MESSAGE, Some(&body), None).await?;
        Ok(())
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        action: &'static str,
        body: Option<&B>,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let mut request = self
            .http_client
            .post(format!("{}/", self.base_url))
            .query(&[("Key", action)]);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(action, status = status.as_u16(), "Airmore response");
        if !status.is_success() {
            return Err(Error::Status {
                action,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

async fn read_flag(response: Response) -> Result<bool> {
    let text = response.text().await?;
    Ok(text.trim().eq_ignore_ascii_case("true"))
}
