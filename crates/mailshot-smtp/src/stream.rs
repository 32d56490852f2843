//! TCP or TLS byte stream under an SMTP session.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::debug;

use crate::error::{Error, Result};

/// Either a plain or an encrypted connection to the server.
#[derive(Debug)]
pub enum SmtpStream {
    /// Unencrypted; STARTTLS may upgrade it later.
    Tcp(TcpStream),
    /// Encrypted.
    Tls(Box<TlsStream<TcpStream>>),
}

impl SmtpStream {
    /// Connects to `host:port`, handshaking TLS immediately when
    /// `implicit_tls` is set (port 465 style).
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection or the TLS handshake fails.
    pub async fn open(host: &str, port: u16, implicit_tls: bool) -> Result<Self> {
        let tcp = TcpStream::connect((host, port)).await?;
        debug!(host, port, implicit_tls, "TCP connection established");
        if implicit_tls {
            Ok(Self::Tls(Box::new(handshake(host, tcp).await?)))
        } else {
            Ok(Self::Tcp(tcp))
        }
    }

    /// Switches a plain connection to TLS after the server accepted STARTTLS.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the stream is already encrypted, or the
    /// handshake error.
    pub async fn starttls(self, host: &str) -> Result<Self> {
        match self {
            Self::Tcp(tcp) => Ok(Self::Tls(Box::new(handshake(host, tcp).await?))),
            Self::Tls(_) => Err(Error::Protocol("STARTTLS on an encrypted stream".into())),
        }
    }

    /// True once the stream is encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

async fn handshake(host: &str, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| Error::InvalidHostname(host.to_string()))?;
    let stream = TlsConnector::from(client_config())
        .connect(server_name, tcp)
        .await?;
    Ok(stream)
}

/// Client config trusting the Mozilla root set, built once per process.
fn client_config() -> Arc<ClientConfig> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();
    CONFIG
        .get_or_init(|| {
            let roots = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            Arc::new(
                ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth(),
            )
        })
        .clone()
}

/// Forwards a poll call to whichever stream is active.
macro_rules! forward {
    ($this:expr, $stream:ident => $call:expr) => {
        match $this.get_mut() {
            SmtpStream::Tcp($stream) => {
                let $stream = Pin::new($stream);
                $call
            }
            SmtpStream::Tls($stream) => {
                let $stream = Pin::new($stream.as_mut());
                $call
            }
        }
    };
}

impl AsyncRead for SmtpStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        forward!(self, s => s.poll_read(cx, buf))
    }
}

impl AsyncWrite for SmtpStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        forward!(self, s => s.poll_write(cx, buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        forward!(self, s => s.poll_flush(cx))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        forward!(self, s => s.poll_shutdown(cx))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_plain_stream_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 ready\r\n").await.unwrap();
        });

        let mut stream = SmtpStream::open("127.0.0.1", port, false).await.unwrap();
        assert!(!stream.is_tls());
        let mut greeting = String::new();
        stream.read_to_string(&mut greeting).await.unwrap();
        assert_eq!(greeting, "220 ready\r\n");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_hostname_for_tls() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let stream = SmtpStream::open("127.0.0.1", port, false).await.unwrap();

        let err = stream.starttls("bad host name").await.unwrap_err();
        assert!(matches!(err, Error::InvalidHostname(_)));
    }
}
