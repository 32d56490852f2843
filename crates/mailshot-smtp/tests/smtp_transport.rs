//! End-to-end runs against an in-process SMTP server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use mailshot_core::{
    ConnectError, Credentials, DispatchEngine, IdentifierKind, Message, NoPacing, Recipient,
    SendOutcome, Transport, Validated,
};
use mailshot_smtp::{Security, SmtpSettings, SmtpTransport};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the fake server saw.
#[derive(Debug, Default)]
struct Transcript {
    commands: Vec<String>,
    messages: Vec<String>,
}

/// Serves one client. Rejects `RCPT` to any `ghost` address and, when
/// `accept_login` is false, every `AUTH`.
fn spawn_server(listener: TcpListener, accept_login: bool) -> JoinHandle<Transcript> {
    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut transcript = Transcript::default();

        write.write_all(b"220 fake.test ESMTP\r\n").await.unwrap();

        while let Some(line) = lines.next_line().await.unwrap() {
            let upper = line.to_uppercase();
            let reply: &[u8] = if upper.starts_with("EHLO") {
                transcript.commands.push(line.clone());
                b"250-fake.test\r\n250 AUTH PLAIN\r\n"
            } else if upper.starts_with("AUTH") {
                transcript.commands.push("AUTH".into());
                if accept_login {
                    b"235 Accepted\r\n"
                } else {
                    b"535 Bad credentials\r\n"
                }
            } else if upper.starts_with("RCPT TO:<GHOST") {
                transcript.commands.push(line.clone());
                b"550 No such user\r\n"
            } else if upper == "DATA" {
                transcript.commands.push(line.clone());
                write.write_all(b"354 End with .\r\n").await.unwrap();
                let mut body = Vec::new();
                while let Some(data_line) = lines.next_line().await.unwrap() {
                    if data_line == "." {
                        break;
                    }
                    body.push(data_line);
                }
                transcript.messages.push(body.join("\n"));
                b"250 Queued\r\n"
            } else if upper == "QUIT" {
                transcript.commands.push(line.clone());
                write.write_all(b"221 Bye\r\n").await.unwrap();
                break;
            } else {
                transcript.commands.push(line.clone());
                b"250 OK\r\n"
            };
            write.write_all(reply).await.unwrap();
        }

        transcript
    })
}

async fn local_server(accept_login: bool) -> (SmtpSettings, JoinHandle<Transcript>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let settings = SmtpSettings {
        host: "127.0.0.1".into(),
        port: Some(port),
        security: Security::None,
        helo_name: "client.test".into(),
        from_name: Some("Campaign Desk".into()),
    };
    (settings, spawn_server(listener, accept_login))
}

fn recipient(name: &str, email: &str, row: usize) -> Recipient {
    Recipient::new(name, email, row, IdentifierKind::Email, 0).unwrap()
}

fn credentials() -> Credentials {
    Credentials::new("sender@example.com", "app-password")
}

#[tokio::test]
async fn test_campaign_over_smtp() {
    let (settings, server) = local_server(true).await;
    let mut transport = SmtpTransport::new(settings);
    let validated = Validated::from_recipients(vec![
        recipient("Asha", "asha@example.com", 2),
        recipient("Nobody", "ghost@example.com", 3),
        recipient("Chandra", "chandra@example.com", 4),
    ]);
    let message = Message::new("Dear {name},\n.\nSee you soon.").with_subject("Hello {name}");

    let report = DispatchEngine::new()
        .run(
            validated,
            &message,
            &mut transport,
            &mut NoPacing,
            &credentials(),
        )
        .await;
    let transcript = server.await.unwrap();

    let outcomes: Vec<&SendOutcome> = report.outcomes().collect();
    assert_eq!(outcomes[0], &SendOutcome::Success);
    assert!(matches!(outcomes[1], SendOutcome::Failed(reason) if reason.contains("550")));
    assert_eq!(outcomes[2], &SendOutcome::Success);

    assert_eq!(transcript.commands.first().unwrap(), "EHLO client.test");
    assert!(transcript.commands.contains(&"RSET".to_string()));
    assert_eq!(transcript.commands.last().unwrap(), "QUIT");
    assert_eq!(
        transcript
            .commands
            .iter()
            .filter(|c| c.as_str() == "DATA")
            .count(),
        2
    );

    let first = &transcript.messages[0];
    assert!(first.contains("From: \"Campaign Desk\" <sender@example.com>"));
    assert!(first.contains("To: \"Asha\" <asha@example.com>"));
    assert!(first.contains("Subject: Hello Asha"));
    assert!(first.contains("Dear Asha,\n..\nSee you soon."));
    assert!(transcript.messages[1].contains("Dear Chandra,"));
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn test_rejected_login_aborts_campaign() {
    let (settings, server) = local_server(false).await;
    let mut transport = SmtpTransport::new(settings);

    let err = transport.connect(&credentials()).await.unwrap_err();
    assert!(matches!(err, ConnectError::Authentication(_)));
    assert!(!transport.is_connected());

    let transcript = server.await.unwrap();
    assert_eq!(transcript.commands, vec!["EHLO client.test", "AUTH", "QUIT"]);
}

#[tokio::test]
async fn test_unreachable_server_is_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut transport = SmtpTransport::new(SmtpSettings {
        host: "127.0.0.1".into(),
        port: Some(port),
        security: Security::None,
        ..SmtpSettings::default()
    });

    let err = transport.connect(&credentials()).await.unwrap_err();
    assert!(matches!(err, ConnectError::Connection(_)));
}
