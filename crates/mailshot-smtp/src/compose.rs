//! RFC 5322 message composition.

use std::fmt::Write as _;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset, Local};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Base64 line length for attachment bodies.
const MAX_LINE_LENGTH: usize = 76;

/// A display name and address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mailbox<'a> {
    /// Display name, if any.
    pub name: Option<&'a str>,
    /// Bare address.
    pub address: &'a str,
}

impl Mailbox<'_> {
    fn header_value(&self) -> String {
        match self.name.filter(|n| !n.trim().is_empty()) {
            Some(name) => format!("{} <{}>", encode_phrase(name), self.address),
            None => self.address.to_string(),
        }
    }
}

/// A file attached to every message of a run.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the recipient.
    pub filename: String,
    /// MIME type.
    pub content_type: &'static str,
    /// Raw file content.
    pub content: Vec<u8>,
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.content.len())
            .finish()
    }
}

impl Attachment {
    /// Reads a file from disk.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be read.
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let content = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self {
            content_type: guess_content_type(&filename),
            filename,
            content,
        })
    }
}

/// MIME type from a file extension.
#[must_use]
pub fn guess_content_type(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Date and unique token stamped on one outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    /// `Date` header value.
    pub date: DateTime<FixedOffset>,
    /// Random token used for the `Message-ID` and MIME boundary.
    pub token: String,
}

impl Stamp {
    /// Current local time and a fresh random token.
    #[must_use]
    pub fn now() -> Self {
        let token = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        Self {
            date: Local::now().fixed_offset(),
            token,
        }
    }
}

/// One outgoing email.
#[derive(Debug, Clone, Copy)]
pub struct Email<'a> {
    /// Sender.
    pub from: Mailbox<'a>,
    /// Single recipient.
    pub to: Mailbox<'a>,
    /// Subject line.
    pub subject: Option<&'a str>,
    /// Plain-text body.
    pub body: &'a str,
    /// Optional attachment.
    pub attachment: Option<&'a Attachment>,
}

impl Email<'_> {
    /// Builds the RFC 5322 formatted message.
    ///
    /// A `text/plain` single part without an attachment, `multipart/mixed`
    /// with one.
    #[must_use]
    pub fn to_rfc5322(&self, stamp: &Stamp) -> String {
        let mut message = String::new();
        let domain = self
            .from
            .address
            .rsplit_once('@')
            .map_or("localhost", |(_, domain)| domain);

        let _ = write!(
            message,
            "From: {}\r\nTo: {}\r\n",
            self.from.header_value(),
            self.to.header_value()
        );
        if let Some(subject) = self.subject {
            let _ = write!(message, "Subject: {}\r\n", encode_header(subject));
        }
        let _ = write!(
            message,
            "Date: {}\r\nMessage-ID: <{}@{domain}>\r\nMIME-Version: 1.0\r\n",
            stamp.date.to_rfc2822(),
            stamp.token
        );

        match self.attachment {
            None => {
                push_text_headers(&mut message);
                message.push_str("\r\n");
                message.push_str(self.body);
            }
            Some(attachment) => {
                let boundary = format!("=_mailshot_{}", stamp.token);
                let _ = write!(
                    message,
                    "Content-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n--{boundary}\r\n"
                );
                push_text_headers(&mut message);
                let _ = write!(message, "\r\n{}\r\n", self.body);

                let filename = encode_header(&attachment.filename).replace('"', "");
                let _ = write!(
                    message,
                    "--{boundary}\r\n\
                     Content-Type: {}; name=\"{filename}\"\r\n\
                     Content-Transfer-Encoding: base64\r\n\
                     Content-Disposition: attachment; filename=\"{filename}\"\r\n\r\n",
                    attachment.content_type
                );
                push_base64_lines(&mut message, &attachment.content);
                let _ = write!(message, "--{boundary}--\r\n");
            }
        }

        message
    }
}

fn push_text_headers(message: &mut String) {
    message.push_str("Content-Type: text/plain; charset=utf-8\r\n");
    message.push_str("Content-Transfer-Encoding: 8bit\r\n");
}

fn push_base64_lines(message: &mut String, content: &[u8]) {
    let encoded = STANDARD.encode(content);
    for chunk in encoded.as_bytes().chunks(MAX_LINE_LENGTH) {
        message.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        message.push_str("\r\n");
    }
}

/// RFC 2047 encoded-word for non-ASCII header text.
#[must_use]
pub fn encode_header(text: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) && !text.contains("=?") {
        return text.to_string();
    }
    format!("=?utf-8?B?{}?=", STANDARD.encode(text.as_bytes()))
}

/// Display name as a quoted string, or an encoded-word when it holds
/// non-ASCII or control characters.
fn encode_phrase(name: &str) -> String {
    if name.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        encode_header(name)
    }
}
