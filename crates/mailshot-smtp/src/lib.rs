//! # mailshot-smtp
//!
//! SMTP transport for `mailshot` campaigns.
//!
//! ## Features
//!
//! - **One session per run**: connect and authenticate once, then one
//!   `MAIL FROM`/`RCPT TO`/`DATA` transaction per message
//! - **TLS support**: Both implicit TLS (port 465) and STARTTLS
//! - **Authentication**: PLAIN, falling back to LOGIN
//! - **Composition**: RFC 5322 text with RFC 2047 headers and an optional
//!   base64 attachment
//! - **Failure tiers**: per-recipient rejections are recoverable, a broken
//!   session is fatal
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailshot_core::{Credentials, DispatchEngine, Message, UniformPacing, DelayRange};
//! use mailshot_smtp::{SmtpSettings, SmtpTransport};
//!
//! let mut transport = SmtpTransport::new(SmtpSettings::default());
//! let mut pacing = UniformPacing::new(DelayRange::EMAIL);
//! let credentials = Credentials::resolve("sender@gmail.com", "MAILSHOT_SECRET")?;
//! let report = DispatchEngine::new()
//!     .run(validated, &Message::new("Dear {name}, ..."), &mut transport, &mut pacing, &credentials)
//!     .await;
//! println!("{}", report.summarize());
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders and EHLO capabilities
//! - [`compose`]: RFC 5322 message composition
//! - [`reply`]: Reply types and parser
//! - [`session`]: SMTP session over any async stream
//! - [`stream`]: TCP/TLS streams
//! - [`transport`]: the `Transport` implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod compose;
mod error;
pub mod reply;
pub mod session;
pub mod stream;
pub mod transport;

pub use command::{AuthMechanism, Command, ServerInfo};
pub use compose::{Attachment, Email, Mailbox, Stamp};
pub use error::{Error, Result};
pub use reply::{Reply, ReplyClass, ReplyCode};
pub use session::Session;
pub use stream::SmtpStream;
pub use transport::{Security, SmtpSettings, SmtpTransport};
