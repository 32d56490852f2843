//! # mailshot-core
//!
//! Core logic for `mailshot`, a paced bulk email/SMS sender.
//!
//! This crate provides:
//! - Row validation into [`Recipient`]s with per-row skip reasons
//! - Pacing policies for the delay between sends
//! - The [`Transport`] capability interface
//! - The [`DispatchEngine`] state machine and its [`SendReport`]
//! - Credential resolution (environment, then system keyring)
//!
//! Concrete transports live in `mailshot-smtp` and `mailshot-airmore`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod credentials;
pub mod engine;
mod error;
pub mod message;
pub mod pacing;
pub mod recipient;
pub mod report;
pub mod transport;
pub mod validation;

pub use credentials::{CredentialError, CredentialResult, Credentials};
pub use engine::{DispatchEngine, DispatchEvent, DispatchState};
pub use error::{ConnectError, Error, Result, SendError};
pub use message::{Message, NAME_PLACEHOLDER, RenderedMessage};
pub use pacing::{DelayRange, NoPacing, PacingPolicy, UniformPacing};
pub use recipient::{IdentifierKind, Recipient, RowValidationError};
pub use report::{SendOutcome, SendReport, SendResult, Summary};
pub use transport::Transport;
pub use validation::{RowSkip, Validated, ValidationConfig, validate};
