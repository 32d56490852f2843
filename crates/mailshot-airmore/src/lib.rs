//! # mailshot-airmore
//!
//! SMS transport for `mailshot` campaigns using the Airmore Android app,
//! which exposes the phone as an HTTP endpoint on the local network.
//!
//! Connecting asks the phone for authorization (the user accepts a prompt on
//! the device); every rendered message is then sent as one SMS.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod session;
pub mod transport;

pub use error::{Error, Result};
pub use session::AirmoreSession;
pub use transport::{AirmoreSettings, AirmoreTransport, DEFAULT_PORT};
