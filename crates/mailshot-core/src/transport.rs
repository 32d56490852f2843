//! The capability interface every delivery channel implements.

use std::future::Future;

use crate::credentials::Credentials;
use crate::error::{ConnectError, SendError};
use crate::message::RenderedMessage;
use crate::recipient::Recipient;

/// A delivery channel holding a single session for the whole run.
///
/// The engine calls [`connect`](Transport::connect) once, then
/// [`send_one`](Transport::send_one) per message, then
/// [`close`](Transport::close) exactly once if `connect` succeeded. Calls
/// never overlap.
///
/// Implementations classify every send failure as
/// [`SendError::Recoverable`] (this recipient only) or [`SendError::Fatal`]
/// (the session is unusable).
pub trait Transport {
    /// Opens and authenticates the session.
    ///
    /// On failure the implementation releases anything it acquired; `close`
    /// will not be called.
    fn connect(
        &mut self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<(), ConnectError>> + Send;

    /// Delivers one rendered message to one recipient.
    fn send_one(
        &mut self,
        recipient: &Recipient,
        message: &RenderedMessage,
    ) -> impl Future<Output = Result<(), SendError>> + Send;

    /// Releases the session. Errors are logged by the implementation.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
