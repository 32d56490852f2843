//! Dispatch state machine.
//!
//! ```text
//! Idle ──connect()──→ Connecting ──ok──→ Sending ──loop done──→ Done
//!                          │                │
//!                          └──err──→ Aborted ←──fatal send──┘
//! ```
//!
//! Recipients are processed strictly in input order on the caller's task.
//! One pacing point separates consecutive send attempts, including the bodies
//! of a multi-part message to the same recipient. Once the transport has
//! connected it is closed exactly once, whatever the exit path.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::credentials::Credentials;
use crate::error::{ConnectError, SendError};
use crate::message::Message;
use crate::pacing::PacingPolicy;
use crate::recipient::Recipient;
use crate::report::{SendOutcome, SendReport, Summary};
use crate::transport::Transport;
use crate::validation::Validated;

/// Engine lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    /// Not started.
    #[default]
    Idle,
    /// Opening the transport session.
    Connecting,
    /// Working through recipients.
    Sending,
    /// Every recipient was attempted.
    Done,
    /// Stopped early by a connect failure or a fatal send error.
    Aborted,
}

impl DispatchState {
    /// Returns true for `Done` and `Aborted`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

/// Progress notifications emitted during a run.
#[derive(Debug)]
pub enum DispatchEvent<'a> {
    /// About to open the session.
    Connecting {
        /// Recipients queued for the run.
        recipients: usize,
    },
    /// The session could not be opened; nothing will be sent.
    ConnectFailed {
        /// The connect error.
        error: &'a ConnectError,
    },
    /// Session open, sending begins.
    Connected,
    /// A send attempt is starting.
    Sending {
        /// Target recipient.
        recipient: &'a Recipient,
        /// 1-based body index.
        part: usize,
        /// Number of bodies for this recipient.
        parts: usize,
    },
    /// Pacing wait before the next attempt.
    Waiting {
        /// How long.
        delay: Duration,
    },
    /// All bodies reached the transport.
    Delivered {
        /// The recipient.
        recipient: &'a Recipient,
    },
    /// Recoverable failure; the run continues.
    Failed {
        /// The recipient.
        recipient: &'a Recipient,
        /// Transport-provided reason.
        reason: &'a str,
    },
    /// Recipient not attempted.
    Skipped {
        /// The recipient.
        recipient: &'a Recipient,
        /// Why.
        reason: &'a str,
    },
    /// Fatal failure; the remaining recipients are aborted.
    FatalAbort {
        /// The recipient whose send failed.
        recipient: &'a Recipient,
        /// Transport-provided reason.
        reason: &'a str,
        /// Recipients left unattempted.
        remaining: usize,
    },
    /// Run finished.
    Finished {
        /// Terminal state.
        state: DispatchState,
        /// Final counts.
        summary: Summary,
    },
}

type Observer = Box<dyn FnMut(&DispatchEvent<'_>) + Send>;

/// Drives one campaign run through a [`Transport`].
pub struct DispatchEngine {
    state: DispatchState,
    skip_duplicates: bool,
    observer: Option<Observer>,
}

impl std::fmt::Debug for DispatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEngine")
            .field("state", &self.state)
            .field("skip_duplicates", &self.skip_duplicates)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for DispatchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchEngine {
    /// Creates an idle engine that sends to every recipient, duplicates
    /// included.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: DispatchState::Idle,
            skip_duplicates: false,
            observer: None,
        }
    }

    /// Enables or disables skipping identifiers already seen in this run.
    /// Off unless enabled here.
    #[must_use]
    pub const fn skip_duplicates(mut self, enabled: bool) -> Self {
        self.skip_duplicates = enabled;
        self
    }

    /// Registers a callback for [`DispatchEvent`]s.
    #[must_use]
    pub fn with_observer(
        mut self,
        observer: impl FnMut(&DispatchEvent<'_>) + Send + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> DispatchState {
        self.state
    }

    /// Runs the campaign and returns the report.
    ///
    /// Never fails: connect errors and fatal send errors end the run early
    /// and are visible in the report as `Aborted` outcomes.
    pub async fn run<T, P>(
        &mut self,
        validated: Validated,
        message: &Message,
        transport: &mut T,
        pacing: &mut P,
        credentials: &Credentials,
    ) -> SendReport
    where
        T: Transport,
        P: PacingPolicy,
    {
        let Validated { recipients, skips } = validated;
        let mut report = SendReport::new(skips);
        self.state = DispatchState::Idle;

        if recipients.is_empty() {
            info!("No valid recipients to send to");
            self.finish(DispatchState::Done, &report);
            return report;
        }

        self.state = DispatchState::Connecting;
        info!(recipients = recipients.len(), "Connecting transport");
        self.emit(&DispatchEvent::Connecting {
            recipients: recipients.len(),
        });

        if let Err(error) = transport.connect(credentials).await {
            error!(%error, "Could not open transport session");
            self.emit(&DispatchEvent::ConnectFailed { error: &error });
            for recipient in recipients {
                report.record(recipient, SendOutcome::Aborted);
            }
            self.finish(DispatchState::Aborted, &report);
            return report;
        }

        self.state = DispatchState::Sending;
        self.emit(&DispatchEvent::Connected);

        let outcome = self
            .send_all(recipients, message, transport, pacing, &mut report)
            .await;

        transport.close().await;
        self.finish(outcome, &report);
        report
    }

    async fn send_all<T, P>(
        &mut self,
        recipients: Vec<Recipient>,
        message: &Message,
        transport: &mut T,
        pacing: &mut P,
        report: &mut SendReport,
    ) -> DispatchState
    where
        T: Transport,
        P: PacingPolicy,
    {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut attempted = false;
        let mut pending = recipients.into_iter();

        while let Some(recipient) = pending.next() {
            if self.skip_duplicates {
                if let Some(first_row) = seen.get(recipient.identifier()) {
                    let reason = format!("duplicate of row {first_row}");
                    debug!(row = recipient.source_row(), %reason, "Skipping recipient");
                    self.emit(&DispatchEvent::Skipped {
                        recipient: &recipient,
                        reason: &reason,
                    });
                    report.record(recipient, SendOutcome::Skipped(reason));
                    continue;
                }
                seen.insert(recipient.identifier().to_string(), recipient.source_row());
            }

            match self
                .deliver(&recipient, message, transport, pacing, &mut attempted)
                .await
            {
                Ok(()) => {
                    debug!(row = recipient.source_row(), "Delivered");
                    self.emit(&DispatchEvent::Delivered {
                        recipient: &recipient,
                    });
                    report.record(recipient, SendOutcome::Success);
                }
                Err(SendError::Recoverable(reason)) => {
                    warn!(row = recipient.source_row(), %reason, "Send failed, continuing");
                    self.emit(&DispatchEvent::Failed {
                        recipient: &recipient,
                        reason: &reason,
                    });
                    report.record(recipient, SendOutcome::Failed(reason));
                }
                Err(SendError::Fatal(reason)) => {
                    let remaining = pending.len();
                    error!(
                        row = recipient.source_row(),
                        %reason,
                        remaining,
                        "Fatal transport error, stopping all further sends"
                    );
                    self.emit(&DispatchEvent::FatalAbort {
                        recipient: &recipient,
                        reason: &reason,
                        remaining,
                    });
                    report.record(recipient, SendOutcome::Failed(reason));
                    for unattempted in pending {
                        report.record(unattempted, SendOutcome::Aborted);
                    }
                    return DispatchState::Aborted;
                }
            }
        }

        DispatchState::Done
    }

    /// Sends every body for one recipient, stopping at the first error.
    async fn deliver<T, P>(
        &mut self,
        recipient: &Recipient,
        message: &Message,
        transport: &mut T,
        pacing: &mut P,
        attempted: &mut bool,
    ) -> Result<(), SendError>
    where
        T: Transport,
        P: PacingPolicy,
    {
        for rendered in message.render(recipient) {
            if *attempted {
                let delay = pacing.next_delay();
                if !delay.is_zero() {
                    debug!(?delay, "Pacing");
                    self.emit(&DispatchEvent::Waiting { delay });
                    tokio::time::sleep(delay).await;
                }
            }
            *attempted = true;

            info!(
                row = recipient.source_row(),
                part = rendered.part,
                parts = rendered.parts,
                "Sending to {}",
                recipient.display_name()
            );
            self.emit(&DispatchEvent::Sending {
                recipient,
                part: rendered.part,
                parts: rendered.parts,
            });
            transport.send_one(recipient, &rendered).await?;
        }
        Ok(())
    }

    fn finish(&mut self, state: DispatchState, report: &SendReport) {
        self.state = state;
        let summary = report.summarize();
        info!(
            ?state,
            total = summary.total,
            success = summary.success,
            failed = summary.failed,
            aborted = summary.aborted,
            "Dispatch finished"
        );
        self.emit(&DispatchEvent::Finished { state, summary });
    }

    fn emit(&mut self, event: &DispatchEvent<'_>) {
        if let Some(observer) = self.observer.as_mut() {
            observer(event);
        }
    }
}
