//! Operator-facing trace of a run.

use std::io::{self, Write};

use mailshot_core::{DispatchEvent, RowSkip};

/// Renders dispatch events as human-readable lines.
#[derive(Debug)]
pub struct Progress<W> {
    out: W,
    recipients: usize,
    parts: usize,
}

impl<W: Write> Progress<W> {
    /// Creates a renderer writing to `out`.
    pub const fn new(out: W) -> Self {
        Self {
            out,
            recipients: 0,
            parts: 1,
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes the lines for one event.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn handle(&mut self, event: &DispatchEvent<'_>) -> io::Result<()> {
        match event {
            DispatchEvent::Connecting { recipients } => {
                self.recipients = *recipients;
                writeln!(self.out, "Connecting...")
            }
            DispatchEvent::ConnectFailed { error } => {
                writeln!(self.out, "❌ {error}")
            }
            DispatchEvent::Connected => writeln!(
                self.out,
                "\n--- Starting Bulk Send to {} recipients ---",
                self.recipients
            ),
            DispatchEvent::Sending {
                recipient,
                part,
                parts,
            } => {
                self.parts = *parts;
                if *part == 1 {
                    writeln!(
                        self.out,
                        "\nSending to: {recipient} [Row {}]",
                        recipient.source_row()
                    )?;
                }
                if *parts > 1 {
                    writeln!(self.out, "  -> Sending Message {part}/{parts}...")?;
                }
                Ok(())
            }
            DispatchEvent::Waiting { delay } => {
                writeln!(self.out, "  -> Waiting {} seconds...", delay.as_secs())
            }
            DispatchEvent::Delivered { .. } => {
                if self.parts > 1 {
                    writeln!(
                        self.out,
                        "  ✅ All messages sent successfully to this recipient."
                    )
                } else {
                    writeln!(self.out, "  ✅ Sent successfully.")
                }
            }
            DispatchEvent::Failed { reason, .. } => {
                writeln!(self.out, "  ❌ Failed: {reason}")
            }
            DispatchEvent::Skipped { recipient, reason } => writeln!(
                self.out,
                "\nSkipping: {recipient} [Row {}]: {reason}",
                recipient.source_row()
            ),
            DispatchEvent::FatalAbort {
                reason, remaining, ..
            } => writeln!(
                self.out,
                "  ❌ CRITICAL ERROR: {reason}\n  Stopping all further sends ({remaining} not attempted)."
            ),
            DispatchEvent::Finished { summary, .. } => writeln!(self.out, "\n{summary}"),
        }
    }

    /// Writes one line per rejected row.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn skips(&mut self, skips: &[RowSkip]) -> io::Result<()> {
        for skip in skips {
            writeln!(self.out, "Skipping {skip}")?;
        }
        Ok(())
    }
}

/// Observer printing the trace to stdout.
pub fn stdout_observer() -> impl FnMut(&DispatchEvent<'_>) + Send + 'static {
    let mut progress = Progress::new(io::stdout());
    move |event| {
        if let Err(error) = progress.handle(event) {
            tracing::warn!(%error, "Failed to write progress");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use mailshot_core::{
        ConnectError, DispatchState, IdentifierKind, Recipient, RowValidationError, Summary,
    };

    use super::*;

    fn render(events: &[DispatchEvent<'_>]) -> String {
        let mut progress = Progress::new(Vec::new());
        for event in events {
            progress.handle(event).unwrap();
        }
        String::from_utf8(progress.into_inner()).unwrap()
    }

    fn alice() -> Recipient {
        Recipient::new("Alice", "alice@example.com", 2, IdentifierKind::Email, 0).unwrap()
    }

    #[test]
    fn test_single_part_trace() {
        let alice = alice();
        let out = render(&[
            DispatchEvent::Connecting { recipients: 1 },
            DispatchEvent::Connected,
            DispatchEvent::Sending {
                recipient: &alice,
                part: 1,
                parts: 1,
            },
            DispatchEvent::Delivered { recipient: &alice },
        ]);

        assert!(out.contains("--- Starting Bulk Send to 1 recipients ---"));
        assert!(out.contains("Sending to: Alice (alice@example.com) [Row 2]"));
        assert!(!out.contains("Sending Message"));
        assert!(out.contains("  ✅ Sent successfully."));
    }

    #[test]
    fn test_multi_part_trace() {
        let alice = alice();
        let out = render(&[
            DispatchEvent::Sending {
                recipient: &alice,
                part: 1,
                parts: 2,
            },
            DispatchEvent::Waiting {
                delay: Duration::from_secs(4),
            },
            DispatchEvent::Sending {
                recipient: &alice,
                part: 2,
                parts: 2,
            },
            DispatchEvent::Delivered { recipient: &alice },
        ]);

        assert_eq!(out.matches("Sending to: Alice").count(), 1);
        assert!(out.contains("  -> Sending Message 1/2..."));
        assert!(out.contains("  -> Waiting 4 seconds..."));
        assert!(out.contains("  -> Sending Message 2/2..."));
        assert!(out.contains("All messages sent successfully"));
    }

    #[test]
    fn test_failure_lines() {
        let alice = alice();
        let refused = ConnectError::Authentication("535 bad credentials".into());
        let out = render(&[
            DispatchEvent::ConnectFailed { error: &refused },
            DispatchEvent::Failed {
                recipient: &alice,
                reason: "550 mailbox unavailable",
            },
            DispatchEvent::FatalAbort {
                recipient: &alice,
                reason: "421 service closing",
                remaining: 3,
            },
            DispatchEvent::Finished {
                state: DispatchState::Aborted,
                summary: Summary::default(),
            },
        ]);

        assert!(out.contains("❌ Authentication failed: 535 bad credentials"));
        assert!(out.contains("  ❌ Failed: 550 mailbox unavailable"));
        assert!(out.contains("CRITICAL ERROR: 421 service closing"));
        assert!(out.contains("(3 not attempted)"));
        assert!(out.contains("--- Bulk Send Summary ---"));
    }

    #[test]
    fn test_skips() {
        let mut progress = Progress::new(Vec::new());
        progress
            .skips(&[RowSkip {
                row: 4,
                reason: RowValidationError::EmptyIdentifier,
            }])
            .unwrap();
        let out = String::from_utf8(progress.into_inner()).unwrap();
        assert_eq!(out, "Skipping Row 4: Identifier is empty\n");
    }
}
