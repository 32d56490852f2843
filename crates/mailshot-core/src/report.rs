//! Per-recipient outcomes and the run summary.

use crate::recipient::Recipient;
use crate::validation::RowSkip;

/// What happened to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Every message reached the transport successfully.
    Success,
    /// Deliberately not attempted.
    Skipped(String),
    /// Attempted and failed.
    Failed(String),
    /// Never attempted because the run ended early.
    Aborted,
}

impl SendOutcome {
    /// Short label for logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped(_) => "skipped",
            Self::Failed(_) => "failed",
            Self::Aborted => "aborted",
        }
    }

    /// Reason attached to `Skipped` and `Failed`.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Skipped(reason) | Self::Failed(reason) => Some(reason),
            Self::Success | Self::Aborted => None,
        }
    }
}

/// One recipient and its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    /// The recipient.
    pub recipient: Recipient,
    /// What happened.
    pub outcome: SendOutcome,
}

/// Ordered record of a dispatch run.
///
/// Only the engine appends; callers get read access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReport {
    results: Vec<SendResult>,
    validation_skips: Vec<RowSkip>,
}

impl SendReport {
    pub(crate) const fn new(validation_skips: Vec<RowSkip>) -> Self {
        Self {
            results: Vec::new(),
            validation_skips,
        }
    }

    pub(crate) fn record(&mut self, recipient: Recipient, outcome: SendOutcome) {
        self.results.push(SendResult { recipient, outcome });
    }

    /// Results in input order.
    #[must_use]
    pub fn results(&self) -> &[SendResult] {
        &self.results
    }

    /// Rows rejected before dispatch.
    #[must_use]
    pub fn validation_skips(&self) -> &[RowSkip] {
        &self.validation_skips
    }

    /// Outcomes in input order.
    pub fn outcomes(&self) -> impl Iterator<Item = &SendOutcome> {
        self.results.iter().map(|r| &r.outcome)
    }

    /// Returns true if any recipient was left unattempted by an abort.
    #[must_use]
    pub fn was_aborted(&self) -> bool {
        self.outcomes().any(|o| matches!(o, SendOutcome::Aborted))
    }

    /// Counts outcomes.
    #[must_use]
    pub fn summarize(&self) -> Summary {
        let mut summary = Summary {
            total: self.results.len(),
            skipped_during_validation: self.validation_skips.len(),
            ..Summary::default()
        };
        for outcome in self.outcomes() {
            match outcome {
                SendOutcome::Success => summary.success += 1,
                SendOutcome::Skipped(_) => summary.skipped += 1,
                SendOutcome::Failed(_) => summary.failed += 1,
                SendOutcome::Aborted => summary.aborted += 1,
            }
        }
        summary
    }
}

/// Derived counts for a [`SendReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Recipients that entered dispatch.
    pub total: usize,
    /// Delivered.
    pub success: usize,
    /// Attempted and failed.
    pub failed: usize,
    /// Duplicates not attempted.
    pub skipped: usize,
    /// Never attempted because of an abort.
    pub aborted: usize,
    /// Rows rejected by validation.
    pub skipped_during_validation: usize,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- Bulk Send Summary ---")?;
        writeln!(f, "Total Recipients Attempted: {}", self.total)?;
        writeln!(f, "Successful Sends: {}", self.success)?;
        writeln!(f, "Failed Sends: {}", self.failed)?;
        if self.skipped > 0 {
            writeln!(f, "Skipped (duplicates): {}", self.skipped)?;
        }
        if self.aborted > 0 {
            writeln!(f, "Aborted (never attempted): {}", self.aborted)?;
        }
        writeln!(
            f,
            "Rows Skipped During Validation: {}",
            self.skipped_during_validation
        )?;
        write!(f, "-------------------------")
    }
}
