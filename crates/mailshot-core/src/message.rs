//! Campaign message and per-recipient rendering.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::recipient::Recipient;

/// Placeholder replaced by the recipient's display name.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// The message sent to every recipient of a run.
///
/// Email campaigns carry a single body; SMS campaigns may carry several,
/// sent in order to each recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    subject: Option<String>,
    bodies: Vec<String>,
    attachment: Option<PathBuf>,
}

impl Message {
    /// Creates a single-body message.
    #[must_use]
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            subject: None,
            bodies: vec![body.into()],
            attachment: None,
        }
    }

    /// Creates a message from an ordered sequence of bodies.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyMessage` if `bodies` is empty.
    pub fn sequence<I, S>(bodies: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let bodies: Vec<String> = bodies.into_iter().map(Into::into).collect();
        if bodies.is_empty() {
            return Err(Error::EmptyMessage);
        }
        Ok(Self {
            subject: None,
            bodies,
            attachment: None,
        })
    }

    /// Sets the subject line.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the attachment path.
    #[must_use]
    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(path.into());
        self
    }

    /// Subject line, if any.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Unrendered bodies.
    #[must_use]
    pub fn bodies(&self) -> &[String] {
        &self.bodies
    }

    /// Attachment path, if any.
    #[must_use]
    pub fn attachment(&self) -> Option<&Path> {
        self.attachment.as_deref()
    }

    /// Number of sends each recipient receives.
    #[must_use]
    pub fn parts(&self) -> usize {
        self.bodies.len()
    }

    /// Renders every body for one recipient.
    #[must_use]
    pub fn render(&self, recipient: &Recipient) -> Vec<RenderedMessage> {
        let parts = self.bodies.len();
        self.bodies
            .iter()
            .enumerate()
            .map(|(index, body)| RenderedMessage {
                subject: self
                    .subject
                    .as_ref()
                    .map(|s| substitute(s, recipient.display_name())),
                body: substitute(body, recipient.display_name()),
                attachment: self.attachment.clone(),
                part: index + 1,
                parts,
            })
            .collect()
    }
}

fn substitute(template: &str, name: &str) -> String {
    template.replace(NAME_PLACEHOLDER, name)
}

/// One body, personalized for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Subject line with the name substituted.
    pub subject: Option<String>,
    /// Body with the name substituted.
    pub body: String,
    /// Attachment to include, resolved by the transport.
    pub attachment: Option<PathBuf>,
    /// 1-based position in the recipient's sequence.
    pub part: usize,
    /// Length of the recipient's sequence.
    pub parts: usize,
}
