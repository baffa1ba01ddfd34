//! The outbound message value object.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default submission priority. Lower values are more urgent.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Errors raised while constructing a [`Message`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    /// A message must be addressed to at least one recipient.
    #[error("message has no recipients")]
    NoRecipients,
}

/// An immutable outbound email.
///
/// The body arrives fully rendered; templating is the caller's concern.
/// Once constructed a message is never mutated. The transport may stamp
/// a `Date` header at send time, but that never feeds back into queue
/// state.
///
/// Priority is deliberately not part of the message: it belongs to a
/// submission, and is supplied alongside the message when queueing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    recipients: Vec<String>,
    subject: String,
    body: String,
}

impl Message {
    /// Create a new message.
    ///
    /// # Errors
    /// Returns [`MessageError::NoRecipients`] if `recipients` is empty.
    pub fn new(
        recipients: impl IntoIterator<Item = impl Into<String>>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, MessageError> {
        let recipients: Vec<String> = recipients.into_iter().map(Into::into).collect();
        if recipients.is_empty() {
            return Err(MessageError::NoRecipients);
        }

        Ok(Self {
            recipients,
            subject: subject.into(),
            body: body.into(),
        })
    }

    /// The ordered recipient address list. Never empty.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// The subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The rendered message body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_message_requires_recipients() {
        let err = Message::new(Vec::<String>::new(), "subject", "body");
        assert_eq!(err, Err(MessageError::NoRecipients));
    }

    #[test]
    fn test_message_accessors() {
        let message = Message::new(["a@example.com", "b@example.com"], "Welcome", "Hello!")
            .expect("valid message");

        assert_eq!(message.recipients(), ["a@example.com", "b@example.com"]);
        assert_eq!(message.subject(), "Welcome");
        assert_eq!(message.body(), "Hello!");
    }

    #[test]
    fn test_message_serde_round_trip() {
        let message =
            Message::new(["a@example.com"], "Confirm your account", "Click the link below")
                .expect("valid message");

        let json = serde_json::to_string(&message).expect("serialize");
        let back: Message = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(message, back);
    }
}
