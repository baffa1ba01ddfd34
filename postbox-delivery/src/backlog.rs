//! Side-channel for non-transiently failed messages.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::warn;

use crate::{error::DeliveryError, queue::QueueEntry};

/// A failed delivery retained for shutdown-time persistence.
#[derive(Debug)]
pub struct FailedDelivery {
    /// The error the transport reported.
    pub error: DeliveryError,
    /// The entry that failed.
    pub entry: QueueEntry,
}

/// Bounded log of non-transient failures.
///
/// Messages here are not retried while the process runs; they exist so
/// a shutdown drain can persist them and the next start gets one more
/// try. When full the oldest record is dropped.
#[derive(Debug)]
pub struct ErrorBacklog {
    capacity: usize,
    entries: Mutex<VecDeque<FailedDelivery>>,
}

impl ErrorBacklog {
    /// Create a backlog holding at most `capacity` records. A capacity
    /// of 0 means unbounded.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a failed delivery.
    pub fn push(&self, error: DeliveryError, entry: QueueEntry) {
        let mut entries = self.entries.lock();
        if self.capacity > 0 && entries.len() >= self.capacity {
            if let Some(dropped) = entries.pop_front() {
                warn!(
                    subject = dropped.entry.message.subject(),
                    "error backlog full, dropping oldest failed message"
                );
            }
        }
        entries.push_back(FailedDelivery { error, entry });
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check whether the backlog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove every record, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<FailedDelivery> {
        self.entries.lock().drain(..).collect()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{error::TransportError, queue::DeliveryQueue};
    use postbox_common::Message;

    fn entry(subject: &str) -> QueueEntry {
        let queue = DeliveryQueue::default();
        queue.enqueue(
            Message::new(["rcpt@example.com"], subject, "body").expect("valid message"),
            0,
        );
        queue.dequeue().expect("entry")
    }

    fn refused() -> DeliveryError {
        TransportError::Connect("connection refused".into()).into()
    }

    #[test]
    fn test_push_and_drain_oldest_first() {
        let backlog = ErrorBacklog::new(8);
        backlog.push(refused(), entry("first"));
        backlog.push(refused(), entry("second"));
        assert_eq!(backlog.len(), 2);

        let drained = backlog.drain();
        assert_eq!(drained[0].entry.message.subject(), "first");
        assert_eq!(drained[1].entry.message.subject(), "second");
        assert!(backlog.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let backlog = ErrorBacklog::new(2);
        backlog.push(refused(), entry("first"));
        backlog.push(refused(), entry("second"));
        backlog.push(refused(), entry("third"));

        let drained = backlog.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].entry.message.subject(), "second");
        assert_eq!(drained[1].entry.message.subject(), "third");
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let backlog = ErrorBacklog::new(0);
        for i in 0..100 {
            backlog.push(refused(), entry(&format!("message {i}")));
        }
        assert_eq!(backlog.len(), 100);
    }
}
