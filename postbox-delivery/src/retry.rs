//! Retry policy for transiently-failed sends.

use serde::{Deserialize, Serialize};

/// Caps requeue attempts for messages that keep timing out, so a dead
/// transport cannot spin the same message at the head of the queue
/// forever.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum delivery attempts before a message is parked in the
    /// error backlog.
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
        }
    }
}

impl RetryPolicy {
    /// Check if another attempt is allowed after `attempts` tries.
    #[must_use]
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Attempts left before the message is parked.
    #[must_use]
    pub const fn remaining_attempts(&self, attempts: u32) -> u32 {
        self.max_attempts.saturating_sub(attempts)
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy { max_attempts: 3 };

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert!(!policy.should_retry(100));
    }

    #[test]
    fn test_remaining_attempts_saturates() {
        let policy = RetryPolicy { max_attempts: 3 };

        assert_eq!(policy.remaining_attempts(0), 3);
        assert_eq!(policy.remaining_attempts(2), 1);
        assert_eq!(policy.remaining_attempts(7), 0);
    }
}
