//! Delivery manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{queue::QueueOrder, retry::RetryPolicy};

const fn default_send_timeout() -> u64 {
    5
}

const fn default_error_backlog() -> usize {
    128
}

const fn default_recovery_stagger() -> u64 {
    250
}

/// Tunables for the delivery manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Per-message transport timeout, in seconds. A send still pending
    /// when this expires is abandoned and the message requeued.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,

    /// Dequeue ordering.
    #[serde(default)]
    pub order: QueueOrder,

    /// Retry cap for messages that keep timing out.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Maximum records kept in the error backlog; 0 means unbounded.
    #[serde(default = "default_error_backlog")]
    pub error_backlog: usize,

    /// Delay step between re-submissions of recovered messages, in
    /// milliseconds. Recovery is staggered so a cold start with a large
    /// backup does not flood the transport.
    #[serde(default = "default_recovery_stagger")]
    pub recovery_stagger_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: default_send_timeout(),
            order: QueueOrder::default(),
            retry: RetryPolicy::default(),
            error_backlog: default_error_backlog(),
            recovery_stagger_ms: default_recovery_stagger(),
        }
    }
}

impl DeliveryConfig {
    /// Per-message timeout as a [`Duration`].
    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    /// Stagger step as a [`Duration`].
    #[must_use]
    pub const fn recovery_stagger(&self) -> Duration {
        Duration::from_millis(self.recovery_stagger_ms)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeliveryConfig::default();
        assert_eq!(config.send_timeout(), Duration::from_secs(5));
        assert_eq!(config.order, QueueOrder::Priority);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.error_backlog, 128);
        assert_eq!(config.recovery_stagger(), Duration::from_millis(250));
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: DeliveryConfig =
            serde_json::from_str(r#"{ "send_timeout_secs": 30, "order": "fifo" }"#)
                .expect("parse");

        assert_eq!(config.send_timeout(), Duration::from_secs(30));
        assert_eq!(config.order, QueueOrder::Fifo);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.error_backlog, 128);
    }
}
