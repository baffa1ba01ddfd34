//! The mail transport boundary.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use postbox_common::Message;
use tokio::sync::Notify;

use crate::error::TransportError;

/// Capability to hand a message to the outside world.
///
/// Implementations speak SMTP (or whatever the deployment uses); this
/// crate only arranges the calls. The per-message timeout is applied by
/// the delivery worker, so implementations are free to block on network
/// I/O indefinitely.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send one message.
    ///
    /// # Errors
    /// Any error is treated as non-transient for the current cycle.
    async fn send(&self, message: &Message) -> Result<(), TransportError>;
}

/// Scripted outcome for one [`MockTransport`] send call.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// Record the message as delivered.
    Deliver,
    /// Never return; exercises the worker timeout.
    Hang,
    /// Fail with the given reason.
    Fail(String),
}

/// Mock transport for tests.
///
/// Records delivered messages, supports scripting the outcome of each
/// send call (unscripted calls deliver), and tracks how many sends were
/// ever active at once. Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<Message>>>,
    script: Arc<Mutex<VecDeque<SendOutcome>>>,
    active: Arc<Mutex<Concurrency>>,
    notify: Arc<Notify>,
}

#[derive(Debug, Default)]
struct Concurrency {
    current: usize,
    high_water: usize,
}

struct ActiveGuard {
    active: Arc<Mutex<Concurrency>>,
}

impl ActiveGuard {
    fn enter(active: Arc<Mutex<Concurrency>>) -> Self {
        {
            let mut state = active.lock().unwrap_or_else(PoisonError::into_inner);
            state.current += 1;
            state.high_water = state.high_water.max(state.current);
        }
        Self { active }
    }
}

impl Drop for ActiveGuard {
    // also runs when the worker timeout drops an in-progress send
    fn drop(&mut self) {
        let mut state = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        state.current -= 1;
    }
}

impl MockTransport {
    /// Create a new mock transport that delivers everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for the next send calls, in order.
    pub fn script(&self, outcomes: impl IntoIterator<Item = SendOutcome>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(outcomes);
    }

    /// Messages recorded as delivered, in delivery order.
    #[must_use]
    pub fn sent(&self) -> Vec<Message> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of messages recorded as delivered.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Highest number of concurrent send calls observed.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .high_water
    }

    /// Wait until `expected` messages have been delivered.
    ///
    /// # Errors
    /// Returns an error if the timeout is reached first.
    pub async fn wait_for_count(
        &self,
        expected: usize,
        timeout: Duration,
    ) -> Result<(), tokio::time::error::Elapsed> {
        tokio::time::timeout(timeout, async {
            while self.sent_count() < expected {
                self.notify.notified().await;
            }
        })
        .await
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, message: &Message) -> Result<(), TransportError> {
        let _guard = ActiveGuard::enter(Arc::clone(&self.active));

        let outcome = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(SendOutcome::Deliver);

        match outcome {
            SendOutcome::Deliver => {
                self.sent
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(message.clone());
                self.notify.notify_waiters();
                Ok(())
            }
            SendOutcome::Hang => std::future::pending().await,
            SendOutcome::Fail(reason) => Err(TransportError::Connect(reason)),
        }
    }
}
