//! The delivery manager façade.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use postbox_common::{DEFAULT_PRIORITY, Message, internal};
use postbox_spool::{BackingStore, SpooledMessage};
use tracing::{debug, warn};

use crate::{
    backlog::ErrorBacklog,
    config::DeliveryConfig,
    queue::{DeliveryQueue, QueueEntry},
    transport::Transport,
    worker,
};

/// State shared between the manager façade and worker cycles.
#[derive(Debug)]
pub(crate) struct ManagerInner {
    pub(crate) config: DeliveryConfig,
    pub(crate) queue: DeliveryQueue,
    pub(crate) in_flight: Mutex<Option<QueueEntry>>,
    pub(crate) errors: ErrorBacklog,
    pub(crate) transport: Arc<dyn Transport>,
    store: Arc<dyn BackingStore>,
    scheduled: AtomicBool,
}

impl ManagerInner {
    fn submit(self: &Arc<Self>, message: Message, priority: i32) {
        self.queue.enqueue(message, priority);
        self.schedule();
    }

    /// Ensure exactly one worker cycle is outstanding.
    fn schedule(self: &Arc<Self>) {
        if self
            .scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                worker::run_cycle(&inner).await;
                inner.scheduled.store(false, Ordering::SeqCst);

                // a send() racing the flag reset may have enqueued into
                // a queue no cycle will visit; reclaim the flag and go
                // again
                if inner.queue.is_empty()
                    || inner
                        .scheduled
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                        .is_err()
                {
                    break;
                }
            }
        });
    }

    fn idle(&self) -> bool {
        !self.scheduled.load(Ordering::SeqCst)
            && self.queue.is_empty()
            && self.in_flight.lock().is_none()
    }
}

/// Owns the outbound delivery lifecycle and is the only producer-facing
/// entry point.
///
/// Constructed once by the composition root and held for the life of
/// the process; `Clone` is a cheap handle. The host drives the
/// lifecycle explicitly: [`load_unsent`](Self::load_unsent) when the
/// application is ready, [`save_unsent`](Self::save_unsent) on
/// shutdown.
#[derive(Debug, Clone)]
pub struct DeliveryManager {
    inner: Arc<ManagerInner>,
}

impl DeliveryManager {
    /// Create a manager with empty queue, in-flight slot and error
    /// backlog.
    #[must_use]
    pub fn new(
        config: DeliveryConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn BackingStore>,
    ) -> Self {
        let queue = DeliveryQueue::new(config.order);
        let errors = ErrorBacklog::new(config.error_backlog);

        Self {
            inner: Arc::new(ManagerInner {
                config,
                queue,
                in_flight: Mutex::new(None),
                errors,
                transport,
                store,
                scheduled: AtomicBool::new(false),
            }),
        }
    }

    /// Queue a message for delivery at the default priority.
    ///
    /// Returns immediately; delivery failures never surface here. From
    /// the caller's point of view the mail is scheduled, whatever its
    /// eventual fate.
    pub fn send(&self, message: Message) {
        self.send_with_priority(message, DEFAULT_PRIORITY);
    }

    /// Queue a message for delivery. Lower `priority` values are
    /// attempted first (ignored in FIFO mode).
    pub fn send_with_priority(&self, message: Message, priority: i32) {
        self.inner.submit(message, priority);
    }

    /// Recover messages persisted by a previous run.
    ///
    /// Call once when the application is ready. A missing backup is a
    /// normal first run, and an unreadable one degrades to an empty
    /// recovery. The backup is deleted once loaded so a later crash
    /// cannot replay it twice. Recovered messages re-enter through the
    /// ordinary send path, staggered by the configured delay.
    ///
    /// Returns the number of recovered messages.
    pub async fn load_unsent(&self) -> usize {
        let messages = match self.inner.store.load().await {
            Ok(messages) => messages,
            Err(err) => {
                warn!(
                    error = %err,
                    "could not load unsent message backup, starting empty"
                );
                return 0;
            }
        };

        if let Err(err) = self.inner.store.clear().await {
            warn!(error = %err, "could not remove unsent message backup after load");
        }

        if messages.is_empty() {
            debug!("no unsent messages to recover");
            return 0;
        }

        let count = messages.len();
        internal!(level = DEBUG, "Recovered {count} unsent messages from backup");

        let stagger = self.inner.config.recovery_stagger();
        for (index, stored) in messages.into_iter().enumerate() {
            let inner = Arc::clone(&self.inner);
            let step = u32::try_from(index + 1).unwrap_or(u32::MAX);
            let delay = stagger.saturating_mul(step);
            let SpooledMessage { priority, message } = stored;

            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                inner.submit(message, priority);
            });
        }

        count
    }

    /// Persist everything not yet delivered.
    ///
    /// Call on application shutdown, after producers have stopped.
    /// Collects the in-flight message (observed, not interrupted),
    /// then the queue, then the error backlog. A persistence failure
    /// is logged and swallowed.
    ///
    /// Returns the number of messages handed to the backing store.
    pub async fn save_unsent(&self) -> usize {
        let mut unsent: Vec<SpooledMessage> = Vec::new();

        // hold the slot lock across the queue drain: the worker moves a
        // message from the queue into the slot under this lock, so a
        // split snapshot could miss it in both places (lock order
        // slot-then-queue matches the worker, no deadlock)
        {
            let slot = self.inner.in_flight.lock();
            if let Some(entry) = slot.as_ref() {
                unsent.push(SpooledMessage {
                    priority: entry.priority,
                    message: entry.message.clone(),
                });
            }

            for entry in self.inner.queue.drain() {
                unsent.push(SpooledMessage {
                    priority: entry.priority,
                    message: entry.message,
                });
            }
        }

        // failed messages get one more chance on the next start
        for failed in self.inner.errors.drain() {
            unsent.push(SpooledMessage {
                priority: failed.entry.priority,
                message: failed.entry.message,
            });
        }

        let count = unsent.len();
        if count == 0 {
            if let Err(err) = self.inner.store.clear().await {
                warn!(error = %err, "could not remove stale unsent message backup");
            }
            return 0;
        }

        internal!(level = DEBUG, "Saving {count} unsent messages to backup");
        if let Err(err) = self.inner.store.save(&unsent).await {
            warn!(
                error = %err,
                "could not persist unsent messages, they will be lost"
            );
        }

        count
    }

    /// Wait until nothing is queued, in flight or scheduled.
    ///
    /// Useful for hosts that want to drain the queue before stopping,
    /// and for tests.
    pub async fn wait_until_idle(&self) {
        while !self.inner.idle() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Number of messages waiting in the queue.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.queue.len()
    }

    /// The message currently being handed to the transport, if any.
    #[must_use]
    pub fn in_flight(&self) -> Option<Message> {
        self.inner
            .in_flight
            .lock()
            .as_ref()
            .map(|entry| entry.message.clone())
    }

    /// Number of non-transiently failed messages awaiting shutdown
    /// persistence.
    #[must_use]
    pub fn failed_len(&self) -> usize {
        self.inner.errors.len()
    }
}
