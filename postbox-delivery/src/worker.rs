//! The delivery worker cycle.

use tracing::{debug, warn};

use crate::{error::DeliveryError, manager::ManagerInner};

/// Drain the queue, one message at a time.
///
/// Runs until the queue is empty and nothing is in flight. The cycle is
/// never cancelled mid-message; a shutdown drain persists whatever
/// state remains instead of interrupting the current attempt.
pub(crate) async fn run_cycle(inner: &ManagerInner) {
    loop {
        let entry = {
            let mut slot = inner.in_flight.lock();
            if slot.is_some() {
                // another cycle already owns the current message
                break;
            }
            let Some(entry) = inner.queue.dequeue() else {
                break;
            };
            *slot = Some(entry.clone());
            entry
        };

        let recipients = entry.message.recipients().join(", ");
        debug!(
            recipients,
            subject = entry.message.subject(),
            attempt = entry.attempts + 1,
            pending = inner.queue.len(),
            "sending message"
        );

        let timeout = inner.config.send_timeout();
        match tokio::time::timeout(timeout, inner.transport.send(&entry.message)).await {
            Ok(Ok(())) => {
                inner.in_flight.lock().take();
                debug!(recipients, "message dispatched");
                // let other tasks run between sends
                tokio::task::yield_now().await;
            }
            Err(_elapsed) => {
                // the timeout disarmed itself by dropping the send future;
                // the transport connection is simply abandoned
                let Some(mut entry) = inner.in_flight.lock().take() else {
                    continue;
                };
                entry.attempts += 1;
                if inner.config.retry.should_retry(entry.attempts) {
                    debug!(
                        subject = entry.message.subject(),
                        attempts = entry.attempts,
                        "send took too long, requeueing"
                    );
                    inner.queue.requeue(entry);
                } else {
                    warn!(
                        subject = entry.message.subject(),
                        attempts = entry.attempts,
                        "send took too long and retries are exhausted, parking message"
                    );
                    inner.errors.push(DeliveryError::Timeout(timeout), entry);
                }
            }
            Ok(Err(err)) => {
                let Some(mut entry) = inner.in_flight.lock().take() else {
                    continue;
                };
                entry.attempts += 1;
                warn!(
                    subject = entry.message.subject(),
                    error = %err,
                    "transport failed, parking message until shutdown persistence"
                );
                inner.errors.push(err.into(), entry);
            }
        }
    }
}
