//! Priority-ordered, at-least-once delivery queue for outbound mail.
//!
//! Application code hands a [`Message`](postbox_common::Message) to the
//! [`DeliveryManager`] and a single worker cycle drains the queue in
//! the background. Each transport call is bounded by a timeout;
//! transient failures are requeued and everything else is parked for
//! shutdown-time persistence. On a clean shutdown the manager writes
//! whatever is still unsent to a
//! [`BackingStore`](postbox_spool::BackingStore) and reloads it on the
//! next start.
//!
//! Delivery is at-least-once. A send abandoned by the timeout may still
//! complete in the background, so duplicates are possible and accepted.

pub mod backlog;
pub mod config;
pub mod error;
pub mod manager;
pub mod queue;
pub mod retry;
pub mod transport;

mod worker;

pub use backlog::{ErrorBacklog, FailedDelivery};
pub use config::DeliveryConfig;
pub use error::{DeliveryError, TransportError};
pub use manager::DeliveryManager;
pub use queue::{DeliveryQueue, QueueEntry, QueueOrder};
pub use retry::RetryPolicy;
pub use transport::{MockTransport, SendOutcome, Transport};
