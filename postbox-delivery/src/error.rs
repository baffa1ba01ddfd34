//! Typed errors for delivery operations.

use std::{io, time::Duration};

use thiserror::Error;

/// Failures reported by the transport collaborator.
///
/// Every variant is treated as non-transient for the current cycle:
/// the message moves to the error backlog and is retried, if at all,
/// only after the next process start.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach the mail server.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server rejected the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How a delivery attempt concluded without success.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The transport did not answer in time; the wait was abandoned.
    /// Transient: the message is requeued up to the retry cap.
    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    /// The transport reported a failure.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}
