//! Durable backing store for not-yet-delivered messages.
//!
//! The store is touched only at the process boundaries: a shutdown
//! drain writes the set of unsent messages to a local file, and the
//! next startup reads it back so queued mail survives a restart.

pub mod config;
pub mod error;
pub mod store;

pub use config::SpoolConfig;
pub use error::{Result, SerializationError, SpoolError};
pub use store::{BackingStore, FileBackingStore, MemoryBackingStore, SpooledMessage};
