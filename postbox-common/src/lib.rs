pub mod logging;
pub mod message;

pub use message::{DEFAULT_PRIORITY, Message, MessageError};

pub use tracing;
