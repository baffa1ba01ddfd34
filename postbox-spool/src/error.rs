//! Error types for spool operations.

use std::io;

use thiserror::Error;

/// Top-level spool error type.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// I/O operation failed (file read/write/delete).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Internal error (lock poisoning, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Serialization and deserialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Bincode serialization failed.
    #[error("encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Bincode deserialization failed (corrupted or truncated data).
    #[error("decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// The file was written by an incompatible version of this crate.
    #[error("unsupported spool format version {0}")]
    UnsupportedVersion(u32),
}

/// Specialized `Result` type for spool operations.
pub type Result<T> = std::result::Result<T, SpoolError>;

// Convenience conversion for lock poisoning
impl<T> From<std::sync::PoisonError<T>> for SpoolError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("lock poisoned: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let spool_err: SpoolError = io_err.into();
        assert!(matches!(spool_err, SpoolError::Io(_)));
    }

    #[test]
    fn test_error_chain() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let spool_err = SpoolError::from(io_err);

        assert!(matches!(spool_err, SpoolError::Io(_)));
        assert!(spool_err.to_string().contains("access denied"));
    }

    #[test]
    fn test_unsupported_version_display() {
        let err = SpoolError::from(SerializationError::UnsupportedVersion(9));
        assert!(err.to_string().contains("version 9"));
    }
}
