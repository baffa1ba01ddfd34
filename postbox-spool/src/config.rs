use std::{path::PathBuf, sync::Arc};

use serde::Deserialize;

use crate::store::{BackingStore, DEFAULT_SPOOL_FILE, FileBackingStore, MemoryBackingStore};

fn default_spool_path() -> PathBuf {
    PathBuf::from(DEFAULT_SPOOL_FILE)
}

/// Backing store selection, deserializable from host configuration.
///
/// ```json
/// { "type": "file", "path": "/var/lib/app/unsent-messages.bin" }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SpoolConfig {
    /// File-backed store (production).
    File {
        /// Backup file path.
        #[serde(default = "default_spool_path")]
        path: PathBuf,
    },
    /// Memory-backed store (tests, transient setups).
    Memory,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self::File {
            path: default_spool_path(),
        }
    }
}

impl SpoolConfig {
    /// Convert the configuration into a concrete backing store.
    #[must_use]
    pub fn into_backing_store(self) -> Arc<dyn BackingStore> {
        match self {
            Self::File { path } => Arc::new(FileBackingStore::new(path)),
            Self::Memory => Arc::new(MemoryBackingStore::new()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_file_backed() {
        assert!(matches!(
            SpoolConfig::default(),
            SpoolConfig::File { path } if path == default_spool_path()
        ));
    }

    #[test]
    fn test_deserialize_file_config() {
        let config: SpoolConfig =
            serde_json::from_str(r#"{ "type": "file", "path": "/tmp/unsent.bin" }"#)
                .expect("parse");
        assert!(matches!(
            config,
            SpoolConfig::File { path } if path == PathBuf::from("/tmp/unsent.bin")
        ));
    }

    #[test]
    fn test_deserialize_memory_config() {
        let config: SpoolConfig = serde_json::from_str(r#"{ "type": "memory" }"#).expect("parse");
        assert!(matches!(config, SpoolConfig::Memory));
    }

    #[test]
    fn test_file_path_defaults_when_omitted() {
        let config: SpoolConfig = serde_json::from_str(r#"{ "type": "file" }"#).expect("parse");
        assert!(matches!(
            config,
            SpoolConfig::File { path } if path == default_spool_path()
        ));
    }
}
