use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use postbox_common::{Message, internal};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{Result, SerializationError};

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

/// Default backup filename, relative to the working directory.
pub const DEFAULT_SPOOL_FILE: &str = "unsent-messages.bin";

/// A message awaiting delivery, paired with its submission priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpooledMessage {
    /// Submission priority; lower is more urgent.
    pub priority: i32,
    /// The message itself.
    pub message: Message,
}

/// Serialized container written to disk.
///
/// Versioned so the [`Message`] shape can change across deployments
/// without silently misreading an old backup.
#[derive(Debug, Serialize, Deserialize)]
struct SpoolFile {
    version: u32,
    messages: Vec<SpooledMessage>,
}

/// Persistence boundary for unsent messages.
///
/// Used only at startup (recovery) and shutdown (drain); the delivery
/// hot path never touches it.
#[async_trait]
pub trait BackingStore: Send + Sync + std::fmt::Debug {
    /// Replace the stored collection with `messages`.
    ///
    /// # Errors
    /// If the collection cannot be written.
    async fn save(&self, messages: &[SpooledMessage]) -> Result<()>;

    /// Read the stored collection. A store that was never written
    /// reads as empty.
    ///
    /// # Errors
    /// If the store exists but cannot be read or decoded.
    async fn load(&self) -> Result<Vec<SpooledMessage>>;

    /// Discard the stored collection, if any.
    ///
    /// # Errors
    /// If the store exists but cannot be removed.
    async fn clear(&self) -> Result<()>;
}

/// File-based backing store.
///
/// The whole collection lives in a single file, bincode-encoded. Writes
/// go to a `.tmp` sibling first and are then renamed into place, so a
/// crash mid-write never leaves a half-written backup where the next
/// startup would find it.
#[derive(Debug, Clone)]
pub struct FileBackingStore {
    path: PathBuf,
}

impl Default for FileBackingStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SPOOL_FILE),
        }
    }
}

impl FileBackingStore {
    /// Create a store backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backup file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl BackingStore for FileBackingStore {
    async fn save(&self, messages: &[SpooledMessage]) -> Result<()> {
        if messages.is_empty() {
            // a stale backup would double-deliver on the next start
            return self.clear().await;
        }

        let file = SpoolFile {
            version: FORMAT_VERSION,
            messages: messages.to_vec(),
        };
        let encoded = bincode::serde::encode_to_vec(&file, bincode::config::standard())
            .map_err(SerializationError::from)?;

        let tmp = self.tmp_path();
        fs::write(&tmp, &encoded).await?;
        fs::rename(&tmp, &self.path).await?;

        internal!(
            level = DEBUG,
            "Saved {} unsent messages to {}",
            file.messages.len(),
            self.path.display()
        );

        Ok(())
    }

    async fn load(&self) -> Result<Vec<SpooledMessage>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let (file, _): (SpoolFile, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(SerializationError::from)?;

        if file.version != FORMAT_VERSION {
            return Err(SerializationError::UnsupportedVersion(file.version).into());
        }

        internal!(
            level = DEBUG,
            "Loaded {} unsent messages from {}",
            file.messages.len(),
            self.path.display()
        );

        Ok(file.messages)
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory backing store.
///
/// Primarily for tests; also usable where losing queued mail across a
/// restart is acceptable. Clones share the same underlying storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackingStore {
    messages: Arc<Mutex<Vec<SpooledMessage>>>,
}

impl MemoryBackingStore {
    /// Create a new empty memory-backed store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages currently stored.
    ///
    /// Recovers gracefully if the lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BackingStore for MemoryBackingStore {
    async fn save(&self, messages: &[SpooledMessage]) -> Result<()> {
        *self.messages.lock()? = messages.to_vec();
        Ok(())
    }

    async fn load(&self) -> Result<Vec<SpooledMessage>> {
        Ok(self.messages.lock()?.clone())
    }

    async fn clear(&self) -> Result<()> {
        self.messages.lock()?.clear();
        Ok(())
    }
}
