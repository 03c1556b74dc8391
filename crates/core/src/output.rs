//! Memory-backed, revocable output resources.
//!
//! [`OutputStore`] is the registry that hands out download references for
//! produced audio, the same way a browser hands out object URLs. Bytes stay
//! alive until the reference is revoked, so every reference that is created
//! must eventually be revoked or the memory is held for the whole session.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// MIME type attached to produced MP3 audio.
pub const AUDIO_MPEG: &str = "audio/mpeg";

const REFERENCE_PREFIX: &str = "blob:audora/";

/// A downloadable handle to produced bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputResource {
    /// Opaque reference used to retrieve the bytes from the store.
    pub reference: String,
    /// Suggested download file name.
    pub filename: String,
    /// Size of the content in bytes.
    pub size_bytes: u64,
    /// Content type.
    pub mime: String,
    /// When the resource was created.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct StoredOutput {
    bytes: Arc<[u8]>,
    mime: String,
}

/// Registry of live output resources.
#[derive(Debug, Default)]
pub struct OutputStore {
    entries: RwLock<HashMap<String, StoredOutput>>,
}

impl OutputStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bytes` and returns a new resource pointing at them.
    pub fn create(&self, bytes: Vec<u8>, mime: &str, filename: impl Into<String>) -> OutputResource {
        let reference = format!("{}{}", REFERENCE_PREFIX, Uuid::new_v4());
        let size_bytes = bytes.len() as u64;

        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                reference.clone(),
                StoredOutput {
                    bytes: Arc::from(bytes),
                    mime: mime.to_string(),
                },
            );

        debug!("Created output resource {} ({} bytes)", reference, size_bytes);

        OutputResource {
            reference,
            filename: filename.into(),
            size_bytes,
            mime: mime.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Returns the bytes behind `reference`, if it is still live.
    pub fn get(&self, reference: &str) -> Option<Arc<[u8]>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .map(|entry| Arc::clone(&entry.bytes))
    }

    /// Returns the content type behind `reference`, if it is still live.
    pub fn mime(&self, reference: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .map(|entry| entry.mime.clone())
    }

    /// Releases `reference`. Returns whether anything was released;
    /// revoking an unknown or already revoked reference is a no-op.
    pub fn revoke(&self, reference: &str) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(reference)
            .is_some();
        if removed {
            debug!("Revoked output resource {}", reference);
        }
        removed
    }

    /// Number of live resources.
    pub fn live_count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total bytes held by live resources.
    pub fn live_bytes(&self) -> u64 {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|entry| entry.bytes.len() as u64)
            .sum()
    }
}
