//! Snapshot storage.
//!
//! The snapshot maps every watched URL to the last content observed for it
//! (after extraction and replacements), plus the start time of the last run.
//!
//! ```text
//! {
//!   "last_run": "2026-10-19T06:00:00Z",
//!   "websites": {
//!     "https://example.com/": "3c6d61696e3e...",   # hex encoded bytes
//!     ...
//!   }
//! }
//! ```
//!
//! [`SnapshotStore`] keeps the mapping in memory behind a mutex so that
//! concurrent watch tasks can read and write their own keys, and hands the
//! whole document to a [`SnapshotBackend`] when the run is finished.

pub mod local;

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use local::LocalStorage;

/// Persisted snapshot document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Start time of the last completed run
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,

    /// URL to last observed content
    #[serde(default, with = "hex_content")]
    pub websites: BTreeMap<String, Vec<u8>>,
}

/// Trait for snapshot persistence backends.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Load the stored snapshot; a missing snapshot is empty, not an error.
    async fn load(&self) -> Result<SnapshotData>;

    /// Persist the snapshot, replacing the previous one.
    async fn save(&self, data: &SnapshotData) -> Result<()>;

    /// Human readable location for logs.
    fn location(&self) -> String;
}

/// Thread-safe in-memory snapshot bound to a backend.
pub struct SnapshotStore {
    data: Mutex<SnapshotData>,
    backend: Arc<dyn SnapshotBackend>,
}

impl SnapshotStore {
    /// Load the snapshot from `backend`.
    pub async fn open(backend: Arc<dyn SnapshotBackend>) -> Result<Self> {
        let data = backend.load().await?;
        log::debug!(
            "loaded {} snapshot entries from {}",
            data.websites.len(),
            backend.location()
        );
        Ok(Self::with_data(backend, data))
    }

    /// Wrap already loaded data.
    pub fn with_data(backend: Arc<dyn SnapshotBackend>, data: SnapshotData) -> Self {
        Self {
            data: Mutex::new(data),
            backend,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SnapshotData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last stored content for `key`, if it was ever observed.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().websites.get(key).cloned()
    }

    /// Store `content` for `key`.
    pub fn set(&self, key: &str, content: Vec<u8>) {
        self.lock().websites.insert(key.to_string(), content);
    }

    /// Remove entries whose key is not in `current_keys`, returning them.
    pub fn cleanup(&self, current_keys: &HashSet<String>) -> Vec<String> {
        let mut data = self.lock();
        let stale: Vec<String> = data
            .websites
            .keys()
            .filter(|key| !current_keys.contains(*key))
            .cloned()
            .collect();
        for key in &stale {
            log::info!("removing {} from snapshot database", key);
            data.websites.remove(key);
        }
        stale
    }

    pub fn set_last_run(&self, timestamp: DateTime<Utc>) {
        self.lock().last_run = Some(timestamp);
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.lock().last_run
    }

    pub fn len(&self) -> usize {
        self.lock().websites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().websites.is_empty()
    }

    /// Copy of the current document.
    pub fn data(&self) -> SnapshotData {
        self.lock().clone()
    }

    /// Persist the current document through the backend.
    pub async fn save(&self) -> Result<()> {
        // Copy first so the lock is never held across the write.
        let data = self.data();
        self.backend.save(&data).await?;
        log::info!(
            "saved {} snapshot entries to {}",
            data.websites.len(),
            self.backend.location()
        );
        Ok(())
    }
}

/// Serde adapter storing content bytes as hex strings.
mod hex_content {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        map.iter()
            .map(|(key, content)| (key, hex::encode(content)))
            .collect::<BTreeMap<_, _>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, Vec<u8>>, D::Error> {
        BTreeMap::<String, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, encoded)| {
                hex::decode(&encoded)
                    .map(|content| (key.clone(), content))
                    .map_err(|e| D::Error::custom(format!("invalid content for {key}: {e}")))
            })
            .collect()
    }
}
