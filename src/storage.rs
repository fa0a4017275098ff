//! Storage backends and the JSON storage adapter.
//!
//! Every shared collection is persisted as a whole JSON value under a single
//! key; there is no append or patch primitive. Readers must tolerate a
//! missing or corrupt value by falling back to a default, and writers are
//! best-effort: a storage outage degrades sync fidelity but never crashes
//! the caller.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::profile::Profile;

/// Storage keys shared by every session of a profile.
///
/// One key per logical collection; each write replaces the whole value.
pub mod keys {
    /// Ordered sequence of submitted orders, newest first.
    pub const ORDERS: &str = "orders";
    /// Cached product catalog written by the menu loader.
    pub const PRODUCTS: &str = "products";
    /// The current session's cart lines.
    pub const CART: &str = "cart";
    /// Mapping from client identity to in-progress draft.
    pub const DRAFTS: &str = "drafts";
    /// This session's stable client identity token.
    pub const CLIENT_ID: &str = "client-id";
    /// Relay record for the fallback notification transport.
    pub const NOTIFY_RELAY: &str = "notify-relay";
}

/// Milliseconds since the Unix epoch.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::UNIX_EPOCH
        .elapsed()
        .expect("system clock is before Unix epoch")
        .as_millis() as u64
}

/// A synchronous raw key-value store shared by every session of a profile.
///
/// Implementations persist whole string values per key. Errors are surfaced
/// as `io::Error` and contained one layer up, in [`StorageAdapter`].
pub trait StorageBackend: Send + Sync {
    /// Returns the raw value for `key`, or `None` if the key is absent.
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    /// Replaces the value for `key`.
    fn set(&self, key: &str, value: &str) -> io::Result<()>;
}

/// In-memory backend: a live profile shared by concurrently open sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned lock only means another thread panicked mid-access;
        // the map itself is still a plain string table.
        match self.map.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// File-backed backend: a profile that survives restarts.
///
/// Each key is stored as `<base_dir>/<key>.json`. Writes go through a
/// temp-then-rename so readers never observe a partially written value.
#[derive(Debug)]
pub struct FileBackend {
    base_dir: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `base_dir`. The directory is created
    /// lazily on first write.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.key_path(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        let path = self.key_path(key);
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, value)?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

/// Fired on the profile's storage-event channel after every successful write.
///
/// Mirrors the DOM `storage` event contract: carries the key and the new
/// raw value, and is only meaningful to sessions *other than* the writer
/// (subscribers filter on `writer`).
#[derive(Debug, Clone)]
pub struct StorageEvent {
    /// The key that was written.
    pub key: String,
    /// The raw JSON value that was written.
    pub new_value: String,
    /// The session that performed the write.
    pub writer: Uuid,
}

/// Per-session handle over the profile's backend with JSON encode/decode
/// and total failure containment.
///
/// [`read`](StorageAdapter::read) never fails and [`write`](StorageAdapter::write)
/// never propagates: a full store outage degrades to defaults and dropped
/// writes, logged but invisible to callers.
#[derive(Debug, Clone)]
pub struct StorageAdapter {
    profile: Profile,
    tab_id: Uuid,
}

impl StorageAdapter {
    pub(crate) fn new(profile: Profile, tab_id: Uuid) -> Self {
        Self { profile, tab_id }
    }

    /// Read and decode the value under `key`.
    ///
    /// # Returns
    ///
    /// The decoded value, or `default` when the key is absent, the backend
    /// fails, or the stored JSON is malformed. Failures are logged via
    /// `tracing::warn!` and never surfaced.
    pub fn read<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let raw = match self.profile.backend().get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return default,
            Err(e) => {
                tracing::warn!(key, error = %e, "storage read failed; using default");
                return default;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "malformed JSON in storage; using default");
                default
            }
        }
    }

    /// Encode `value` as JSON and persist it under `key`, best-effort.
    ///
    /// On success, a [`StorageEvent`] is emitted to the other sessions of
    /// the profile. On failure (serialization or backend), the write is
    /// dropped and logged via `tracing::error!`.
    pub fn write<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(key, error = %e, "failed to serialize value; write dropped");
                return;
            }
        };

        if let Err(e) = self.profile.backend().set(key, &json) {
            tracing::error!(key, error = %e, "storage write failed; write dropped");
            return;
        }

        self.profile.emit_storage_event(key, &json, self.tab_id);
    }
}
