//! The shared same-origin context behind a set of sessions.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::bus::ChannelFrame;
use crate::storage::{MemoryBackend, StorageBackend, StorageEvent};
use uuid::Uuid;

/// Transport channel capacity. A slow subscriber past this many undelivered
/// messages observes a lag error and skips ahead; delivery is best-effort.
const TRANSPORT_CAPACITY: usize = 64;

/// The shared context every session of one logical browser profile attaches
/// to: a key-value backend plus the two notification transports (the direct
/// message channel and the storage-event channel).
///
/// `Clone` is cheap: all internal state is `Arc`-wrapped or a channel handle.
/// Sessions sharing a clone of the same `Profile` see each other's writes
/// and notifications; sessions on different profiles are fully isolated.
#[derive(Clone)]
pub struct Profile {
    backend: Arc<dyn StorageBackend>,
    pub(crate) channel: broadcast::Sender<ChannelFrame>,
    pub(crate) storage_events: broadcast::Sender<StorageEvent>,
}

// Manual `Debug` because `dyn StorageBackend` is not `Debug` and channel
// internals are noise.
impl std::fmt::Debug for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Profile")
            .field("subscribers", &self.channel.receiver_count())
            .finish()
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

impl Profile {
    /// Create a profile over a fresh in-memory backend.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()))
    }

    /// Create a profile over an existing backend, e.g. a
    /// [`FileBackend`](crate::storage::FileBackend) for state that survives
    /// restarts.
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        let (channel, _) = broadcast::channel(TRANSPORT_CAPACITY);
        let (storage_events, _) = broadcast::channel(TRANSPORT_CAPACITY);
        Self {
            backend,
            channel,
            storage_events,
        }
    }

    /// The raw key-value backend shared by all sessions of this profile.
    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Subscribe to raw storage events. Used by the notification bus; tests
    /// use it to observe transport activity directly.
    pub fn subscribe_storage_events(&self) -> broadcast::Receiver<StorageEvent> {
        self.storage_events.subscribe()
    }

    pub(crate) fn emit_storage_event(&self, key: &str, new_value: &str, writer: Uuid) {
        // No subscribers is not an error; events are fire-and-forget.
        let _ = self.storage_events.send(StorageEvent {
            key: key.to_owned(),
            new_value: new_value.to_owned(),
            writer,
        });
    }
}
