//! Best-effort cross-session notification fan-out.
//!
//! One logical event is announced over two redundant transports: a direct
//! broadcast channel and a relay record written to storage (observed by the
//! other sessions as a storage event). Either transport may drop or
//! duplicate a delivery, and neither loops a message back to its sender.
//! Receivers must treat every delivery as an idempotent cue to re-read
//! authoritative storage state, never as the payload of record.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::profile::Profile;
use crate::storage::{StorageAdapter, StorageEvent, epoch_millis, keys};

/// A minimal "something changed" tag. The payload deliberately carries no
/// data: receivers re-read the corresponding store on receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationMessage {
    /// The order sequence changed; re-read the order store.
    OrdersUpdated,
    /// The draft mapping changed; re-read the draft store.
    DraftsUpdated,
}

/// Frame posted on the direct channel transport. The sender id lets
/// subscribers drop their own messages, since the channel itself delivers
/// to every subscriber including the origin.
#[derive(Debug, Clone)]
pub(crate) struct ChannelFrame {
    pub(crate) sender: Uuid,
    pub(crate) msg: NotificationMessage,
}

/// Payload written to the `notify-relay` key for the fallback transport.
///
/// `t` and `rnd` are refreshed on every call so that consecutive identical
/// messages still produce a distinct stored value, defeating any
/// change-detection dedup between writer and observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayRecord {
    /// The actual message, nested: consumers of the relay key must unwrap it.
    pub msg: NotificationMessage,
    /// Milliseconds since the Unix epoch at send time.
    pub t: u64,
    /// Random nonce, fresh per call.
    pub rnd: u64,
}

/// Dual-transport notifier bound to one session.
///
/// `Clone` is cheap; clones share the session identity and transports.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    profile: Profile,
    adapter: StorageAdapter,
    tab_id: Uuid,
}

impl NotificationBus {
    pub(crate) fn new(profile: Profile, adapter: StorageAdapter, tab_id: Uuid) -> Self {
        Self {
            profile,
            adapter,
            tab_id,
        }
    }

    /// Announce `msg` to every other session, best-effort.
    ///
    /// Both transports are invoked unconditionally: a frame on the direct
    /// channel and a fresh [`RelayRecord`] under the relay key. Transport
    /// failure never reaches the caller; the triggering mutation has
    /// already been persisted independently of notification success.
    pub fn notify(&self, msg: NotificationMessage) {
        let frame = ChannelFrame {
            sender: self.tab_id,
            msg,
        };
        if self.profile.channel.send(frame).is_err() {
            // No live subscribers; nothing to deliver on this transport.
            tracing::debug!(?msg, "channel transport has no subscribers");
        }

        // Storage failures are contained inside the adapter.
        self.adapter.write(
            keys::NOTIFY_RELAY,
            &RelayRecord {
                msg,
                t: epoch_millis(),
                rnd: Uuid::new_v4().as_u128() as u64,
            },
        );
    }

    /// Register this session as a listener on both transports.
    pub fn subscribe(&self) -> BusSubscription {
        BusSubscription {
            tab_id: self.tab_id,
            frames: self.profile.channel.subscribe(),
            events: self.profile.subscribe_storage_events(),
        }
    }
}

/// A session's listening end of the notification bus.
///
/// Merges both transports into one stream of messages, dropping deliveries
/// that originated from the owning session itself. One logical event may
/// surface as several equivalent messages (both transports fire
/// independently) or none at all; callers re-render from storage on every
/// receipt, so duplicates are no-ops.
#[derive(Debug)]
pub struct BusSubscription {
    tab_id: Uuid,
    frames: broadcast::Receiver<ChannelFrame>,
    events: broadcast::Receiver<StorageEvent>,
}

impl BusSubscription {
    /// Wait for the next foreign notification.
    ///
    /// # Returns
    ///
    /// The next message from either transport, or `None` once the profile
    /// (and with it both transports) has been dropped. A lagged receiver
    /// skips ahead and keeps listening; the missed cues are redundant as
    /// long as one later delivery arrives.
    pub async fn recv(&mut self) -> Option<NotificationMessage> {
        loop {
            tokio::select! {
                frame = self.frames.recv() => match frame {
                    Ok(frame) if frame.sender == self.tab_id => continue,
                    Ok(frame) => return Some(frame.msg),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "channel transport lagged; skipping ahead");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                event = self.events.recv() => match event {
                    Ok(event) => {
                        if let Some(msg) = self.decode_storage_event(&event) {
                            return Some(msg);
                        }
                        continue;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "storage transport lagged; skipping ahead");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Interpret a raw storage event as a notification, if it is one.
    ///
    /// Events written by this session are invisible, matching the DOM
    /// `storage` event contract. A foreign write to the relay key carries a
    /// nested [`RelayRecord`]; a foreign write to the orders key is itself
    /// taken as an orders cue, a redundancy the original listener also had.
    fn decode_storage_event(&self, event: &StorageEvent) -> Option<NotificationMessage> {
        if event.writer == self.tab_id {
            return None;
        }
        match event.key.as_str() {
            keys::NOTIFY_RELAY => match serde_json::from_str::<RelayRecord>(&event.new_value) {
                Ok(record) => Some(record.msg),
                Err(e) => {
                    tracing::debug!(error = %e, "unreadable relay record ignored");
                    None
                }
            },
            keys::ORDERS => Some(NotificationMessage::OrdersUpdated),
            _ => None,
        }
    }
}
