//! C1 — Channel Registry.
//!
//! Grounded on `other_examples`'s `radudiaconu0-sockudo` fork's
//! `memory_channel_manager.rs` (plain create-on-first-subscribe,
//! remove-on-empty, `DashMap`-backed subscriber sets) and sockudo's own
//! `Namespace`/`LocalAdapter` split between "mutate the registry" and
//! "snapshot + fan out" (`adapter/local_adapter.rs`).

use crate::socket::SocketId;
use dashmap::DashMap;

/// `channel → subscriber set`. Creates a channel entry on first subscribe,
/// removes it the moment its subscriber set becomes empty — no empty
/// channel is ever observable externally (P2).
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, dashmap::DashSet<SocketId>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: adding an already-present id is a no-op. Returns `true`
    /// if the id was newly added.
    pub fn subscribe(&self, channel: &str, conn_id: &SocketId) -> bool {
        let entry = self
            .channels
            .entry(channel.to_string())
            .or_insert_with(dashmap::DashSet::new);
        entry.insert(conn_id.clone())
    }

    /// No-op if absent. Removes the channel entry once its subscriber set
    /// becomes empty. Returns `true` if the id was present.
    pub fn unsubscribe(&self, channel: &str, conn_id: &SocketId) -> bool {
        let Some(set) = self.channels.get(channel) else {
            return false;
        };
        let was_present = set.remove(conn_id).is_some();
        let now_empty = set.is_empty();
        drop(set);
        if now_empty {
            // Re-check under the map's own entry lock before removing:
            // another subscribe() may have raced in between.
            self.channels
                .remove_if(channel, |_, subscribers| subscribers.is_empty());
        }
        was_present
    }

    /// Snapshot suitable for iteration without holding the registry lock
    /// during fan-out.
    pub fn subscribers(&self, channel: &str) -> Vec<SocketId> {
        self.channels
            .get(channel)
            .map(|set| set.iter().map(|e| e.key().clone()).collect())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map(|set| set.len()).unwrap_or(0)
    }

    pub fn is_subscribed(&self, channel: &str, conn_id: &SocketId) -> bool {
        self.channels
            .get(channel)
            .map(|set| set.contains(conn_id))
            .unwrap_or(false)
    }

    /// Number of live channels (for stats / `count()`).
    pub fn count(&self) -> usize {
        self.channels.len()
    }

    /// Snapshot of currently-live channel names (for stats breakdowns).
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|e| e.key().clone()).collect()
    }
}
