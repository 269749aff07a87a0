//! C2 — Presence Registry.
//!
//! Grounded on sockudo's `channel/manager.rs` (`PresenceMember`,
//! `parse_presence_data`/`extract_presence_member`) and the
//! `other_examples` `radudiaconu0-sockudo` fork's presence subscriber map
//! (`(SafeConnection, PresenceUser)` keyed by socket id).

use crate::socket::SocketId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceMember {
    pub user_id: String,
    #[serde(default)]
    pub user_info: Value,
}

/// Wire shape for `pusher_internal:subscription_succeeded` /
/// `GET /admin/stats` on a presence channel (spec.md §4.4).
#[derive(Debug, Serialize)]
pub struct PresenceData {
    pub presence: PresenceHash,
}

#[derive(Debug, Serialize)]
pub struct PresenceHash {
    pub count: usize,
    pub hash: HashMap<String, Value>,
}

/// `(presence-channel, connection-id) → member`.
#[derive(Default)]
pub struct PresenceRegistry {
    channels: DashMap<String, DashMap<SocketId, PresenceMember>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, channel: &str, conn_id: SocketId, member: PresenceMember) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(conn_id, member);
    }

    /// Returns the removed member, if any, and garbage-collects the
    /// channel entry once it has no members left.
    pub fn remove_member(&self, channel: &str, conn_id: &SocketId) -> Option<PresenceMember> {
        let Some(members) = self.channels.get(channel) else {
            return None;
        };
        let removed = members.remove(conn_id).map(|(_, m)| m);
        let now_empty = members.is_empty();
        drop(members);
        if now_empty {
            self.channels
                .remove_if(channel, |_, members| members.is_empty());
        }
        removed
    }

    pub fn has_member(&self, channel: &str, conn_id: &SocketId) -> bool {
        self.channels
            .get(channel)
            .map(|members| members.contains_key(conn_id))
            .unwrap_or(false)
    }

    pub fn get_member(&self, channel: &str, conn_id: &SocketId) -> Option<PresenceMember> {
        self.channels
            .get(channel)
            .and_then(|members| members.get(conn_id).map(|m| m.clone()))
    }

    pub fn member_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map(|m| m.len()).unwrap_or(0)
    }

    /// `{presence: {hash: {user_id → member}, count: N}}` (spec.md §4.4).
    /// `count` is the number of *connection* entries, not distinct
    /// `user_id`s; `hash` is keyed by `user_id` with last-write-wins when
    /// two connections share one (documented, not fixed — spec.md §9).
    pub fn presence_data(&self, channel: &str) -> PresenceData {
        let Some(members) = self.channels.get(channel) else {
            return PresenceData {
                presence: PresenceHash {
                    count: 0,
                    hash: HashMap::new(),
                },
            };
        };
        let count = members.len();
        let mut hash = HashMap::with_capacity(count);
        for entry in members.iter() {
            hash.insert(entry.value().user_id.clone(), entry.value().user_info.clone());
        }
        PresenceData {
            presence: PresenceHash { count, hash },
        }
    }
}
