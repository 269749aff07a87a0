//! C9 — composition root.
//!
//! Grounded on sockudo's `app/factory.rs` (a single constructor wiring up
//! the manager, adapter, and rate limiter behind one `Arc`) collapsed to a
//! plain struct: this spec has no pluggable backends, so there's nothing
//! left to select between at startup.

use crate::channel::registry::ChannelRegistry;
use crate::config::ServerOptions;
use crate::presence::PresenceRegistry;
use crate::protocol::Envelope;
use crate::rate_limiter::AdmissionLimiter;
use crate::socket::SocketId;
use crate::token::Token;
use crate::ws::ConnectionHandle;
use dashmap::DashMap;
use serde::Serialize;

/// Everything a connection, the HTTP surface, and the background sweeper
/// all need a shared handle to. Constructed once in `main` and handed
/// around as `Arc<Engine>`.
pub struct Engine {
    pub connections: DashMap<SocketId, ConnectionHandle>,
    pub channels: ChannelRegistry,
    pub presence: PresenceRegistry,
    pub limiter: std::sync::Arc<AdmissionLimiter>,
    pub token: Token,
    pub options: ServerOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub connections: usize,
    pub channels: usize,
    pub presence_channels: usize,
}

/// Read-only view handed to the HTTP layer (spec.md §9: "replace singleton
/// HTTP/WS coupling with a read-only stats interface passed into the HTTP
/// layer") so `/health` and `/admin/stats` can't reach engine internals
/// they have no business touching (the connection table, the limiter).
pub trait StatsSource: Send + Sync {
    fn stats(&self) -> Stats;
}

impl StatsSource for Engine {
    fn stats(&self) -> Stats {
        Engine::stats(self)
    }
}

impl Engine {
    pub fn new(options: ServerOptions) -> Self {
        let token = Token::new(options.auth_secret.clone());
        let limiter = std::sync::Arc::new(AdmissionLimiter::new(
            options.connection_limit_per_ip,
            options.message_rate_limit,
            options.message_rate_window_ms,
        ));
        Self {
            connections: DashMap::new(),
            channels: ChannelRegistry::new(),
            presence: PresenceRegistry::new(),
            limiter,
            token,
            options,
        }
    }

    /// Fan out `envelope` to every current subscriber of `channel` except
    /// `exclude`. Used for `member_added`/`member_removed`, which must not
    /// echo back to the connection that triggered them.
    pub fn broadcast_except(&self, channel: &str, exclude: &SocketId, envelope: Envelope) {
        let bytes = bytes::Bytes::from(envelope.encode());
        for id in self.channels.subscribers(channel) {
            if &id == exclude {
                continue;
            }
            if let Some(handle) = self.connections.get(&id) {
                handle.send_bytes(bytes.clone());
            }
        }
    }

    /// Fan out `envelope` to every current subscriber of `channel`,
    /// including the sender (spec.md §4.6.5 client events, §4.6.7 server
    /// events).
    pub fn broadcast_all(&self, channel: &str, envelope: Envelope) {
        let bytes = bytes::Bytes::from(envelope.encode());
        for id in self.channels.subscribers(channel) {
            if let Some(handle) = self.connections.get(&id) {
                handle.send_bytes(bytes.clone());
            }
        }
    }

    /// §4.6.7: server-to-clients broadcast over the admin/trigger surface,
    /// re-using the same raw-passthrough envelope client events use.
    pub fn broadcast_server_event(
        &self,
        channel: &str,
        event: &str,
        data: Box<serde_json::value::RawValue>,
    ) {
        self.broadcast_all(channel, Envelope::broadcast(event, channel, data));
    }

    pub fn stats(&self) -> Stats {
        Stats {
            connections: self.connections.len(),
            channels: self.channels.count(),
            presence_channels: self.presence_channel_count(),
        }
    }

    fn presence_channel_count(&self) -> usize {
        self.channels
            .channel_names()
            .into_iter()
            .filter(|name| crate::channel::classify(name) == crate::channel::ChannelType::Presence)
            .count()
    }
}

/// Close every connection currently open (spec.md §4.6.8 graceful
/// shutdown): code 1001, "Server shutting down".
pub fn close_all(engine: &Engine, code: u16, reason: &'static str) {
    for entry in engine.connections.iter() {
        entry.value().close(code, reason);
    }
}
