//! C3 — Rate / Admission Limiter.
//!
//! Grounded on sockudo's `rate_limiter/redis_limiter.rs` (the
//! `RateLimitConfig`/`check`/`increment`/`reset` shape, windowed counting)
//! reimplemented over `DashMap` instead of Redis — this spec's engine is
//! in-process only — plus `cleanup/mod.rs`'s background-worker-task
//! pattern for the periodic sweep.

use crate::socket::SocketId;
use dashmap::DashMap;
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

struct MessageWindow {
    count: u32,
    window_start_ms: u64,
}

/// C3: per-IP connection caps and per-connection message rate. The
/// per-connection channel cap (spec.md §4.5) needs no state here — it's
/// checked inline by the subscribe handler against
/// `connection.subscribed_channels.len()`.
pub struct AdmissionLimiter {
    connection_limit_per_ip: usize,
    message_rate_limit: u32,
    message_rate_window_ms: u64,
    ip_connections: DashMap<IpAddr, usize>,
    message_windows: DashMap<SocketId, MessageWindow>,
}

impl AdmissionLimiter {
    pub fn new(
        connection_limit_per_ip: usize,
        message_rate_limit: u32,
        message_rate_window_ms: u64,
    ) -> Self {
        Self {
            connection_limit_per_ip,
            message_rate_limit,
            message_rate_window_ms,
            ip_connections: DashMap::new(),
            message_windows: DashMap::new(),
        }
    }

    /// Atomic check-and-increment admission for `ip` (P6): holds the
    /// `DashMap` shard's entry lock across the comparison and the
    /// increment, so two concurrent upgrades from the same IP at
    /// `count == cap - 1` can't both observe room for one and both admit.
    /// Returns `false` (no increment) once `ip` is already at the cap.
    pub fn try_add_connection(&self, ip: IpAddr) -> bool {
        let mut count = self.ip_connections.entry(ip).or_insert(0);
        if *count >= self.connection_limit_per_ip {
            return false;
        }
        *count += 1;
        true
    }

    /// Drops the entry once it reaches zero (P6).
    pub fn remove_connection(&self, ip: IpAddr) {
        let mut remove = false;
        if let Some(mut count) = self.ip_connections.get_mut(&ip) {
            *count = count.saturating_sub(1);
            remove = *count == 0;
        }
        if remove {
            self.ip_connections.remove_if(&ip, |_, c| *c == 0);
        }
    }

    pub fn connection_count(&self, ip: IpAddr) -> usize {
        self.ip_connections.get(&ip).map(|c| *c).unwrap_or(0)
    }

    /// Fixed-window admission check for `conn_id` (spec.md §4.5): starts a
    /// fresh window when none exists or the current one has elapsed,
    /// otherwise increments and admits iff the running count is still
    /// within the cap. Ping frames are charged the same as any other frame
    /// (documented in spec.md §9 as an open question, preserved as-is).
    pub fn can_send_message(&self, conn_id: &SocketId) -> bool {
        let now = now_ms();
        let mut entry = self
            .message_windows
            .entry(conn_id.clone())
            .or_insert_with(|| MessageWindow {
                count: 0,
                window_start_ms: now,
            });

        if now.saturating_sub(entry.window_start_ms) >= self.message_rate_window_ms {
            entry.window_start_ms = now;
            entry.count = 1;
            return true;
        }

        entry.count += 1;
        entry.count <= self.message_rate_limit
    }

    /// Drop the per-connection rate state (called from teardown).
    pub fn remove_connection_rate_state(&self, conn_id: &SocketId) {
        self.message_windows.remove(conn_id);
    }

    /// Best-effort sweep: removes windows that ended more than
    /// `2 * window_ms` ago. Never removes the active window of a live
    /// connection (a connection that hasn't sent a frame in that long has
    /// no "active" window left to protect).
    pub fn sweep(&self) {
        let now = now_ms();
        let stale_after = 2 * self.message_rate_window_ms;
        let before = self.message_windows.len();
        self.message_windows
            .retain(|_, w| now.saturating_sub(w.window_start_ms) <= stale_after);
        let removed = before - self.message_windows.len();
        if removed > 0 {
            debug!(removed, "rate limiter sweep removed stale windows");
        }
    }

    /// Spawn the periodic sweeper as an explicit, cancellable background
    /// task owned by the server's lifetime (spec.md §9 design note) rather
    /// than a module-level timer installed at load time.
    pub fn spawn_sweeper(
        self: std::sync::Arc<Self>,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.sweep(),
                    _ = shutdown.changed() => break,
                }
            }
        })
    }
}
