//! Opaque per-connection identifier minted at accept time (spec.md §3:
//! `<unix_ms>.<random>`).

use rand::Rng;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(pub String);

impl SocketId {
    /// Mint a new id, unique for the process lifetime with overwhelming
    /// probability: millisecond timestamp plus a 32-bit random suffix.
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let random: u32 = rand::rng().random();
        SocketId(format!("{millis}.{random}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SocketId {
    fn from(s: String) -> Self {
        SocketId(s)
    }
}
