//! Self-hosted, Pusher-protocol-compatible real-time pub/sub server.
//!
//! Module map mirrors the component split in this crate's design
//! document: [`token`] (C4), [`channel`] (C1/C5), [`presence`] (C2),
//! [`rate_limiter`] (C3), [`protocol`] (C6), [`ws`] (C7), [`http`] (C8),
//! [`engine`] (C9).

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod presence;
pub mod protocol;
pub mod rate_limiter;
pub mod socket;
pub mod token;
pub mod ws;
