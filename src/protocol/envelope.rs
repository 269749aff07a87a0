//! C6 — Message Codec.
//!
//! Grounded on the `PusherMessage` wire shape exercised in sockudo's
//! `tests/protocol_compliance.rs`, collapsed to this spec's single
//! `{event, data?, channel?, auth?, channel_data?}` envelope (spec.md §6).
//! `data` is kept as a raw, already-serialized JSON blob end to end
//! (spec.md §9: "avoid re-encoding on fan-out") via `serde_json`'s
//! `raw_value` feature.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

pub const MAX_EVENT_LEN: usize = 200;
pub const MAX_CHANNEL_LEN: usize = 200;
/// Maximum accepted size of a raw inbound text frame, in bytes.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, Deserialize, Serialize)]
pub struct Envelope {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Box<RawValue>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub channel_data: Option<String>,
}

/// Why a frame was rejected before it ever became an [`Envelope`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame exceeds the maximum allowed size")]
    TooLarge,
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn raw(value: &serde_json::Value) -> Box<RawValue> {
    RawValue::from_string(value.to_string()).expect("serde_json::Value always serializes to valid JSON")
}

impl Envelope {
    /// Parses a text frame into an envelope. Rejects oversize frames and
    /// malformed JSON (spec.md §7 "Malformed frame"); does not itself
    /// enforce `event` length — callers that need the envelope to be a
    /// *valid client message* call [`Envelope::validate`] next.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        if raw.len() > MAX_FRAME_BYTES {
            return Err(DecodeError::TooLarge);
        }
        Ok(serde_json::from_str(raw)?)
    }

    /// `event` required and length-bounded (spec.md §3 Envelope invariant).
    pub fn validate(&self) -> bool {
        !self.event.is_empty() && self.event.chars().count() <= MAX_EVENT_LEN
    }

    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("Envelope always serializes")
    }

    pub fn pusher_pong() -> Self {
        Self {
            event: "pusher:pong".into(),
            data: Some(raw(&serde_json::json!({}))),
            channel: None,
            auth: None,
            channel_data: None,
        }
    }

    pub fn pusher_error(message: impl Into<String>) -> Self {
        Self {
            event: "pusher:error".into(),
            data: Some(raw(&serde_json::json!({ "message": message.into() }))),
            channel: None,
            auth: None,
            channel_data: None,
        }
    }

    pub fn connection_established(socket_id: &str, activity_timeout_secs: u64) -> Self {
        Self {
            event: "pusher:connection_established".into(),
            data: Some(raw(&serde_json::json!({
                "socket_id": socket_id,
                "activity_timeout": activity_timeout_secs,
            }))),
            channel: None,
            auth: None,
            channel_data: None,
        }
    }

    pub fn subscription_succeeded(channel: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: "pusher_internal:subscription_succeeded".into(),
            data: Some(raw(&data)),
            channel: Some(channel.into()),
            auth: None,
            channel_data: None,
        }
    }

    pub fn member_added(channel: impl Into<String>, user_id: &str, user_info: &serde_json::Value) -> Self {
        Self {
            event: "pusher_internal:member_added".into(),
            data: Some(raw(&serde_json::json!({
                "user_id": user_id,
                "user_info": user_info,
            }))),
            channel: Some(channel.into()),
            auth: None,
            channel_data: None,
        }
    }

    pub fn member_removed(channel: impl Into<String>, user_id: &str) -> Self {
        Self {
            event: "pusher_internal:member_removed".into(),
            data: Some(raw(&serde_json::json!({ "user_id": user_id }))),
            channel: Some(channel.into()),
            auth: None,
            channel_data: None,
        }
    }

    /// Server-initiated or client-event fan-out frame: `{event, data, channel}`.
    pub fn broadcast(event: impl Into<String>, channel: impl Into<String>, data: Box<RawValue>) -> Self {
        Self {
            event: event.into(),
            data: Some(data),
            channel: Some(channel.into()),
            auth: None,
            channel_data: None,
        }
    }
}
