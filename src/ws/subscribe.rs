//! §4.6.3 Subscribe handler.

use super::{ConnectionState, Engine};
use crate::channel;
use crate::error::Error;
use crate::presence::PresenceMember;
use crate::protocol::Envelope;
use crate::socket::SocketId;
use serde_json::Value;
use std::sync::Arc;

fn error(send: &dyn Fn(Envelope), err: Error) {
    send(Envelope::pusher_error(err.client_message()));
}

pub async fn handle(
    engine: &Arc<Engine>,
    state: &mut ConnectionState,
    send: &dyn Fn(Envelope),
    envelope: Envelope,
) {
    let Some(channel_name) = envelope.channel.clone() else {
        error(send, Error::InvalidMessage);
        return;
    };

    // 1. Channel name shape.
    if !channel::is_valid(&channel_name) {
        error(send, Error::InvalidChannel);
        return;
    }

    // 2. Per-connection channel cap.
    if state.channel_cap_exceeded(engine.options.channel_limit_per_connection) {
        error(send, Error::QuotaExceeded("channel subscription limit exceeded"));
        return;
    }

    // 3. Idempotent re-subscribe.
    if state.subscribed_channels.contains(&channel_name) {
        send(Envelope::subscription_succeeded(
            channel_name,
            serde_json::json!({}),
        ));
        return;
    }

    // 4. Auth for private/presence channels.
    if channel::requires_auth(&channel_name) {
        let Some(auth) = envelope.auth.as_deref() else {
            error(send, Error::Unauthorized);
            return;
        };
        if !engine.token.verify(auth, state.id.as_str(), &channel_name) {
            error(send, Error::Unauthorized);
            return;
        }
    }

    // 5. Register subscription.
    engine.channels.subscribe(&channel_name, &state.id);
    state.subscribed_channels.insert(channel_name.clone());

    // 6/7. Presence bookkeeping, or plain ack.
    if channel::classify(&channel_name) == channel::ChannelType::Presence {
        let member = match parse_presence_member(&state.id, envelope.channel_data.as_deref()) {
            Ok(member) => member,
            Err(()) => {
                // Roll back the partial subscription (spec.md §7).
                engine.channels.unsubscribe(&channel_name, &state.id);
                state.subscribed_channels.remove(&channel_name);
                error(send, Error::InvalidChannelData);
                return;
            }
        };

        engine
            .presence
            .add_member(&channel_name, state.id.clone(), member.clone());

        let data = engine.presence.presence_data(&channel_name);
        send(Envelope::subscription_succeeded(
            channel_name.clone(),
            serde_json::to_value(&data).unwrap_or_else(|_| serde_json::json!({})),
        ));

        engine.broadcast_except(
            &channel_name,
            &state.id,
            Envelope::member_added(channel_name.clone(), &member.user_id, &member.user_info),
        );
    } else {
        send(Envelope::subscription_succeeded(
            channel_name,
            serde_json::json!({}),
        ));
    }
}

fn parse_presence_member(conn_id: &SocketId, channel_data: Option<&str>) -> Result<PresenceMember, ()> {
    let raw = channel_data.ok_or(())?;
    let parsed: Value = serde_json::from_str(raw).map_err(|_| ())?;
    let user_id = parsed
        .get("user_id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| conn_id.to_string());
    let user_info = parsed.get("user_info").cloned().unwrap_or_else(|| serde_json::json!({}));
    Ok(PresenceMember { user_id, user_info })
}
