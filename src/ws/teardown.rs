//! §4.6.6 Connection teardown — run once, whichever way the connection
//! ends (client close, transport error, or server shutdown).

use super::{ConnectionState, Engine};
use crate::channel::ChannelType;
use crate::{channel, protocol::Envelope};
use std::sync::Arc;
use tracing::info;

pub async fn teardown(engine: &Arc<Engine>, state: &ConnectionState) {
    for channel_name in &state.subscribed_channels {
        engine.channels.unsubscribe(channel_name, &state.id);

        if channel::classify(channel_name) == ChannelType::Presence {
            if let Some(member) = engine.presence.remove_member(channel_name, &state.id) {
                engine.broadcast_except(
                    channel_name,
                    &state.id,
                    Envelope::member_removed(channel_name.clone(), &member.user_id),
                );
            }
        }
    }

    let remote_ip = engine.connections.get(&state.id).map(|h| h.remote_ip);
    engine.connections.remove(&state.id);
    if let Some(remote_ip) = remote_ip {
        engine.limiter.remove_connection(remote_ip);
    }
    engine.limiter.remove_connection_rate_state(&state.id);

    info!(id = %state.id, "connection closed");
}
