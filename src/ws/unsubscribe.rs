//! §4.6.4 Unsubscribe handler.

use super::{ConnectionState, Engine};
use crate::channel;
use crate::channel::ChannelType;
use crate::protocol::Envelope;
use std::sync::Arc;

pub async fn handle(
    engine: &Arc<Engine>,
    state: &mut ConnectionState,
    _send: &dyn Fn(Envelope),
    envelope: Envelope,
) {
    let Some(channel_name) = envelope.channel else {
        return;
    };

    if !state.subscribed_channels.remove(&channel_name) {
        // Not subscribed: a no-op (spec.md §4.6.4).
        return;
    }

    engine.channels.unsubscribe(&channel_name, &state.id);

    if channel::classify(&channel_name) == ChannelType::Presence {
        if let Some(member) = engine.presence.remove_member(&channel_name, &state.id) {
            engine.broadcast_except(
                &channel_name,
                &state.id,
                Envelope::member_removed(channel_name.clone(), &member.user_id),
            );
        }
    }
}
