//! §4.6.5 Client event handler — any event name not reserved for the
//! `pusher:`/`pusher_internal:` namespaces.

use super::{ConnectionState, Engine};
use crate::channel;
use crate::error::Error;
use crate::protocol::Envelope;
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
    let (Some(channel_name), Some(data)) = (envelope.channel, envelope.data) else {
        error(send, Error::InvalidMessage);
        return;
    };

    if !state.subscribed_channels.contains(&channel_name) {
        error(send, Error::NotSubscribed);
        return;
    }

    if channel::requires_auth(&channel_name) {
        error(send, Error::ForbiddenClientEvent);
        return;
    }

    // Re-emitted verbatim to every subscriber, including the sender
    // (spec.md §4.6.5).
    engine.broadcast_all(&channel_name, Envelope::broadcast(envelope.event, channel_name.clone(), data));
}
