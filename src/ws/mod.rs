//! C7 — Connection Dispatcher (the hard part).
//!
//! Grounded on sockudo's `adapter/local_adapter.rs` (connection table
//! shape, chunked-semaphore fan-out) and `adapter/handler/*` (the split
//! between upgrade/admission, per-event handlers, and timeout/teardown
//! bookkeeping). Collapsed to a single in-process, single-tenant engine:
//! one `axum::extract::ws` upgrade handler owns the whole connection
//! lifecycle instead of sockudo's pluggable-adapter abstraction.

mod client_event;
mod subscribe;
mod teardown;
mod unsubscribe;

use crate::engine::Engine;
use crate::protocol::Envelope;
use crate::socket::SocketId;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use bytes::Bytes;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Queued onto a connection's writer task. `Close` lets callers outside the
/// connection's own read loop (shutdown, admission rejection) terminate it
/// without reaching into the socket directly.
pub enum Outbound {
    Frame(Bytes),
    Close(u16, &'static str),
}

/// Handle to a live connection, held in the engine's connection table.
/// Anyone holding a `ConnectionHandle` can push bytes to that connection's
/// socket without touching the connection's own task.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: SocketId,
    pub remote_ip: std::net::IpAddr,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    /// Best-effort send: a slow or gone peer never blocks or fails the
    /// caller (spec.md §5 "Backpressure").
    pub fn send_bytes(&self, bytes: Bytes) {
        let _ = self.sender.send(Outbound::Frame(bytes));
    }

    pub fn send_envelope(&self, envelope: &Envelope) {
        self.send_bytes(Bytes::from(envelope.encode()));
    }

    /// Ask the connection's writer task to close the socket with `code` /
    /// `reason` (spec.md §4.6.8 graceful shutdown).
    pub fn close(&self, code: u16, reason: &'static str) {
        let _ = self.sender.send(Outbound::Close(code, reason));
    }
}

/// Per-connection state mutated only by the task that owns this
/// connection's inbound stream (spec.md §3/§5 single-writer invariant).
struct ConnectionState {
    id: SocketId,
    subscribed_channels: HashSet<String>,
    last_activity_at: Instant,
}

pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(engine): State<Arc<Engine>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let remote_ip = resolve_remote_ip(&headers, addr);

    if !origin_allowed(&engine, &headers) {
        debug!(%remote_ip, "rejecting upgrade: origin not allowed");
        return axum::http::StatusCode::FORBIDDEN.into_response();
    }

    // Check-and-increment happens atomically here, not split across the
    // upgrade boundary, so two concurrent upgrades from the same IP can't
    // both slip in over the cap (P6).
    if !engine.limiter.try_add_connection(remote_ip) {
        debug!(%remote_ip, "rejecting upgrade: per-IP connection limit exceeded");
        return ws
            .on_upgrade(move |socket| async move {
                close_immediately(socket, 1008, "Connection limit exceeded").await;
            })
            .into_response();
    }

    ws.on_upgrade(move |socket| handle_connection(socket, engine, remote_ip))
        .into_response()
}

fn origin_allowed(engine: &Engine, headers: &HeaderMap) -> bool {
    let Some(allow_list) = &engine.options.origin_allow_list() else {
        return true;
    };
    let Some(origin) = headers.get(axum::http::header::ORIGIN).and_then(|v| v.to_str().ok())
    else {
        // No allow-list bypass for a missing Origin header once a
        // non-wildcard list is configured.
        return false;
    };
    allow_list.iter().any(|allowed| allowed == origin)
}

fn resolve_remote_ip(headers: &HeaderMap, addr: SocketAddr) -> std::net::IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim())
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| addr.ip())
}

async fn close_immediately(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(axum::extract::ws::CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}

async fn handle_connection(socket: WebSocket, engine: Arc<Engine>, remote_ip: std::net::IpAddr) {
    let id = SocketId::generate();
    // Admission (the increment half of P6's cap) already happened in
    // `upgrade` at the moment this connection was admitted.

    let (mut ws_sink, mut ws_stream) = futures::StreamExt::split(socket);
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    let handle = ConnectionHandle {
        id: id.clone(),
        remote_ip,
        sender: tx.clone(),
    };
    engine.connections.insert(id.clone(), handle.clone());

    // Writer task: the only task that ever calls `ws_sink.send`, so every
    // other task can push frames through `tx` without touching the socket
    // directly.
    let writer = tokio::spawn(async move {
        use futures::SinkExt;
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Frame(bytes) => {
                    let text = String::from_utf8(bytes.to_vec()).unwrap_or_default();
                    if ws_sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close(code, reason) => {
                    let _ = ws_sink
                        .send(Message::Close(Some(axum::extract::ws::CloseFrame {
                            code,
                            reason: reason.into(),
                        })))
                        .await;
                    break;
                }
            }
        }
        let _ = ws_sink.close().await;
    });

    info!(%id, %remote_ip, "connection established");
    handle.send_envelope(&Envelope::connection_established(id.as_str(), 120));

    let mut state = ConnectionState {
        id: id.clone(),
        subscribed_channels: HashSet::new(),
        last_activity_at: Instant::now(),
    };

    use futures::StreamExt;
    while let Some(msg) = ws_stream.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                debug!(%id, error = %e, "transport error, tearing down");
                break;
            }
        };
        match msg {
            Message::Text(text) => {
                state.last_activity_at = Instant::now();
                dispatch_frame(&engine, &mut state, &tx, text.as_str()).await;
            }
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {
                state.last_activity_at = Instant::now();
            }
        }
    }

    teardown::teardown(&engine, &state).await;
    writer.abort();
}

async fn dispatch_frame(
    engine: &Arc<Engine>,
    state: &mut ConnectionState,
    tx: &mpsc::UnboundedSender<Outbound>,
    raw: &str,
) {
    let send = |envelope: Envelope| {
        let _ = tx.send(Outbound::Frame(Bytes::from(envelope.encode())));
    };

    let envelope = match Envelope::decode(raw) {
        Ok(e) => e,
        Err(_) => {
            send(Envelope::pusher_error(crate::error::Error::InvalidMessage.client_message()));
            return;
        }
    };
    if !envelope.validate() {
        send(Envelope::pusher_error(crate::error::Error::InvalidMessage.client_message()));
        return;
    }

    if !engine.limiter.can_send_message(&state.id) {
        send(Envelope::pusher_error(
            crate::error::Error::QuotaExceeded("Rate limit exceeded").client_message(),
        ));
        return;
    }

    match envelope.event.as_str() {
        "pusher:subscribe" => subscribe::handle(engine, state, &send, envelope).await,
        "pusher:unsubscribe" => unsubscribe::handle(engine, state, &send, envelope).await,
        "pusher:ping" => send(Envelope::pusher_pong()),
        _ => client_event::handle(engine, state, &send, envelope).await,
    }
}

impl ConnectionState {
    fn channel_cap_exceeded(&self, cap: usize) -> bool {
        self.subscribed_channels.len() >= cap
    }
}
