//! Black-box protocol scenarios (spec.md §8), driven over a real TCP
//! listener with `tokio-tungstenite` as the client, in the same style as
//! the teacher's `tests/protocol_compliance.rs` black-box checks.

use futures::{SinkExt, StreamExt};
use pulsegate::config::ServerOptions;
use pulsegate::engine::Engine;
use pulsegate::{http, ws};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as TMessage;

const AUTH_SECRET: &str = "integration-test-secret";

struct TestServer {
    ws_url: String,
    http_addr: String,
    token: pulsegate::token::Token,
}

async fn spawn_server() -> TestServer {
    let options = ServerOptions {
        port: 0,
        auth_secret: AUTH_SECRET.to_string(),
        ws_path: "/ws".to_string(),
        allowed_origins: "*".to_string(),
        connection_limit_per_ip: 10,
        channel_limit_per_connection: 50,
        message_rate_limit: 5,
        message_rate_window_ms: 60_000,
        production: false,
    };
    let token = pulsegate::token::Token::new(AUTH_SECRET);
    let cors = http::cors_layer(&options.origin_allow_list());
    let engine = Arc::new(Engine::new(options));

    let ws_router = axum::Router::new()
        .route("/ws", axum::routing::get(ws::upgrade))
        .with_state(engine.clone());
    let app = ws_router
        .merge(http::router(engine.clone()))
        .layer(cors)
        .layer(axum::middleware::from_fn(http::rewrite_preflight_status));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        ws_url: format!("ws://{addr}/ws"),
        http_addr: addr.to_string(),
        token,
    }
}

/// Issues a raw CORS preflight over a plain TCP connection (no HTTP client
/// crate in this pack's dev-dependencies) and returns the response's status
/// line.
async fn send_preflight(addr: &str, path: &str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "OPTIONS {path} HTTP/1.1\r\n\
         Host: {addr}\r\n\
         Origin: https://example.com\r\n\
         Access-Control-Request-Method: GET\r\n\
         Connection: close\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    let response = String::from_utf8_lossy(&buf).to_string();
    response.lines().next().unwrap_or_default().to_string()
}

async fn connect(url: &str) -> (
    impl futures::Sink<TMessage, Error = tokio_tungstenite::tungstenite::Error>,
    impl futures::Stream<Item = Result<TMessage, tokio_tungstenite::tungstenite::Error>>,
) {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.expect("connect");
    stream.split()
}

async fn next_json<S>(stream: &mut S) -> Value
where
    S: futures::Stream<Item = Result<TMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("transport error")
        {
            TMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

async fn send_json<Si>(sink: &mut Si, value: &Value)
where
    Si: futures::Sink<TMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    sink.send(TMessage::Text(value.to_string().into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn scenario_public_channel_fanout() {
    let server = spawn_server().await;

    let (mut sink_a, mut stream_a) = connect(&server.ws_url).await;
    let established_a = next_json(&mut stream_a).await;
    assert_eq!(established_a["event"], "pusher:connection_established");

    let (mut sink_b, mut stream_b) = connect(&server.ws_url).await;
    let _ = next_json(&mut stream_b).await;

    send_json(
        &mut sink_a,
        &json!({"event": "pusher:subscribe", "channel": "public-chat"}),
    )
    .await;
    let ack = next_json(&mut stream_a).await;
    assert_eq!(ack["event"], "pusher_internal:subscription_succeeded");

    send_json(
        &mut sink_b,
        &json!({"event": "pusher:subscribe", "channel": "public-chat"}),
    )
    .await;
    let _ = next_json(&mut stream_b).await;

    send_json(
        &mut sink_a,
        &json!({"event": "new-message", "channel": "public-chat", "data": {"text": "hi"}}),
    )
    .await;

    // Both subscribers, including the sender, receive the fan-out.
    let received_a = next_json(&mut stream_a).await;
    let received_b = next_json(&mut stream_b).await;
    assert_eq!(received_a["event"], "new-message");
    assert_eq!(received_a["data"]["text"], "hi");
    assert_eq!(received_b["event"], "new-message");
    assert_eq!(received_b["data"]["text"], "hi");
}

#[tokio::test]
async fn scenario_private_channel_auth_success() {
    let server = spawn_server().await;
    let (mut sink, mut stream) = connect(&server.ws_url).await;
    let established = next_json(&mut stream).await;
    let socket_id = established["data"]["socket_id"].as_str().unwrap().to_string();

    let auth = server.token.token(&socket_id, "private-secret");
    send_json(
        &mut sink,
        &json!({"event": "pusher:subscribe", "channel": "private-secret", "auth": auth}),
    )
    .await;

    let ack = next_json(&mut stream).await;
    assert_eq!(ack["event"], "pusher_internal:subscription_succeeded");
    assert_eq!(ack["channel"], "private-secret");
}

#[tokio::test]
async fn scenario_private_channel_auth_failure() {
    let server = spawn_server().await;
    let (mut sink, mut stream) = connect(&server.ws_url).await;
    let _ = next_json(&mut stream).await;

    send_json(
        &mut sink,
        &json!({"event": "pusher:subscribe", "channel": "private-secret", "auth": "bogus:bogus"}),
    )
    .await;

    let reply = next_json(&mut stream).await;
    assert_eq!(reply["event"], "pusher:error");
    assert_eq!(reply["data"]["message"], "Authentication failed");
}

#[tokio::test]
async fn scenario_presence_join_and_leave() {
    let server = spawn_server().await;

    let (mut sink_a, mut stream_a) = connect(&server.ws_url).await;
    let established_a = next_json(&mut stream_a).await;
    let socket_a = established_a["data"]["socket_id"].as_str().unwrap().to_string();

    let (mut sink_b, mut stream_b) = connect(&server.ws_url).await;
    let established_b = next_json(&mut stream_b).await;
    let socket_b = established_b["data"]["socket_id"].as_str().unwrap().to_string();

    let auth_a = server.token.token(&socket_a, "presence-room");
    send_json(
        &mut sink_a,
        &json!({
            "event": "pusher:subscribe",
            "channel": "presence-room",
            "auth": auth_a,
            "channel_data": json!({"user_id": "u1"}).to_string(),
        }),
    )
    .await;
    let ack_a = next_json(&mut stream_a).await;
    assert_eq!(ack_a["data"]["presence"]["count"], 1);

    let auth_b = server.token.token(&socket_b, "presence-room");
    send_json(
        &mut sink_b,
        &json!({
            "event": "pusher:subscribe",
            "channel": "presence-room",
            "auth": auth_b,
            "channel_data": json!({"user_id": "u2"}).to_string(),
        }),
    )
    .await;
    let ack_b = next_json(&mut stream_b).await;
    assert_eq!(ack_b["data"]["presence"]["count"], 2);

    // A is told B joined.
    let member_added = next_json(&mut stream_a).await;
    assert_eq!(member_added["event"], "pusher_internal:member_added");
    assert_eq!(member_added["data"]["user_id"], "u2");

    // B leaves; A is told.
    send_json(
        &mut sink_b,
        &json!({"event": "pusher:unsubscribe", "channel": "presence-room"}),
    )
    .await;
    let member_removed = next_json(&mut stream_a).await;
    assert_eq!(member_removed["event"], "pusher_internal:member_removed");
    assert_eq!(member_removed["data"]["user_id"], "u2");
}

#[tokio::test]
async fn scenario_client_event_blocked_on_private_channel() {
    let server = spawn_server().await;
    let (mut sink, mut stream) = connect(&server.ws_url).await;
    let established = next_json(&mut stream).await;
    let socket_id = established["data"]["socket_id"].as_str().unwrap().to_string();

    let auth = server.token.token(&socket_id, "private-secret");
    send_json(
        &mut sink,
        &json!({"event": "pusher:subscribe", "channel": "private-secret", "auth": auth}),
    )
    .await;
    let _ = next_json(&mut stream).await;

    send_json(
        &mut sink,
        &json!({"event": "client-typing", "channel": "private-secret", "data": {}}),
    )
    .await;

    let reply = next_json(&mut stream).await;
    assert_eq!(reply["event"], "pusher:error");
    assert_eq!(
        reply["data"]["message"],
        "Client events not allowed on private/presence channels"
    );
}

#[tokio::test]
async fn scenario_rate_limit_exceeded() {
    let server = spawn_server().await;
    let (mut sink, mut stream) = connect(&server.ws_url).await;
    let _ = next_json(&mut stream).await;

    send_json(
        &mut sink,
        &json!({"event": "pusher:subscribe", "channel": "public-chat"}),
    )
    .await;
    let _ = next_json(&mut stream).await;

    // message_rate_limit is 5 for this test server; send past it.
    for _ in 0..5 {
        send_json(&mut sink, &json!({"event": "pusher:ping"})).await;
        let _ = next_json(&mut stream).await;
    }
    send_json(&mut sink, &json!({"event": "pusher:ping"})).await;
    let reply = next_json(&mut stream).await;
    assert_eq!(reply["event"], "pusher:error");
    assert_eq!(reply["data"]["message"], "Rate limit exceeded");
}

#[tokio::test]
async fn scenario_cors_preflight_returns_204() {
    let server = spawn_server().await;
    let status_line = send_preflight(&server.http_addr, "/health").await;
    assert!(
        status_line.contains("204"),
        "expected a 204 preflight response, got: {status_line}"
    );
}
