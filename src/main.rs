use axum::middleware;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use pulsegate::config::ServerOptions;
use pulsegate::engine::{self, Engine};
use pulsegate::{http, ws};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let options = ServerOptions::parse();
    if let Err(err) = options.validate() {
        error!(%err, "invalid configuration");
        std::process::exit(1);
    }

    let ws_path = options.ws_path.clone();
    let port = options.port;
    let cors = http::cors_layer(&options.origin_allow_list());

    let engine = Arc::new(Engine::new(options));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = Arc::clone(&engine.limiter).spawn_sweeper(Duration::from_secs(300), shutdown_rx);

    let ws_router = Router::new()
        .route(&ws_path, get(ws::upgrade))
        .with_state(engine.clone());

    let app = ws_router
        .merge(http::router(engine.clone()))
        .layer(cors)
        .layer(middleware::from_fn(http::rewrite_preflight_status));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {addr}: {err}"));
    info!(%addr, "listening");

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(engine.clone(), shutdown_tx));

    if let Err(err) = server.await {
        error!(%err, "server error");
    }

    let _ = sweeper.await;
}

/// Waits for Ctrl+C/SIGTERM, then — before this future resolves — fires the
/// sweeper's shutdown signal and pushes a 1001 close onto every open
/// connection (spec.md §4.6.8: close each open connection, *then* close the
/// listener). `axum::serve`'s graceful shutdown only stops accepting new
/// connections and starts waiting for in-flight ones to finish once this
/// future resolves, so the closes must happen here, not after `server.await`
/// — otherwise graceful shutdown blocks on sockets nobody ever told to close.
async fn shutdown_signal(engine: Arc<Engine>, shutdown_tx: tokio::sync::watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    let _ = shutdown_tx.send(true);
    engine::close_all(&engine, 1001, "Server shutting down");
}
