//! C8 — HTTP surface.
//!
//! Grounded on sockudo's `middleware.rs`/`tests/http_handler/up_endpoint_test.rs`
//! (axum handlers taking `State<Arc<_>>`, a health endpoint reporting live
//! counts) collapsed to this spec's three routes: `/auth`, `/health`, and
//! `/admin/stats`, all stateless given the shared `Engine`.

mod auth;
mod health;

use crate::engine::{Engine, StatsSource};
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// `/auth` needs the full engine (it mints tokens); `/health` and
/// `/admin/stats` only ever see a [`StatsSource`] (spec.md §9). Each half is
/// closed over its own state and returned as a stateless `Router<()>` so the
/// caller can merge both into one app alongside the `/ws` route, which has
/// the engine as its own state.
pub fn router(engine: Arc<Engine>) -> Router<()> {
    let stats: Arc<dyn StatsSource> = engine.clone();

    let auth_router = Router::new()
        .route("/auth", post(auth::authenticate))
        .with_state(engine);

    let stats_router = Router::new()
        .route("/health", get(health::health))
        .route("/admin/stats", get(health::stats))
        .with_state(stats);

    auth_router.merge(stats_router)
}

/// Permissive by default (`*`); restricted to the configured origin list
/// otherwise (spec.md §6 `ALLOWED_ORIGINS`).
pub fn cors_layer(allow_list: &Option<Vec<String>>) -> CorsLayer {
    match allow_list {
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
        Some(origins) => {
            let parsed: Vec<_> = origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(parsed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// `tower_http::cors::CorsLayer` answers every preflight it short-circuits
/// with `200 OK`; spec.md §4.7 calls for `204`. Rewrites the status of an
/// already-built OPTIONS response rather than reimplementing preflight
/// handling, so CorsLayer's `Access-Control-*` headers are left untouched.
/// Apply this as a layer *outside* (added after) [`cors_layer`] so it sees
/// the response CorsLayer already produced.
pub async fn rewrite_preflight_status(req: Request, next: Next) -> Response {
    let is_preflight = req.method() == Method::OPTIONS;
    let mut response = next.run(req).await;
    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}
