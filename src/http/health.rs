//! `GET /health` and `GET /admin/stats` — spec.md §4.7.

use crate::engine::StatsSource;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    stats: crate::engine::Stats,
}

pub async fn health(
    State(source): State<Arc<dyn StatsSource>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now(),
        stats: source.stats(),
    })
}

pub async fn stats(State(source): State<Arc<dyn StatsSource>>) -> Json<crate::engine::Stats> {
    Json(source.stats())
}
