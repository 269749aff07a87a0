//! `POST /auth` — spec.md §4.7: stateless channel-auth token minting.

use crate::engine::Engine;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    socket_id: String,
    channel_name: String,
    #[serde(default)]
    channel_data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    auth: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_data: Option<String>,
}

pub async fn authenticate(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if req.socket_id.trim().is_empty() {
        return Err(AppError::InvalidInput("socket_id is required".into()));
    }
    if !crate::channel::is_valid(&req.channel_name) {
        return Err(AppError::InvalidInput("channel_name is invalid".into()));
    }

    let auth = engine.token.token(&req.socket_id, &req.channel_name);
    let channel_data = req
        .channel_data
        .as_ref()
        .map(|v| v.to_string());

    Ok(Json(AuthResponse { auth, channel_data }))
}
