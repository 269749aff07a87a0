use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

/// Engine-internal error taxonomy. Each variant carries the exact
/// user-facing message text spec.md §7 mandates for the corresponding
/// in-band error frame.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid JSON format")]
    InvalidMessage,

    #[error("Invalid channel name")]
    InvalidChannel,

    #[error("Authentication failed")]
    Unauthorized,

    #[error("{0}")]
    QuotaExceeded(&'static str),

    #[error("Not subscribed to channel")]
    NotSubscribed,

    #[error("Invalid channel_data")]
    InvalidChannelData,

    #[error("Client events not allowed on private/presence channels")]
    ForbiddenClientEvent,

    #[error("connection not found")]
    ConnectionGone,

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The message text that belongs in a `pusher:error` frame's
    /// `data.message` field.
    pub fn client_message(&self) -> String {
        self.to_string()
    }
}

/// HTTP-surface error wrapper (C8). Distinct from [`Error`] because HTTP
/// failures need a status code, not an in-band frame.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
