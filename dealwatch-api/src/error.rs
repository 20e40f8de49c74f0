/// API error handling
///
/// Maps domain errors onto HTTP status codes with a JSON error body.
/// Command errors keep their chat-readable `Display` text, since that text
/// is the contract with the upstream transport.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use dealwatch_shared::error::CommandError;

/// An error that can be returned to an HTTP client
#[derive(Debug)]
pub enum ApiError {
    /// 400 with the given message
    BadRequest(String),

    /// 404 with the given message
    NotFound(String),

    /// 500; details go to the log, not the client
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(source) => {
                tracing::error!(error = %source, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::RoomNotFound(_) | CommandError::ItemNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            CommandError::Internal(source) => ApiError::Internal(source.into()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}
