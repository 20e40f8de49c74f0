/// Inbound message endpoint
///
/// The single entry point transports forward chat messages to. The sender
/// is an opaque channel identity; which transport produced it is not this
/// service's concern. Command handling is synchronous and the reply text
/// goes straight back in the response.
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::error::ApiError;

/// `POST /v1/inbound` request body
#[derive(Debug, Deserialize)]
pub struct InboundRequest {
    /// Opaque channel identity of the sender, e.g. `tg:12345`
    pub sender: String,

    /// Raw message text
    pub text: String,
}

/// `POST /v1/inbound` response body
#[derive(Debug, Serialize)]
pub struct InboundResponse {
    /// Reply to send back to the sender
    pub reply: String,
}

/// `POST /v1/inbound`
pub async fn inbound_message(
    State(state): State<AppState>,
    Json(request): Json<InboundRequest>,
) -> Result<Json<InboundResponse>, ApiError> {
    let sender = request.sender.trim();
    if sender.is_empty() {
        return Err(ApiError::BadRequest("sender must not be empty".to_string()));
    }
    let reply = state.router.handle(sender, &request.text).await;
    Ok(Json(InboundResponse { reply }))
}
