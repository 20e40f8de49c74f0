/// Room summary endpoint
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use dealwatch_shared::summary::SummaryFilter;

use crate::app::AppState;
use crate::error::ApiError;

/// `GET /v1/rooms/:room_id/summary` query parameters
#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// Restrict to items added today (UTC)
    #[serde(default)]
    pub today: bool,
}

/// `GET /v1/rooms/:room_id/summary`
pub async fn room_summary(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<SummaryQuery>,
) -> Result<Response, ApiError> {
    let filter = if query.today {
        SummaryFilter::Today(Utc::now())
    } else {
        SummaryFilter::Everything
    };
    let text = state.summary.render(room_id, filter).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response())
}
