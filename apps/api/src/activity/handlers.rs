use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::activity::ActivityRow;
use crate::notifications::ActivityEntry;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
}

/// POST /api/activity-log
pub async fn handle_append_activity(
    State(state): State<AppState>,
    payload: Result<Json<ActivityEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<ActivityRow>), AppError> {
    let Json(entry) = payload?;
    if entry.activity_type.trim().is_empty() {
        return Err(AppError::Validation("activity type must not be empty".to_string()));
    }
    let row = state.activity.append(&entry).await?;
    tracing::debug!(id = %row.id, activity_type = %row.activity_type, "Activity recorded");
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/activity-log
pub async fn handle_list_activity(
    State(state): State<AppState>,
    query: Result<Query<ActivityQuery>, QueryRejection>,
) -> Result<Json<Vec<ActivityRow>>, AppError> {
    let Query(params) = query?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let activity_type = params
        .activity_type
        .as_deref()
        .filter(|t| !t.trim().is_empty());
    let rows = state.activity.list_recent(limit, activity_type).await?;
    Ok(Json(rows))
}
