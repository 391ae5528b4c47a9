use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request body failed to parse (malformed JSON, unknown notification kind, missing field).
    #[error("Invalid payload: {0}")]
    Payload(#[from] JsonRejection),

    #[error("Invalid query: {0}")]
    Query(#[from] QueryRejection),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Payload(rejection) => {
                tracing::debug!(status = %rejection.status(), "Rejected request body");
                (rejection.status(), "INVALID_PAYLOAD", rejection.body_text())
            }
            AppError::Query(rejection) => (rejection.status(), "INVALID_QUERY", rejection.body_text()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
