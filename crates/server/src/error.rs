use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chess_core::ChessError;
use serde_json::json;

use crate::clients::lichess::LichessError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Lichess(#[from] LichessError),

    #[error(transparent)]
    Chess(#[from] ChessError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Lichess(e) => {
                tracing::warn!("Lichess error: {e}");
                let status = match e {
                    LichessError::NotFound(_) => StatusCode::NOT_FOUND,
                    LichessError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                    LichessError::Unauthorized => StatusCode::UNAUTHORIZED,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, e.to_string())
            }
            AppError::Chess(e) => {
                tracing::warn!("Rejected chess input: {e}");
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            AppError::Sqlx(e) => {
                tracing::error!("Database error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}
