use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors surfaced to the caller of the verification endpoint
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Stable error code in the callable-function vocabulary
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::InvalidArgument(_) => "invalid-argument",
            ApiError::PermissionDenied(_) => "permission-denied",
            ApiError::Database(_) | ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthenticated(ref msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::InvalidArgument(ref msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::PermissionDenied(ref msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal database error occurred".to_string(),
                )
            }
            ApiError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message,
            }
        });

        (status, Json(body)).into_response()
    }
}

// Helper type for results
pub type Result<T> = std::result::Result<T, ApiError>;
