use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::DbErr;
use serde::Serialize;
use services::services::generation::GenerationError;
use thiserror::Error;

/// Wire shape for every error this API returns.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            ApiError::Generation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "GenerationError"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
        };

        // Callers get a generic message; the provider detail stays in the
        // server log.
        let error_message = match &self {
            ApiError::Database(_) => "Failed to fetch images".to_string(),
            ApiError::Generation(GenerationError::Provider { .. }) => {
                "Failed to generate image".to_string()
            }
            ApiError::Generation(_) => "Image generation failed".to_string(),
            ApiError::Unauthorized => "Unauthorized".to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        (status_code, Json(ErrorBody::new(error_message))).into_response()
    }
}
