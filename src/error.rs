use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Private or otherwise inaccessible profile
    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transient failures the Steam client is allowed to retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::RateLimited(_))
    }
}

impl From<reqwest::Error> for AppError {
    /// The request URL carries the API key, so it never reaches the message
    fn from(e: reqwest::Error) -> Self {
        let e = e.without_url();
        if e.is_timeout() {
            AppError::Network(format!("request timed out: {}", e))
        } else {
            AppError::Network(e.to_string())
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::Storage(format!("redis: {}", e))
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Network(_) | AppError::RateLimited(_) => StatusCode::BAD_GATEWAY,
            AppError::Storage(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
