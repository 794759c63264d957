use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("redis pool: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
    #[error("redis pool setup: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("malformed movie payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to fetch from upstream, status code: {status}")]
    UpstreamStatus { status: u16 },
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("cache store failed: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Validation(String),
}

/// Coarse classification callers can branch on without inspecting messages.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Serialization,
    UpstreamStatus,
    Transport,
    Validation,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Serialization(_) => ErrorKind::Serialization,
            AppError::UpstreamStatus { .. } => ErrorKind::UpstreamStatus,
            AppError::Upstream(_) | AppError::Store(_) => ErrorKind::Transport,
            AppError::Validation(_) => ErrorKind::Validation,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamStatus { status: 404 } => StatusCode::NOT_FOUND,
            AppError::UpstreamStatus { .. } | AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(error = %self, status = status.as_u16(), "request failed");
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
