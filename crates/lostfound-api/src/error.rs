use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use lostfound_types::api::MessageBody;

pub type ApiResult<T> = Result<T, ApiError>;

/// Handler errors. Every variant renders as `{"msg": ...}` and never carries
/// payload data.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// Missing or non-bearer credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// A bearer token was presented but failed validation (expired, bad
    /// signature, malformed). The client treats this like 401.
    #[error("{0}")]
    InvalidToken(String),

    #[error("Not allowed")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Internal(format!("{}: {}", context, err))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidToken(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            error!("{}", detail);
        }
        let body = MessageBody { msg: self.to_string() };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal("spawn_blocking join error", e)
    }
}
