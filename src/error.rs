use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Why a move against an existing game was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    #[error("card already flipped")]
    AlreadyFlipped,

    #[error("card index out of range")]
    OutOfRange,

    #[error("not your turn")]
    WrongTurn,

    #[error("only the waiting player can nudge")]
    WrongPlayer,
}

impl MoveRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyFlipped => "ALREADY_FLIPPED",
            Self::OutOfRange => "INDEX_OUT_OF_RANGE",
            Self::WrongTurn => "WRONG_TURN",
            Self::WrongPlayer => "WRONG_PLAYER",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid move: {0}")]
    InvalidMove(MoveRejection),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid context: {0}")]
    InvalidContext(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Downstream failure: {0}")]
    DownstreamFailure(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::DownstreamFailure(err.to_string())
    }
}

impl AppError {
    /// Storage-class failures leave the caller's view possibly stale.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            AppError::Redis(_) | AppError::Serialization(_) | AppError::Storage(_)
        )
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::InvalidMove(rejection) => (
                StatusCode::BAD_REQUEST,
                rejection.as_str(),
                rejection.to_string(),
            ),
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::InvalidContext(ref msg) => {
                (StatusCode::BAD_REQUEST, "INVALID_CONTEXT", msg.clone())
            }
            AppError::AuthError(ref msg) => (StatusCode::UNAUTHORIZED, "AUTH_ERROR", msg.clone()),
            AppError::DownstreamFailure(ref msg) => {
                (StatusCode::BAD_GATEWAY, "DOWNSTREAM_FAILURE", msg.clone())
            }
            AppError::Redis(_) | AppError::Serialization(_) | AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                self.to_string(),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                self.to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
