use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use tasklive_db::StoreError;

/// Request-terminal error taxonomy. Every variant maps to a distinct
/// machine-readable code so clients can tell "log in again" from "bad
/// input" from "not yours". Nothing here is retried server-side.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("email already registered")]
    DuplicateIdentity,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("missing bearer token")]
    Unauthenticated,

    #[error("session has been closed")]
    SessionClosed,

    #[error("invalid or expired token")]
    InvalidToken,

    /// The revocation ledger could not be queried. Fails closed.
    #[error("verification unavailable")]
    VerificationUnavailable,

    /// The task doesn't exist, or belongs to someone else — the response
    /// doesn't say which.
    #[error("task not found")]
    NotFoundOrForbidden,

    #[error("storage failure")]
    Persistence,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DuplicateIdentity | Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::SessionClosed | Self::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::VerificationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFoundOrForbidden => StatusCode::NOT_FOUND,
            Self::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateIdentity => "duplicate_identity",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Unauthenticated => "unauthenticated",
            Self::SessionClosed => "session_closed",
            Self::InvalidToken => "invalid_token",
            Self::VerificationUnavailable => "verification_unavailable",
            Self::NotFoundOrForbidden => "not_found",
            Self::Persistence => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.code() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => Self::DuplicateIdentity,
            other => {
                error!("storage error: {}", other);
                Self::Persistence
            }
        }
    }
}

pub(crate) fn join_error(e: tokio::task::JoinError) -> ApiError {
    error!("spawn_blocking join error: {}", e);
    ApiError::Persistence
}
