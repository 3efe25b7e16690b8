//! JSON error responses: `{ "error": "<message>", "code": "<CODE>" }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::AuthError;
use crate::runtime::TurnError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Anonymous limit reached")]
    LimitReached,
    #[error("{0}")]
    Database(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::LimitReached => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::LimitReached => "LIMIT_REACHED",
            ApiError::Database(_) => "DB_ERROR",
            ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn sign_in_required() -> Self {
        ApiError::Unauthorized("sign in required".into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({ "error": self.to_string(), "code": self.code() })),
        )
            .into_response()
    }
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::Invalid(msg) => ApiError::BadRequest(msg),
            TurnError::LimitReached => ApiError::LimitReached,
            TurnError::Forbidden => ApiError::Forbidden(e.to_string()),
            TurnError::Quota(_) | TurnError::Persist(_) => ApiError::Database(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Unauthorized(e.to_string())
    }
}

impl From<ei_domain::error::Error> for ApiError {
    fn from(e: ei_domain::error::Error) -> Self {
        use ei_domain::error::Error;
        match e {
            Error::NotFound(what) => ApiError::NotFound(what),
            Error::Forbidden(what) => ApiError::Forbidden(what),
            other => {
                tracing::error!(error = %other, "storage error");
                ApiError::Database(other.to_string())
            }
        }
    }
}
