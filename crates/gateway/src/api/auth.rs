//! Caller extraction for handlers.
//!
//! The signing secret is read once at startup and held by the
//! [`CallerResolver`](crate::auth::CallerResolver) in `AppState`. A request
//! without a token is anonymous; a request with a bad token is rejected
//! with 401 before the handler runs.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::api::error::ApiError;
use crate::auth::Caller;
use crate::state::AppState;

#[axum::async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|v| v.to_str().map_err(|_| ApiError::Unauthorized("malformed bearer token".into())))
            .transpose()?;
        state.auth.resolve(header).map_err(|e| {
            tracing::debug!(error = %e, "rejected caller token");
            ApiError::from(e)
        })
    }
}

/// A caller that must be signed in.
pub fn require_user(caller: &Caller) -> Result<&str, ApiError> {
    caller.user_id().ok_or_else(ApiError::sign_in_required)
}
