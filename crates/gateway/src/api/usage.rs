//! `GET /v1/usage`: the caller's cumulative token and tool usage.

use axum::extract::State;
use axum::Json;

use ei_domain::conversation::UserUsage;

use crate::api::auth::require_user;
use crate::api::error::ApiError;
use crate::auth::Caller;
use crate::state::AppState;

pub async fn get_usage(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<UserUsage>, ApiError> {
    let user_id = require_user(&caller)?;
    Ok(Json(state.store.usage(user_id).await?))
}
