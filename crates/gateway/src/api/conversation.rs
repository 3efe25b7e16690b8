//! Conversation management.
//!
//! - `POST /v1/conversation`: create or update title/tool
//! - `POST /v1/conversations/merge`: claim an anonymous conversation
//! - `POST /v1/conversations/:id/stop`: cancel the running turn

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use ei_domain::conversation::ClaimOutcome;

use crate::api::auth::require_user;
use crate::api::error::ApiError;
use crate::api::history::load_accessible;
use crate::auth::Caller;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    pub conversation_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tool_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub conversation_id: String,
}

pub async fn upsert(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<UpsertRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let id = body.conversation_id.trim();
    if id.is_empty() {
        return Err(ApiError::BadRequest("conversationId is required".into()));
    }

    let existing = state.store.get_conversation(id).await?;
    if let Some(conv) = &existing {
        if !conv.accessible_by(caller.user_id()) {
            return Err(ApiError::Forbidden("conversation belongs to another user".into()));
        }
    }

    let conversation = state
        .store
        .upsert_conversation(
            id,
            body.title.as_deref(),
            body.tool_id.as_deref(),
            caller.user_id(),
        )
        .await?;
    let status = if existing.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(serde_json::json!({ "conversation": conversation }))))
}

pub async fn merge(
    State(state): State<AppState>,
    caller: Caller,
    Json(body): Json<MergeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = require_user(&caller)?;
    match state
        .store
        .claim_conversation(&body.conversation_id, user_id)
        .await?
    {
        ClaimOutcome::Claimed => Ok(Json(serde_json::json!({ "success": true }))),
        ClaimOutcome::AlreadyOwned => Ok(Json(
            serde_json::json!({ "success": true, "alreadyOwned": true }),
        )),
        ClaimOutcome::OwnedByOther => Err(ApiError::Forbidden(
            "conversation belongs to another user".into(),
        )),
        ClaimOutcome::NotFound => Err(ApiError::NotFound("conversation not found".into())),
    }
}

pub async fn stop(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_accessible(&state, &caller, &id).await?;
    let stopped = state.cancel_map.cancel(&id);
    if stopped {
        tracing::info!(conversation_id = %id, "turn stop requested");
    }
    Ok(Json(serde_json::json!({ "stopped": stopped })))
}
