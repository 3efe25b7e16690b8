//! Conversation history.
//!
//! - `GET    /v1/history`: the caller's conversations, newest first
//! - `GET    /v1/history/:id`: messages of one conversation
//! - `DELETE /v1/history/:id`: delete a conversation and its messages

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ei_domain::analysis::DebugInfo;
use ei_domain::conversation::{Conversation, Message, MessageKind, Role};
use ei_pipeline::artifact::{extract_artifact, strip_artifact};

use crate::api::auth::require_user;
use crate::api::error::ApiError;
use crate::auth::Caller;
use crate::state::AppState;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Query / response shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "d_list_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default = "d_message_limit")]
    pub limit: usize,
}

fn d_list_limit() -> usize {
    50
}
fn d_message_limit() -> usize {
    500
}

#[derive(Debug, Serialize)]
pub struct HistoryMessage {
    pub id: u64,
    pub role: Role,
    pub kind: MessageKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
    /// Prose with any fenced artifact removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Markup of the fenced artifact, if the reply carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl HistoryMessage {
    fn from_message(msg: Message) -> Self {
        let debug_info = match msg.kind {
            MessageKind::Analysis => msg
                .metadata
                .as_deref()
                .and_then(|m| serde_json::from_str(m).ok()),
            _ => None,
        };
        let (text, artifact) = match msg.kind {
            MessageKind::Text => (
                Some(strip_artifact(&msg.content)),
                extract_artifact(&msg.content),
            ),
            _ => (None, None),
        };
        Self {
            id: msg.id,
            role: msg.role,
            kind: msg.kind,
            content: msg.content,
            created_at: msg.created_at,
            metadata: msg.metadata,
            debug_info,
            text,
            artifact,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn list_conversations(
    State(state): State<AppState>,
    caller: Caller,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = require_user(&caller)?;
    let conversations = state.store.list_conversations(user_id, q.limit).await?;
    Ok(Json(serde_json::json!({ "conversations": conversations })))
}

pub async fn get_messages(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Query(q): Query<MessagesQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conversation = load_accessible(&state, &caller, &id).await?;
    let messages: Vec<HistoryMessage> = state
        .store
        .recent_messages(&id, q.limit)
        .await?
        .into_iter()
        .filter(|m| caller.privileged || m.kind != MessageKind::Analysis)
        .map(HistoryMessage::from_message)
        .collect();

    Ok(Json(serde_json::json!({
        "conversation": conversation,
        "messages": messages,
    })))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_accessible(&state, &caller, &id).await?;
    state.cancel_map.cancel(&id);
    let deleted = state.store.delete_conversation(&id).await?;
    tracing::info!(conversation_id = %id, deleted, "conversation deleted");
    Ok(Json(serde_json::json!({ "success": deleted })))
}

/// The conversation, if it exists and the caller may see it.
pub(crate) async fn load_accessible(
    state: &AppState,
    caller: &Caller,
    id: &str,
) -> Result<Conversation, ApiError> {
    let conversation = state
        .store
        .get_conversation(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("conversation not found".into()))?;
    if !conversation.accessible_by(caller.user_id()) {
        return Err(ApiError::Forbidden("conversation belongs to another user".into()));
    }
    Ok(conversation)
}
