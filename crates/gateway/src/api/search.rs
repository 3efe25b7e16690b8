//! `GET /v1/search?q=`: find the caller's messages across conversations.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ei_domain::conversation::{search_snippet, Role, SearchHit};

use crate::api::auth::require_user;
use crate::api::error::ApiError;
use crate::auth::Caller;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default = "d_search_limit")]
    pub limit: usize,
}

fn d_search_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub id: u64,
    pub conversation_id: String,
    pub title: String,
    pub role: Role,
    pub snippet: String,
    /// Short display date, e.g. `10月19日`.
    pub date: String,
    pub created_at: DateTime<Utc>,
}

impl SearchResult {
    fn from_hit(hit: SearchHit, query: &str) -> Self {
        Self {
            id: hit.message_id,
            snippet: search_snippet(&hit.content, query),
            date: hit.created_at.format("%-m月%-d日").to_string(),
            conversation_id: hit.conversation_id,
            title: hit.conversation_title,
            role: hit.role,
            created_at: hit.created_at,
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    caller: Caller,
    Query(q): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = require_user(&caller)?;
    let query = q.q.trim();
    if query.is_empty() {
        return Ok(Json(serde_json::json!({ "results": [] })));
    }

    let results: Vec<SearchResult> = state
        .store
        .search_messages(user_id, query, q.limit)
        .await?
        .into_iter()
        .map(|hit| SearchResult::from_hit(hit, query))
        .collect();
    tracing::debug!(user_id, hits = results.len(), "message search");

    Ok(Json(serde_json::json!({ "results": results })))
}
