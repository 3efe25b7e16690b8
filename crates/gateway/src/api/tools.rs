//! `GET /v1/tools`: the coaching tools a conversation can be bound to.

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn list_tools(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "tools": state.tools.list() }))
}
