//! `POST /v1/chat`: run one turn and stream its events as NDJSON.
//!
//! Validation, the anonymous quota and persisting the user message happen
//! before the stream opens and fail with a JSON error body. After that the
//! body carries one JSON object per line: status events, then exactly one
//! `data` event. Dropping the body cancels the turn.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::auth::Caller;
use crate::runtime::cancel::CancelOnDrop;
use crate::runtime::{prepare_turn, run_turn, TurnHandle, TurnInput};
use crate::state::AppState;

pub const NDJSON: &str = "application/x-ndjson";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub tool_id: Option<String>,
    #[serde(default)]
    pub tool_title: Option<String>,
    #[serde(default)]
    pub model_provider: Option<String>,
    #[serde(default)]
    pub partner_style: Option<String>,
}

impl ChatRequest {
    fn into_input(self, caller: Caller) -> TurnInput {
        TurnInput {
            conversation_id: self.conversation_id.unwrap_or_default(),
            message: self.message.unwrap_or_default(),
            tool_id: self.tool_id,
            tool_title: self.tool_title,
            provider: self.model_provider,
            persona: self.partner_style,
            caller,
        }
    }
}

pub async fn chat(
    State(state): State<AppState>,
    caller: Caller,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let prepared = prepare_turn(&state, body.into_input(caller)).await?;
    let handle = run_turn(state, prepared);

    Ok(([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(ndjson_stream(handle))).into_response())
}

/// Serialize turn events one per line. The turn is cancelled when the
/// stream is dropped before it finishes.
fn ndjson_stream(
    handle: TurnHandle,
) -> impl futures_util::Stream<Item = Result<String, Infallible>> + Send {
    let TurnHandle { mut events, cancel } = handle;
    async_stream::stream! {
        let _guard = CancelOnDrop::new(cancel);
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(mut line) => {
                    line.push('\n');
                    yield Ok(line);
                }
                Err(e) => tracing::warn!(error = %e, "failed to encode turn event"),
            }
        }
    }
}
