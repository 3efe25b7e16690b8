use serde::Serialize;

/// Structured trace events emitted across the Executive Insider crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LlmRequest {
        provider: String,
        model: String,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    StageFallback {
        stage: String,
        reason: String,
    },
    MessageAppended {
        conversation_id: String,
        message_id: u64,
        role: String,
        kind: String,
    },
    ConversationClaimed {
        conversation_id: String,
        user_id: String,
    },
    TurnCompleted {
        conversation_id: String,
        tool_id: Option<String>,
        total_tokens: u64,
        model: String,
        has_card: bool,
    },
    TitleGenerated {
        conversation_id: String,
        title: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ei_event");
    }
}
