use ei_domain::config::MemorySettings;
use ei_store::ConversationStore;

/// Recent conversational turns of one conversation as a plain transcript,
/// oldest first, one `User: ...` / `AI: ...` line per message.
///
/// Analysis records are dropped before the turn cap is applied. Storage
/// failures degrade to an empty transcript.
pub async fn recent_transcript(
    store: &dyn ConversationStore,
    conversation_id: &str,
    settings: &MemorySettings,
) -> String {
    let rows = match store
        .recent_messages(conversation_id, settings.raw_window)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(
                conversation_id = %conversation_id,
                error = %e,
                "failed to read conversation memory"
            );
            return String::new();
        }
    };

    let conversational: Vec<_> = rows.iter().filter(|m| m.is_conversational()).collect();
    let start = conversational.len().saturating_sub(settings.turns);
    conversational[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
