//! Short conversation titles, generated after the first exchange.

use crate::gateway::ModelGateway;
use crate::prompts::{fill, TITLE_PROMPT};
use crate::resolver::StageConfig;

/// Characters of each side of the exchange shown to the model.
const EXCERPT_CHARS: usize = 200;

pub fn title_prompt(user_message: &str, reply: &str) -> String {
    let user: String = user_message.chars().take(EXCERPT_CHARS).collect();
    let ai: String = reply.chars().take(EXCERPT_CHARS).collect();
    fill(TITLE_PROMPT, &[("user_message", &user), ("ai_reply", &ai)])
}

/// Strip quotes and book-title marks, trim, cut to `max_chars`. An empty
/// result means "no title".
pub fn clean_title(raw: &str, max_chars: usize) -> Option<String> {
    let stripped: String = raw.chars().filter(|c| !matches!(c, '"' | '《' | '》')).collect();
    let title: String = stripped.trim().chars().take(max_chars).collect();
    (!title.is_empty()).then_some(title)
}

/// Generate a title, or `None` on any failure.
pub async fn generate_title(
    gateway: &ModelGateway,
    config: &StageConfig,
    user_message: &str,
    reply: &str,
    max_chars: usize,
) -> Option<String> {
    let prompt = title_prompt(user_message, reply);
    match gateway.complete(config, &prompt).await {
        Ok(c) => clean_title(&c.text, max_chars),
        Err(e) => {
            tracing::warn!(error = %e, "title generation failed");
            None
        }
    }
}
