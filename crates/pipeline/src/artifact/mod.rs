//! Structured artifacts (GROW cards) produced instead of free-text replies.

pub mod fence;
pub mod grow;
pub mod render;
pub mod trigger;

pub use fence::{extract_artifact, strip_artifact};
pub use grow::GrowCardPayload;
pub use render::{fence_html, render_grow_card};
pub use trigger::{ArtifactTrigger, TriggerKind, GROW_TOOL_ID};

use ei_domain::stream::Usage;
use ei_domain::trace::TraceEvent;

use crate::composer::{self, ComposerPrompt};
use crate::gateway::ModelGateway;
use crate::json;
use crate::resolver::StageConfig;

/// Strategy handed to the composer when the turn produced none.
const DEFAULT_CARD_STRATEGY: &str = "生成卡片数据";

#[derive(Debug, Clone, PartialEq)]
pub struct CardOutcome {
    /// Fenced markup, ready to stream and persist.
    pub reply: String,
    pub usage: Option<Usage>,
    /// Whether the fallback payload was used.
    pub used_fallback: bool,
}

/// Ask the composer for card data and render it. Never returns raw model
/// output: anything that does not decode as a payload is replaced by
/// [`GrowCardPayload::fallback`].
pub async fn build_grow_card(
    gateway: &ModelGateway,
    config: &StageConfig,
    kind: TriggerKind,
    message: &str,
    tool_prompt: &str,
    strategy: Option<&str>,
) -> CardOutcome {
    let prompt = grow::data_prompt(tool_prompt, kind, message);
    let out = composer::compose(
        gateway,
        config,
        strategy.unwrap_or(DEFAULT_CARD_STRATEGY),
        ComposerPrompt::Override(&prompt),
    )
    .await;

    let (payload, used_fallback) = match json::decode::<GrowCardPayload>(&out.reply) {
        Some(p) => (p, false),
        None => {
            tracing::warn!(kind = ?kind, "card data was not valid JSON, using fallback payload");
            TraceEvent::StageFallback {
                stage: "artifact".into(),
                reason: "unparseable card data".into(),
            }
            .emit();
            (GrowCardPayload::fallback(), true)
        }
    };

    CardOutcome {
        reply: fence_html(&render_grow_card(&payload)),
        usage: out.usage,
        used_fallback,
    }
}
