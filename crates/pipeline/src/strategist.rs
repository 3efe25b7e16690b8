//! Stage 3: internal strategy. The strategy steers the composer and is
//! recorded for debugging; it is never shown to the user.

use ei_domain::analysis::Stage1Analysis;
use ei_domain::stream::Usage;
use ei_domain::trace::TraceEvent;

use crate::gateway::ModelGateway;
use crate::prompts::{fill, CONSTITUTION, STAGE3_PROMPT, TOOL_STRATEGY_PROMPT};
use crate::resolver::StageConfig;

/// Strategy substituted when the model call fails.
pub const STRATEGY_ERROR: &str = "策略生成出错";

const NO_HISTORY: &str = "无历史记录";
const NO_HISTORY_TOOL: &str = "No history";
const NO_PROFILE: &str = "暂无画像数据";

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    /// `None` when the model returned nothing: the turn cannot think.
    pub strategy: Option<String>,
    pub usage: Option<Usage>,
}

/// Build the strategy prompt. A tool prompt replaces the generic coaching
/// template with the tool's methodology.
pub fn strategy_prompt(
    message: &str,
    analysis: &Stage1Analysis,
    memory: &str,
    tool_prompt: Option<&str>,
) -> String {
    match tool_prompt {
        Some(tool) => fill(
            TOOL_STRATEGY_PROMPT,
            &[
                ("constitution", CONSTITUTION),
                ("tool_prompt", tool),
                ("user_input", message),
                ("history", or(memory, NO_HISTORY_TOOL)),
            ],
        ),
        None => {
            let intent_json = serde_json::to_string(analysis).unwrap_or_default();
            let body = fill(
                STAGE3_PROMPT,
                &[
                    ("user_input", message),
                    ("intent_json", &intent_json),
                    ("history_context", or(memory, NO_HISTORY)),
                    ("user_profile", NO_PROFILE),
                ],
            );
            format!("{CONSTITUTION}\n\n{body}")
        }
    }
}

pub async fn think(
    gateway: &ModelGateway,
    config: &StageConfig,
    message: &str,
    analysis: &Stage1Analysis,
    memory: &str,
    tool_prompt: Option<&str>,
) -> StrategyOutcome {
    let prompt = strategy_prompt(message, analysis, memory, tool_prompt);
    match gateway.complete(config, &prompt).await {
        Ok(c) => {
            let strategy = Some(c.text.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_owned);
            if strategy.is_none() {
                tracing::warn!("strategy model returned empty text");
            }
            StrategyOutcome {
                strategy,
                usage: c.usage,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "strategy generation failed");
            TraceEvent::StageFallback {
                stage: "stage3".into(),
                reason: e.to_string(),
            }
            .emit();
            StrategyOutcome {
                strategy: Some(STRATEGY_ERROR.to_owned()),
                usage: None,
            }
        }
    }
}

fn or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}
