//! Stage 4: the user-visible reply.

use ei_domain::config::Persona;
use ei_domain::stream::Usage;
use ei_domain::trace::TraceEvent;

use crate::gateway::ModelGateway;
use crate::prompts::{fill, STAGE4_PROMPT, STAGE4_PROMPT_EMPATHETIC, TOOL_REPLY_PROMPT};
use crate::resolver::StageConfig;

/// Reply when the composer call fails.
pub const COMPOSE_ERROR_REPLY: &str = "抱歉，我暂时无法生成回复。";
/// Reply when the composer returns no text.
pub const EMPTY_REPLY: &str = "回复生成失败";
/// Reply when there is no strategy to compose from. No model call is made.
pub const NO_STRATEGY_REPLY: &str = "抱歉，我今天状态不佳，无法进行思考。";

/// Exactly one prompt source per composer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerPrompt<'a> {
    /// Used verbatim, e.g. the artifact data prompt.
    Override(&'a str),
    /// Tool methodology combined with the strategy.
    Tool(&'a str),
    /// Persona template with the strategy substituted.
    Persona(Persona),
}

impl<'a> ComposerPrompt<'a> {
    /// Override beats tool beats persona.
    pub fn select(
        override_prompt: Option<&'a str>,
        tool_prompt: Option<&'a str>,
        persona: Persona,
    ) -> Self {
        match (override_prompt, tool_prompt) {
            (Some(p), _) => ComposerPrompt::Override(p),
            (None, Some(t)) => ComposerPrompt::Tool(t),
            (None, None) => ComposerPrompt::Persona(persona),
        }
    }

    pub fn render(&self, strategy: &str) -> String {
        match *self {
            ComposerPrompt::Override(p) => p.to_owned(),
            ComposerPrompt::Tool(t) => fill(
                TOOL_REPLY_PROMPT,
                &[("tool_prompt", t), ("stage3_strategy", strategy)],
            ),
            ComposerPrompt::Persona(Persona::Rational) => {
                fill(STAGE4_PROMPT, &[("stage3_strategy", strategy)])
            }
            ComposerPrompt::Persona(Persona::Empathetic) => {
                fill(STAGE4_PROMPT_EMPATHETIC, &[("stage3_strategy", strategy)])
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplyOutcome {
    pub reply: String,
    pub usage: Option<Usage>,
}

pub async fn compose(
    gateway: &ModelGateway,
    config: &StageConfig,
    strategy: &str,
    prompt: ComposerPrompt<'_>,
) -> ReplyOutcome {
    let rendered = prompt.render(strategy);
    match gateway.complete(config, &rendered).await {
        Ok(c) if c.text.trim().is_empty() => {
            tracing::warn!("composer returned empty text");
            ReplyOutcome {
                reply: EMPTY_REPLY.to_owned(),
                usage: c.usage,
            }
        }
        Ok(c) => ReplyOutcome {
            reply: c.text,
            usage: c.usage,
        },
        Err(e) => {
            tracing::warn!(error = %e, "reply generation failed");
            TraceEvent::StageFallback {
                stage: "stage4".into(),
                reason: e.to_string(),
            }
            .emit();
            ReplyOutcome {
                reply: COMPOSE_ERROR_REPLY.to_owned(),
                usage: None,
            }
        }
    }
}
