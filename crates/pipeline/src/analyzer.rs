//! Stage 1: intent classification.

use ei_domain::analysis::Stage1Analysis;
use ei_domain::stream::Usage;
use ei_domain::trace::TraceEvent;

use crate::gateway::ModelGateway;
use crate::json;
use crate::prompts::{fill, STAGE1_PROMPT};
use crate::resolver::StageConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub analysis: Stage1Analysis,
    pub usage: Option<Usage>,
}

impl AnalysisOutcome {
    pub fn fallback() -> Self {
        Self {
            analysis: Stage1Analysis::fallback(),
            usage: None,
        }
    }
}

/// Classify `message`. With a tool active the call is skipped and a fixed
/// tool-execution analysis is returned.
pub async fn analyze(
    gateway: &ModelGateway,
    config: &StageConfig,
    message: &str,
    tool_active: bool,
) -> AnalysisOutcome {
    if tool_active {
        return AnalysisOutcome {
            analysis: Stage1Analysis::tool_execution(),
            usage: None,
        };
    }

    let prompt = fill(STAGE1_PROMPT, &[("user_input", message)]);
    let completion = match gateway.complete(config, &prompt).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "intent analysis failed, using fallback");
            TraceEvent::StageFallback {
                stage: "stage1".into(),
                reason: e.to_string(),
            }
            .emit();
            return AnalysisOutcome::fallback();
        }
    };

    let analysis = match json::decode::<Stage1Analysis>(&completion.text) {
        Some(a) => a,
        None => {
            tracing::warn!("intent analysis output was not valid JSON, using fallback");
            TraceEvent::StageFallback {
                stage: "stage1".into(),
                reason: "unparseable output".into(),
            }
            .emit();
            Stage1Analysis::fallback()
        }
    };

    AnalysisOutcome {
        analysis,
        usage: completion.usage,
    }
}
