//! Per-turn model selection.
//!
//! A [`PipelineConfig`] is resolved once when a turn starts and never
//! changes afterwards. Credentials are not part of it: each stage names a
//! [`ModelProvider`], and the provider registry holds the adapter (and key)
//! registered under that provider's id.

use ei_domain::analysis::ModelInfo;
use ei_domain::config::{ModelProvider, Persona, PipelineSettings, ReasoningEffort};

/// Model, provider and reasoning hint for one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConfig {
    pub provider: ModelProvider,
    pub model: String,
    pub reasoning_effort: Option<ReasoningEffort>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Provider the caller asked for (after defaulting).
    pub provider: ModelProvider,
    /// Persona the caller asked for, if any.
    pub persona: Option<Persona>,
    pub stage1: StageConfig,
    pub stage3: StageConfig,
    pub stage4: StageConfig,
}

impl PipelineConfig {
    /// Resolve from raw request values. Unknown providers fall back to the
    /// configured default; an unknown persona counts as `Rational`.
    pub fn from_request(
        settings: &PipelineSettings,
        provider: Option<&str>,
        persona: Option<&str>,
    ) -> Self {
        let provider = provider
            .and_then(ModelProvider::parse)
            .unwrap_or(settings.default_provider);
        let persona = persona.map(|p| Persona::parse(p).unwrap_or_default());
        resolve(settings, provider, persona)
    }

    /// Persona used for composing, `Rational` when none was requested.
    pub fn effective_persona(&self) -> Persona {
        self.persona.unwrap_or_default()
    }

    /// Model labels recorded in the debug record.
    pub fn model_info(&self) -> ModelInfo {
        let effort = self
            .stage3
            .reasoning_effort
            .map(ReasoningEffort::as_str)
            .unwrap_or("Ordinary");
        ModelInfo {
            stage1: self.stage1.model.clone(),
            stage3: format!("{} ({effort})", self.stage3.model),
            stage4: format!(
                "{} [Prompt: {}]",
                self.stage4.model,
                self.effective_persona().prompt_label()
            ),
        }
    }
}

/// Pure selection of stage configs.
///
/// Stages 1 and 4 use the provider's chat model; stage 3 uses its reasoning
/// variant. An explicit persona moves stage 4 to the persona's provider.
pub fn resolve(
    settings: &PipelineSettings,
    provider: ModelProvider,
    persona: Option<Persona>,
) -> PipelineConfig {
    let chat = |p: ModelProvider| StageConfig {
        provider: p,
        model: settings.models.for_provider(p).chat.clone(),
        reasoning_effort: None,
    };

    let models = settings.models.for_provider(provider);
    let stage3 = StageConfig {
        provider,
        model: models.reasoner.clone(),
        reasoning_effort: models.reasoning_effort,
    };

    let composer_provider = persona
        .map(|p| settings.persona_providers.for_persona(p))
        .unwrap_or(provider);

    PipelineConfig {
        provider,
        persona,
        stage1: chat(provider),
        stage3,
        stage4: chat(composer_provider),
    }
}
