use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Providers, personas, reasoning hints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The closed set of model providers a turn may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    Deepseek,
    Doubao,
}

impl ModelProvider {
    /// Registry id of the provider adapter serving this provider.
    pub fn id(self) -> &'static str {
        match self {
            ModelProvider::Deepseek => "deepseek",
            ModelProvider::Doubao => "doubao",
        }
    }

    /// Map a request value onto the closed set; unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deepseek" => Some(ModelProvider::Deepseek),
            "doubao" => Some(ModelProvider::Doubao),
            _ => None,
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Response-tone variant selected by the caller (`partnerStyle`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Analytical advisor.
    #[default]
    Rational,
    /// Supportive partner.
    Empathetic,
}

impl Persona {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rational" => Some(Persona::Rational),
            "empathetic" => Some(Persona::Empathetic),
            _ => None,
        }
    }

    /// Prompt label recorded in the debug record.
    pub fn prompt_label(self) -> &'static str {
        match self {
            Persona::Rational => "Plan A (理性参谋)",
            Persona::Empathetic => "Plan B (感性伙伴)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// [pipeline] section
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineSettings {
    /// Provider used when the request names none (or an unknown one).
    #[serde(default)]
    pub default_provider: ModelProvider,
    #[serde(default)]
    pub models: ModelCatalog,
    #[serde(default)]
    pub persona_providers: PersonaProviders,
    #[serde(default)]
    pub memory: MemorySettings,
    #[serde(default)]
    pub title: TitleSettings,
}

/// Model identifiers per provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCatalog {
    #[serde(default = "d_deepseek_models")]
    pub deepseek: ProviderModels,
    #[serde(default = "d_doubao_models")]
    pub doubao: ProviderModels,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            deepseek: d_deepseek_models(),
            doubao: d_doubao_models(),
        }
    }
}

impl ModelCatalog {
    pub fn for_provider(&self, provider: ModelProvider) -> &ProviderModels {
        match provider {
            ModelProvider::Deepseek => &self.deepseek,
            ModelProvider::Doubao => &self.doubao,
        }
    }
}

/// Standard and higher-reasoning variants of one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderModels {
    /// Model for classification and composition.
    pub chat: String,
    /// Model for the strategy stage.
    pub reasoner: String,
    /// Reasoning-effort hint sent with strategy calls.
    #[serde(default)]
    pub reasoning_effort: Option<ReasoningEffort>,
}

/// Which provider composes the reply for each persona, independent of the
/// provider the caller asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaProviders {
    #[serde(default = "d_rational_provider")]
    pub rational: ModelProvider,
    #[serde(default = "d_empathetic_provider")]
    pub empathetic: ModelProvider,
}

impl Default for PersonaProviders {
    fn default() -> Self {
        Self {
            rational: d_rational_provider(),
            empathetic: d_empathetic_provider(),
        }
    }
}

impl PersonaProviders {
    pub fn for_persona(&self, persona: Persona) -> ModelProvider {
        match persona {
            Persona::Rational => self.rational,
            Persona::Empathetic => self.empathetic,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Raw rows fetched before filtering out analysis records.
    #[serde(default = "d_20")]
    pub raw_window: usize,
    /// Conversational rows kept after filtering.
    #[serde(default = "d_10")]
    pub turns: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            raw_window: d_20(),
            turns: d_10(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleSettings {
    #[serde(default = "d_15")]
    pub max_chars: usize,
}

impl Default for TitleSettings {
    fn default() -> Self {
        Self { max_chars: d_15() }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_deepseek_models() -> ProviderModels {
    ProviderModels {
        chat: "deepseek-chat".into(),
        reasoner: "deepseek-reasoner".into(),
        reasoning_effort: None,
    }
}
fn d_doubao_models() -> ProviderModels {
    ProviderModels {
        chat: "doubao-seed-1-8-251228".into(),
        reasoner: "doubao-seed-1-8-251228".into(),
        reasoning_effort: Some(ReasoningEffort::Low),
    }
}
fn d_rational_provider() -> ModelProvider {
    ModelProvider::Deepseek
}
fn d_empathetic_provider() -> ModelProvider {
    ModelProvider::Doubao
}
fn d_20() -> usize {
    20
}
fn d_10() -> usize {
    10
}
fn d_15() -> usize {
    15
}
