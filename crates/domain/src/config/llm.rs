use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM providers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Per-request HTTP timeout for provider calls.
    #[serde(default = "d_120000")]
    pub default_timeout_ms: u64,
    /// Registered providers. When empty, [`LlmConfig::effective_providers`]
    /// falls back to the built-in DeepSeek and Doubao endpoints.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: d_120000(),
            providers: Vec::new(),
        }
    }
}

impl LlmConfig {
    /// The configured providers, or the built-in pair when none are listed.
    pub fn effective_providers(&self) -> Vec<ProviderConfig> {
        if !self.providers.is_empty() {
            return self.providers.clone();
        }
        vec![
            ProviderConfig {
                id: "deepseek".into(),
                kind: ProviderKind::OpenaiCompat,
                base_url: "https://api.deepseek.com".into(),
                auth: AuthConfig {
                    env: Some("DEEPSEEK_API_KEY".into()),
                    ..AuthConfig::default()
                },
                default_model: Some("deepseek-chat".into()),
            },
            ProviderConfig {
                id: "doubao".into(),
                kind: ProviderKind::OpenaiCompat,
                base_url: "https://ark.cn-beijing.volces.com/api/v3".into(),
                auth: AuthConfig {
                    env: Some("DOUBAO_API_KEY".into()),
                    ..AuthConfig::default()
                },
                default_model: Some("doubao-seed-1-8-251228".into()),
            },
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    #[serde(default)]
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    OpenaiCompat,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Header name. Defaults to `Authorization`.
    #[serde(default)]
    pub header: Option<String>,
    /// Header value prefix. Defaults to `Bearer `.
    #[serde(default)]
    pub prefix: Option<String>,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (prefer `env`).
    #[serde(default)]
    pub key: Option<String>,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_120000() -> u64 {
    120_000
}
