//! Provider registry.
//!
//! Constructs and holds all configured LLM provider instances. At startup
//! the registry reads the [`LlmConfig`], resolves API keys and instantiates
//! an adapter per provider. Providers are looked up by id (`deepseek`,
//! `doubao`, ...), which is how a stage's provider selects its credentials.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ei_domain::config::{LlmConfig, ProviderKind};

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider that failed to initialize, kept for health reporting.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub error: String,
}

/// Holds all instantiated LLM providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    init_errors: Vec<ProviderInitError>,
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`].
    ///
    /// Providers that fail to initialize (typically a missing API key) are
    /// logged and skipped rather than aborting startup; turns routed to them
    /// fall back to canned stage output.
    pub fn from_config(config: &LlmConfig) -> Self {
        let timeout = Duration::from_millis(config.default_timeout_ms);
        let mut registry = Self::default();

        for pc in config.effective_providers() {
            let result = match pc.kind {
                ProviderKind::OpenaiCompat => OpenAiCompatProvider::from_config(&pc, timeout)
                    .map(|p| Arc::new(p) as Arc<dyn LlmProvider>),
            };

            match result {
                Ok(provider) => {
                    tracing::info!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        base_url = %pc.base_url,
                        "registered LLM provider"
                    );
                    registry.providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %e,
                        "failed to initialize LLM provider, skipping"
                    );
                    registry.init_errors.push(ProviderInitError {
                        provider_id: pc.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        registry
    }

    /// Build a registry from ready-made providers, keyed by their ids.
    pub fn with_providers(providers: impl IntoIterator<Item = Arc<dyn LlmProvider>>) -> Self {
        let mut registry = Self::default();
        for p in providers {
            registry.insert(p);
        }
        registry
    }

    /// Register (or replace) a provider under its own id.
    pub fn insert(&mut self, provider: Arc<dyn LlmProvider>) {
        self.providers
            .insert(provider.provider_id().to_owned(), provider);
    }

    /// Look up a provider by its config id.
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// List all registered provider IDs (sorted).
    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Providers that failed to initialize at startup.
    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }
}
