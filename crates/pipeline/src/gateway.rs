//! Uniform call interface to the configured language-model backends.

use std::sync::Arc;

use ei_domain::error::{Error, Result};
use ei_domain::stream::Usage;
use ei_providers::{ChatMessage, ChatRequest, ProviderRegistry};

use crate::resolver::StageConfig;

/// Text and token usage of one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<Usage>,
}

/// Routes stage calls to the provider adapter named by the stage config.
#[derive(Clone)]
pub struct ModelGateway {
    registry: Arc<ProviderRegistry>,
}

impl ModelGateway {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Send `prompt` as a single system message with the stage's model and
    /// reasoning hint.
    pub async fn complete(&self, stage: &StageConfig, prompt: &str) -> Result<Completion> {
        let provider_id = stage.provider.id();
        let provider = self.registry.get(provider_id).ok_or_else(|| Error::Provider {
            provider: provider_id.to_owned(),
            message: "provider is not configured".into(),
        })?;

        let req = ChatRequest {
            messages: vec![ChatMessage::system(prompt)],
            model: Some(stage.model.clone()),
            reasoning_effort: stage.reasoning_effort,
            ..Default::default()
        };

        let resp = provider.chat(&req).await?;
        Ok(Completion {
            text: resp.content,
            usage: resp.usage,
        })
    }
}
