//! AppState construction shared by `serve` and `run`.

use std::sync::Arc;

use anyhow::Context;

use ei_domain::config::{Config, ConfigSeverity};
use ei_pipeline::artifact::ArtifactTrigger;
use ei_pipeline::{ModelGateway, ToolCatalog};
use ei_providers::ProviderRegistry;
use ei_store::{ConversationStore, FileStore};

use crate::auth::CallerResolver;
use crate::runtime::cancel::CancelMap;
use crate::state::AppState;

/// Validate config, open storage, register providers and return a
/// fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if error_count > 0 {
        anyhow::bail!("config validation failed with {error_count} error(s)");
    }

    // ── LLM providers ────────────────────────────────────────────────
    let registry = ProviderRegistry::from_config(&config.llm);
    if registry.is_empty() {
        tracing::warn!("no LLM providers initialized; every stage will use its fallback");
    } else {
        tracing::info!(providers = registry.len(), "LLM provider registry ready");
    }

    // ── Conversation store ───────────────────────────────────────────
    let store = FileStore::open(&config.storage.state_path).with_context(|| {
        format!(
            "opening conversation store at {}",
            config.storage.state_path.display()
        )
    })?;
    tracing::info!(path = %config.storage.state_path.display(), "conversation store ready");

    // ── Caller auth ──────────────────────────────────────────────────
    let auth = CallerResolver::from_env(config.auth.clone());

    assemble_state(config, registry, Arc::new(store), auth)
}

/// Wire already-built services into an [`AppState`]. Tests use this with
/// scripted providers and an in-memory store.
pub fn assemble_state(
    config: Arc<Config>,
    registry: ProviderRegistry,
    store: Arc<dyn ConversationStore>,
    auth: CallerResolver,
) -> anyhow::Result<AppState> {
    // ── Tools ────────────────────────────────────────────────────────
    let tools = ToolCatalog::builtin().with_knowledge_dir(config.tools.knowledge_dir.as_deref());
    tracing::info!(tools = tools.list().len(), "tool catalog ready");

    // ── Artifact trigger ─────────────────────────────────────────────
    let trigger = ArtifactTrigger::new().context("compiling artifact trigger patterns")?;

    Ok(AppState {
        config,
        gateway: ModelGateway::new(Arc::new(registry)),
        store,
        tools: Arc::new(tools),
        trigger: Arc::new(trigger),
        cancel_map: Arc::new(CancelMap::new()),
        auth: Arc::new(auth),
    })
}
