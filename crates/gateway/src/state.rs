use std::sync::Arc;

use ei_domain::config::Config;
use ei_pipeline::artifact::ArtifactTrigger;
use ei_pipeline::{ModelGateway, ToolCatalog};
use ei_store::ConversationStore;

use crate::auth::CallerResolver;
use crate::runtime::cancel::CancelMap;

/// Shared application state passed to all API handlers and turns.
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub gateway: ModelGateway,
    pub store: Arc<dyn ConversationStore>,

    // ── Turn behavior ─────────────────────────────────────────────────
    pub tools: Arc<ToolCatalog>,
    /// Card-request detection, compiled once at startup.
    pub trigger: Arc<ArtifactTrigger>,
    pub cancel_map: Arc<CancelMap>,

    // ── Security ──────────────────────────────────────────────────────
    pub auth: Arc<CallerResolver>,
}
