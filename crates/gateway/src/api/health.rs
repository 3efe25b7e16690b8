//! `GET /v1/health`: liveness plus provider readiness.

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let registry = state.gateway.registry();
    let errors: Vec<serde_json::Value> = registry
        .init_errors()
        .iter()
        .map(|e| serde_json::json!({ "provider": e.provider_id, "error": e.error }))
        .collect();

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": registry.list_providers(),
        "provider_errors": errors,
        "auth_enabled": state.auth.enabled(),
    }))
}
