pub mod auth;
pub mod chat;
pub mod conversation;
pub mod error;
pub mod health;
pub mod history;
pub mod search;
pub mod tools;
pub mod usage;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the API router.
///
/// Every route resolves its caller through the [`Caller`](crate::auth::Caller)
/// extractor: anonymous without a token, 401 with a bad one.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health::health))
        // Turns
        .route("/v1/chat", post(chat::chat))
        .route("/v1/conversations/:id/stop", post(conversation::stop))
        // Conversations
        .route("/v1/conversation", post(conversation::upsert))
        .route("/v1/conversations/merge", post(conversation::merge))
        .route("/v1/history", get(history::list_conversations))
        .route(
            "/v1/history/:id",
            get(history::get_messages).delete(history::delete_conversation),
        )
        .route("/v1/search", get(search::search))
        // Catalog & accounting
        .route("/v1/tools", get(tools::list_tools))
        .route("/v1/usage", get(usage::get_usage))
        .layer(TraceLayer::new_for_http())
}
