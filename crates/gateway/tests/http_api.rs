//! HTTP surface: status codes, error bodies and the NDJSON stream.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use ei_domain::config::Config;
use ei_domain::conversation::{NewMessage, Role};
use ei_domain::error::Result;
use ei_gateway::api;
use ei_gateway::api::chat::NDJSON;
use ei_gateway::auth::CallerResolver;
use ei_gateway::bootstrap::assemble_state;
use ei_gateway::state::AppState;
use ei_providers::{ChatRequest, ChatResponse, LlmProvider, ProviderRegistry};
use ei_store::FileStore;

/// Answers every prompt with the same short text.
struct Canned;

#[async_trait::async_trait]
impl LlmProvider for Canned {
    async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
        Ok(ChatResponse {
            content: "先说说你的目标".into(),
            usage: None,
            model: "canned".into(),
            finish_reason: Some("stop".into()),
        })
    }

    fn provider_id(&self) -> &str {
        "deepseek"
    }
}

fn setup() -> (AppState, Router) {
    let config = Config::default();
    let auth = CallerResolver::new(Some("test-secret".into()), config.auth.clone());
    let state = assemble_state(
        Arc::new(config),
        ProviderRegistry::with_providers([Arc::new(Canned) as Arc<dyn LlmProvider>]),
        Arc::new(FileStore::in_memory()),
        auth,
    )
    .unwrap();
    let app = api::router().with_state(state.clone());
    (state, app)
}

fn bearer(state: &AppState, user_id: &str) -> String {
    format!("Bearer {}", state.auth.sign(user_id, None).unwrap())
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, content_type, body)
}

fn post_json(uri: &str, auth: Option<&str>, body: &Value) -> Request<Body> {
    let mut req = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(a) = auth {
        req = req.header(header::AUTHORIZATION, a);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut req = Request::get(uri);
    if let Some(a) = auth {
        req = req.header(header::AUTHORIZATION, a);
    }
    req.body(Body::empty()).unwrap()
}

fn error_code(body: &[u8]) -> String {
    let v: Value = serde_json::from_slice(body).unwrap();
    v["code"].as_str().unwrap_or_default().to_owned()
}

// ── chat ────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_streams_ndjson_events() {
    let (_state, app) = setup();
    let (status, content_type, body) = call(
        &app,
        post_json(
            "/v1/chat",
            None,
            &json!({ "message": "你好", "conversationId": "h1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some(NDJSON));

    let lines: Vec<Value> = std::str::from_utf8(&body)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let statuses: Vec<&str> = lines
        .iter()
        .filter(|l| l["type"] == "status")
        .map(|l| l["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, ["analyzing", "thinking", "replying"]);

    let last = lines.last().unwrap();
    assert_eq!(last["type"], "data");
    assert_eq!(last["reply"], "先说说你的目标");
    assert!(last.get("debug_info").is_none());
}

#[tokio::test]
async fn malformed_chat_body_is_bad_request() {
    let (_state, app) = setup();
    let req = Request::post("/v1/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");

    let (status, _, body) = call(
        &app,
        post_json("/v1/chat", None, &json!({ "conversationId": "h2" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "BAD_REQUEST");
}

#[tokio::test]
async fn anonymous_limit_is_forbidden() {
    let (state, app) = setup();
    let limit = state.config.quota.anonymous_message_limit;
    for i in 0..limit {
        state
            .store
            .append_message(NewMessage::new("h3", Role::User, format!("m{i}")))
            .await
            .unwrap();
    }

    let (status, _, body) = call(
        &app,
        post_json("/v1/chat", None, &json!({ "message": "再来", "conversationId": "h3" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v, json!({ "error": "Anonymous limit reached", "code": "LIMIT_REACHED" }));
}

#[tokio::test]
async fn bad_token_is_unauthorized() {
    let (_state, app) = setup();
    let (status, _, body) = call(
        &app,
        post_json(
            "/v1/chat",
            Some("Bearer u1::deadbeef"),
            &json!({ "message": "hi", "conversationId": "h4" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");
}

#[tokio::test]
async fn chat_into_another_users_conversation_is_forbidden() {
    let (state, app) = setup();
    let alice = bearer(&state, "alice");
    let (status, _, _) = call(
        &app,
        post_json("/v1/chat", Some(&alice), &json!({ "message": "预算被砍了", "conversationId": "h10" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mallory = bearer(&state, "mallory");
    let (status, _, body) = call(
        &app,
        post_json("/v1/chat", Some(&mallory), &json!({ "message": "之前聊了什么", "conversationId": "h10" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_code(&body), "FORBIDDEN");
    assert_eq!(state.store.count_user_messages("h10").await.unwrap(), 1);
}

// ── conversations & history ─────────────────────────────────────────

#[tokio::test]
async fn upsert_creates_then_updates() {
    let (state, app) = setup();
    let auth = bearer(&state, "u1");
    let body = json!({ "conversationId": "h5", "title": "季度复盘", "toolId": "grow" });

    let (status, _, _) = call(&app, post_json("/v1/conversation", Some(&auth), &body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, resp) = call(
        &app,
        post_json("/v1/conversation", Some(&auth), &json!({ "conversationId": "h5", "title": "新标题" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&resp).unwrap();
    assert_eq!(v["conversation"]["title"], "新标题");
    assert_eq!(v["conversation"]["tool_id"], "grow");

    // Another user may not touch it.
    let other = bearer(&state, "u2");
    let (status, _, _) = call(&app, post_json("/v1/conversation", Some(&other), &body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn merge_claims_anonymous_conversation_once() {
    let (state, app) = setup();
    state
        .store
        .append_message(NewMessage::new("h6", Role::User, "匿名提问"))
        .await
        .unwrap();
    let auth = bearer(&state, "u1");
    let merge = json!({ "conversationId": "h6" });

    let (status, _, body) = call(&app, post_json("/v1/conversations/merge", None, &merge)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    let (status, _, body) =
        call(&app, post_json("/v1/conversations/merge", Some(&auth), &merge)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "success": true }));

    let (_, _, body) = call(&app, post_json("/v1/conversations/merge", Some(&auth), &merge)).await;
    assert_eq!(
        serde_json::from_slice::<Value>(&body).unwrap(),
        json!({ "success": true, "alreadyOwned": true })
    );

    let other = bearer(&state, "u2");
    let (status, _, _) = call(&app, post_json("/v1/conversations/merge", Some(&other), &merge)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let missing = json!({ "conversationId": "nope" });
    let (status, _, _) =
        call(&app, post_json("/v1/conversations/merge", Some(&auth), &missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = call(&app, get("/v1/history", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["conversations"][0]["id"], "h6");
}

#[tokio::test]
async fn history_hides_debug_rows_from_regular_users() {
    let (state, app) = setup();
    let auth = bearer(&state, "u1");
    call(
        &app,
        post_json("/v1/chat", Some(&auth), &json!({ "message": "你好", "conversationId": "h7" })),
    )
    .await;

    let (status, _, body) = call(&app, get("/v1/history/h7", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    let kinds: Vec<&str> = v["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, ["text", "text"]);

    let (status, _, _) = call(&app, get("/v1/history/h7", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = call(&app, get("/v1/history/missing", Some(&auth))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_conversation() {
    let (state, app) = setup();
    let auth = bearer(&state, "u1");
    call(
        &app,
        post_json("/v1/chat", Some(&auth), &json!({ "message": "你好", "conversationId": "h8" })),
    )
    .await;

    let req = Request::delete("/v1/history/h8")
        .header(header::AUTHORIZATION, &auth)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "success": true }));
    assert!(state.store.get_conversation("h8").await.unwrap().is_none());
}

#[tokio::test]
async fn stop_without_running_turn_reports_false() {
    let (state, app) = setup();
    state
        .store
        .append_message(NewMessage::new("h9", Role::User, "问题"))
        .await
        .unwrap();
    let (status, _, body) = call(
        &app,
        post_json("/v1/conversations/h9/stop", None, &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "stopped": false }));
}

#[tokio::test]
async fn search_returns_snippets_from_own_conversations() {
    let (state, app) = setup();
    let long = format!("{}明年的预算要砍掉两成{}", "背景".repeat(25), "细节".repeat(50));
    state
        .store
        .append_message(NewMessage::new("h11", Role::User, long).user(Some("u1".into())))
        .await
        .unwrap();
    state
        .store
        .append_message(NewMessage::new("h12", Role::User, "预算也是我的").user(Some("u2".into())))
        .await
        .unwrap();
    let auth = bearer(&state, "u1");

    let (status, _, body) = call(&app, get("/v1/search?q=%E9%A2%84%E7%AE%97", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    let results = v["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["conversation_id"], "h11");
    let snippet = results[0]["snippet"].as_str().unwrap();
    assert!(snippet.starts_with("...") && snippet.ends_with("..."));
    assert!(snippet.contains("明年的预算要砍掉两成"));
    assert!(results[0]["date"].as_str().unwrap().ends_with('日'));

    let (status, _, body) = call(&app, get("/v1/search?q=%20%20", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "results": [] }));

    let (status, _, body) = call(&app, get("/v1/search?q=x", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");
}

// ── catalog & accounting ────────────────────────────────────────────

#[tokio::test]
async fn tools_and_usage() {
    let (state, app) = setup();
    let (status, _, body) = call(&app, get("/v1/tools", None)).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert!(v["tools"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["id"] == "grow"));

    let (status, _, _) = call(&app, get("/v1/usage", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let auth = bearer(&state, "u1");
    let (status, _, body) = call(&app, get("/v1/usage", Some(&auth))).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["total_tokens"], 0);
}

#[tokio::test]
async fn health_lists_providers() {
    let (_state, app) = setup();
    let (status, _, body) = call(&app, get("/v1/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["status"], "ok");
    assert_eq!(v["providers"], json!(["deepseek"]));
    assert_eq!(v["auth_enabled"], true);
}
