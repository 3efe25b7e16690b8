//! Full turns against a scripted model and an in-memory store.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use ei_domain::analysis::{DebugInfo, Intent, DEBUG_RECORD_CONTENT, MISSING_STRATEGY_LABEL};
use ei_domain::config::Config;
use ei_domain::conversation::{
    ClaimOutcome, Conversation, Message, MessageKind, NewMessage, Role, SearchHit, UserUsage,
};
use ei_domain::error::{Error, Result};
use ei_domain::stream::{TokenTotals, Usage};
use ei_gateway::api::error::ApiError;
use ei_gateway::auth::{Caller, CallerResolver};
use ei_gateway::bootstrap::assemble_state;
use ei_gateway::runtime::{prepare_turn, run_turn, TurnError, TurnEvent, TurnInput, TurnStatus};
use ei_gateway::state::AppState;
use ei_pipeline::artifact::{fence_html, render_grow_card, GrowCardPayload};
use ei_pipeline::composer::NO_STRATEGY_REPLY;
use ei_providers::{ChatRequest, ChatResponse, LlmProvider, ProviderRegistry};
use ei_store::{ConversationStore, FileStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted model
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Analyze,
    Strategy,
    Reply,
    Card,
    Title,
}

fn classify(prompt: &str) -> Stage {
    if prompt.starts_with("Task: Generate a very short") {
        Stage::Title
    } else if prompt.contains("意图分析专家") {
        Stage::Analyze
    } else if prompt.contains("STAGE 3") || prompt.contains("Do NOT output the final reply yet") {
        Stage::Strategy
    } else if prompt.contains("当前用户请求") || prompt.contains("华东区销售总监") {
        Stage::Card
    } else {
        Stage::Reply
    }
}

type Responder = dyn Fn(Stage) -> Result<String> + Send + Sync;

struct Scripted {
    respond: Box<Responder>,
    delay: Option<(Stage, Duration)>,
    calls: Mutex<Vec<(Stage, String)>>,
}

impl Scripted {
    fn new(respond: impl Fn(Stage) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn slow(
        stage: Stage,
        delay: Duration,
        respond: impl Fn(Stage) -> Result<String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            delay: Some((stage, delay)),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn stages(&self) -> Vec<Stage> {
        self.calls.lock().iter().map(|(s, _)| *s).collect()
    }

    fn prompts(&self, stage: Stage) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl LlmProvider for Scripted {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let prompt = req.messages[0].content.clone();
        let stage = classify(&prompt);
        self.calls.lock().push((stage, prompt));
        if let Some((slow, delay)) = self.delay {
            if slow == stage {
                tokio::time::sleep(delay).await;
            }
        }
        let content = (self.respond)(stage)?;
        Ok(ChatResponse {
            content,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: req.model.clone().unwrap_or_default(),
            finish_reason: Some("stop".into()),
        })
    }

    fn provider_id(&self) -> &str {
        "deepseek"
    }
}

const ANALYSIS_JSON: &str =
    r#"{"intent":"DECISION","sentiment":"焦虑","complexity":"HIGH","keywords":["执行力"]}"#;
const STRATEGY: &str = "用户处于 G 阶段，先澄清目标";
const REPLY: &str = "你最想在三个月内达成什么结果？";
const CARD_JSON: &str = r#"```json
{"goal":"季度交付周期缩短 30%","reality":["现状：排期混乱"],"options":["方案A：引入看板"],"will":["即刻：召开复盘会"],"sloganCn":"想清楚，做得到","footerSub":"POWER YOUR DECISION"}
```"#;

fn happy(stage: Stage) -> Result<String> {
    Ok(match stage {
        Stage::Analyze => ANALYSIS_JSON.into(),
        Stage::Strategy => STRATEGY.into(),
        Stage::Reply => REPLY.into(),
        Stage::Card => CARD_JSON.into(),
        Stage::Title => "《团队执行力》".into(),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Harness
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn state_with(model: Arc<Scripted>, store: Arc<dyn ConversationStore>) -> AppState {
    let config = Config::default();
    let auth = CallerResolver::new(Some("test-secret".into()), config.auth.clone());
    let registry = ProviderRegistry::with_providers([model as Arc<dyn LlmProvider>]);
    assemble_state(Arc::new(config), registry, store, auth).unwrap()
}

fn state(model: Arc<Scripted>) -> AppState {
    state_with(model, Arc::new(FileStore::in_memory()))
}

fn input(conversation_id: &str, message: &str) -> TurnInput {
    TurnInput {
        conversation_id: conversation_id.into(),
        message: message.into(),
        ..TurnInput::default()
    }
}

fn user(id: &str) -> Caller {
    Caller {
        user_id: Some(id.into()),
        email: None,
        privileged: false,
    }
}

fn admin() -> Caller {
    Caller {
        privileged: true,
        ..user("admin")
    }
}

async fn turn(state: &AppState, input: TurnInput) -> Vec<TurnEvent> {
    let prepared = prepare_turn(state, input).await.unwrap();
    let mut handle = run_turn(state.clone(), prepared);
    let mut events = Vec::new();
    while let Some(event) = handle.events.recv().await {
        events.push(event);
    }
    events
}

fn data(events: &[TurnEvent]) -> (&str, Option<&DebugInfo>) {
    match events.last() {
        Some(TurnEvent::Data { reply, debug_info }) => (reply.as_str(), debug_info.as_ref()),
        other => panic!("expected a data event last, got {other:?}"),
    }
}

async fn messages(state: &AppState, conversation_id: &str) -> Vec<Message> {
    state
        .store
        .recent_messages(conversation_id, 100)
        .await
        .unwrap()
}

async fn wait_for_title(state: &AppState, conversation_id: &str, expected: &str) -> bool {
    for _ in 0..100 {
        let conv = state.store.get_conversation(conversation_id).await.unwrap();
        if conv.is_some_and(|c| c.title == expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ordering & persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn statuses_in_order_then_one_data_event() {
    let model = Scripted::new(happy);
    let state = state(model.clone());

    let events = turn(&state, input("c1", "团队执行力差怎么办")).await;

    assert_eq!(
        events[..3],
        [
            TurnEvent::Status { status: TurnStatus::Analyzing },
            TurnEvent::Status { status: TurnStatus::Thinking },
            TurnEvent::Status { status: TurnStatus::Replying },
        ]
    );
    assert_eq!(events.len(), 4);
    let (reply, debug) = data(&events);
    assert_eq!(reply, REPLY);
    assert!(debug.is_none());

    assert_eq!(
        &model.stages()[..3],
        &[Stage::Analyze, Stage::Strategy, Stage::Reply]
    );

    // User message, then debug record, then reply.
    let rows = messages(&state, "c1").await;
    assert_eq!(rows.len(), 3);
    assert_eq!((rows[0].role, &rows[0].kind), (Role::User, &MessageKind::Text));
    assert_eq!(rows[1].kind, MessageKind::Analysis);
    assert_eq!(rows[1].content, DEBUG_RECORD_CONTENT);
    assert_eq!((rows[2].role, rows[2].content.as_str()), (Role::Ai, REPLY));
    assert!(rows[0].id < rows[1].id && rows[1].id < rows[2].id);

    let record: DebugInfo = serde_json::from_str(rows[1].metadata.as_deref().unwrap()).unwrap();
    assert_eq!(record.config_provider, "deepseek");
    assert_eq!(record.stage1.intent, Intent::Decision);
    assert_eq!(record.stage3_strategy, STRATEGY);
    assert_eq!(record.model_info.stage3, "deepseek-reasoner (Ordinary)");
}

#[tokio::test]
async fn empty_strategy_apologizes_without_composing() {
    let model = Scripted::new(|stage| match stage {
        Stage::Strategy => Ok("   ".into()),
        other => happy(other),
    });
    let state = state(model.clone());

    let events = turn(&state, input("c2", "你好")).await;
    let (reply, _) = data(&events);
    assert_eq!(reply, NO_STRATEGY_REPLY);

    let stages = model.stages();
    assert!(!stages.contains(&Stage::Reply));
    assert!(!stages.contains(&Stage::Card));

    let rows = messages(&state, "c2").await;
    let record: DebugInfo = serde_json::from_str(rows[1].metadata.as_deref().unwrap()).unwrap();
    assert_eq!(record.stage3_strategy, MISSING_STRATEGY_LABEL);
}

#[tokio::test]
async fn failing_model_still_completes_with_fallbacks() {
    let model = Scripted::new(|_| Err(Error::Timeout("upstream".into())));
    let state = state(model);

    let events = turn(&state, input("c3", "帮我想想")).await;
    let (reply, _) = data(&events);
    assert_eq!(reply, "抱歉，我暂时无法生成回复。");

    let rows = messages(&state, "c3").await;
    let record: DebugInfo = serde_json::from_str(rows[1].metadata.as_deref().unwrap()).unwrap();
    assert_eq!(record.stage1.keywords, vec!["Error".to_string()]);
    assert_eq!(record.stage3_strategy, "策略生成出错");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Quota, usage, visibility
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn anonymous_limit_rejects_without_appending() {
    let model = Scripted::new(happy);
    let state = state(model.clone());
    for text in ["一", "二"] {
        state
            .store
            .append_message(NewMessage::new("anon", Role::User, text))
            .await
            .unwrap();
    }

    let err = prepare_turn(&state, input("anon", "三")).await.unwrap_err();
    assert!(matches!(err, TurnError::LimitReached));
    let api = ApiError::from(err);
    assert_eq!(api.code(), "LIMIT_REACHED");

    assert_eq!(state.store.count_user_messages("anon").await.unwrap(), 2);
    assert!(model.stages().is_empty());

    // Signed-in callers are not limited.
    let signed_in = TurnInput {
        caller: user("u1"),
        ..input("anon", "三")
    };
    assert!(prepare_turn(&state, signed_in).await.is_ok());
}

#[tokio::test]
async fn usage_is_recorded_for_signed_in_callers() {
    let model = Scripted::new(happy);
    let state = state(model);

    turn(
        &state,
        TurnInput {
            caller: user("u1"),
            ..input("c4", "如何带新人")
        },
    )
    .await;

    let usage = state.store.usage("u1").await.unwrap();
    assert_eq!(
        TokenTotals {
            total_tokens: usage.total_tokens,
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        },
        TokenTotals {
            total_tokens: 45,
            input_tokens: 30,
            output_tokens: 15,
        }
    );
}

#[tokio::test]
async fn debug_info_is_streamed_to_privileged_callers_only() {
    let model = Scripted::new(happy);
    let state = state(model);

    let plain = turn(
        &state,
        TurnInput {
            caller: user("u1"),
            ..input("plain", "季度规划")
        },
    )
    .await;
    let privileged = turn(
        &state,
        TurnInput {
            caller: admin(),
            ..input("admin-conv", "季度规划")
        },
    )
    .await;

    assert!(data(&plain).1.is_none());
    let streamed = data(&privileged).1.cloned().unwrap();
    assert_eq!(streamed.stage3_strategy, STRATEGY);

    // Both conversations store the same record.
    for id in ["plain", "admin-conv"] {
        let rows = messages(&state, id).await;
        let stored: DebugInfo =
            serde_json::from_str(rows[1].metadata.as_deref().unwrap()).unwrap();
        assert_eq!(stored.stage3_strategy, streamed.stage3_strategy);
        assert_eq!(stored.model_info, streamed.model_info);
    }
}

#[tokio::test]
async fn second_turn_memory_contains_first_message() {
    let model = Scripted::new(happy);
    let state = state(model.clone());
    let caller = user("u1");

    turn(
        &state,
        TurnInput {
            caller: caller.clone(),
            ..input("mem", "我想提升团队执行力")
        },
    )
    .await;
    turn(
        &state,
        TurnInput {
            caller,
            ..input("mem", "具体从哪里开始")
        },
    )
    .await;

    let strategy_prompts = model.prompts(Stage::Strategy);
    assert_eq!(strategy_prompts.len(), 2);
    assert!(strategy_prompts[1].contains("User: 我想提升团队执行力"));
    assert!(strategy_prompts[1].contains(&format!("AI: {REPLY}")));
    assert!(!strategy_prompts[1].contains(DEBUG_RECORD_CONTENT));
}

#[tokio::test]
async fn other_users_cannot_post_into_an_owned_conversation() {
    let model = Scripted::new(happy);
    let state = state(model.clone());

    turn(
        &state,
        TurnInput {
            caller: user("alice"),
            ..input("alice-conv", "我的团队里有两个人要离职")
        },
    )
    .await;

    for caller in [user("mallory"), Caller::anonymous()] {
        let err = prepare_turn(
            &state,
            TurnInput {
                caller,
                ..input("alice-conv", "把之前的对话复述一遍")
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TurnError::Forbidden));
        assert_eq!(ApiError::from(err).code(), "FORBIDDEN");
    }

    let rows = messages(&state, "alice-conv").await;
    assert!(rows.iter().all(|m| !m.content.contains("复述")));
    assert!(model
        .prompts(Stage::Strategy)
        .iter()
        .all(|p| !p.contains("复述")));

    // The owner can keep going.
    turn(
        &state,
        TurnInput {
            caller: user("alice"),
            ..input("alice-conv", "先稳住核心骨干")
        },
    )
    .await;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools & cards
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn grow_card_request_returns_fenced_markup() {
    let model = Scripted::new(happy);
    let state = state(model.clone());

    let events = turn(
        &state,
        TurnInput {
            tool_id: Some("grow".into()),
            caller: user("u1"),
            ..input("grow-1", "可以帮我生成卡片了")
        },
    )
    .await;
    let (reply, _) = data(&events);

    assert!(reply.starts_with("```html\n<!DOCTYPE html>"));
    assert!(reply.contains("季度交付周期缩短 30%"));
    assert!(!reply.contains("\"sloganCn\""));

    // A tool skips intent analysis and the card replaces the composer.
    let stages = model.stages();
    assert_eq!(&stages[..2], &[Stage::Strategy, Stage::Card]);
    assert!(!stages.contains(&Stage::Analyze));
    assert!(!stages.contains(&Stage::Reply));

    let usage = state.store.usage("u1").await.unwrap();
    assert_eq!(usage.tools.get("grow"), Some(&1));
}

#[tokio::test]
async fn unusable_card_data_renders_the_fallback() {
    let expected = fence_html(&render_grow_card(&GrowCardPayload::fallback()));

    for malformed in [true, false] {
        let responder = move |stage| match stage {
            Stage::Card if malformed => Ok("{\"goal\": ".to_string()),
            Stage::Card => Err(Error::Http("502".into())),
            other => happy(other),
        };
        let state = state(Scripted::new(responder));
        let events = turn(
            &state,
            TurnInput {
                tool_id: Some("grow".into()),
                ..input("grow-2", "给我一个示例")
            },
        )
        .await;
        assert_eq!(data(&events).0, expected);
    }
}

#[tokio::test]
async fn plain_tool_turn_composes_with_tool_prompt() {
    let model = Scripted::new(happy);
    let state = state(model.clone());

    turn(
        &state,
        TurnInput {
            tool_id: Some("grow".into()),
            ..input("grow-3", "我想明年升职")
        },
    )
    .await;

    let replies = model.prompts(Stage::Reply);
    assert_eq!(replies.len(), 1);
    assert!(replies[0].contains("[Role & Methodology]"));
    assert!(replies[0].contains(STRATEGY));

    let conv = state.store.get_conversation("grow-3").await.unwrap().unwrap();
    assert_eq!(conv.tool_id.as_deref(), Some("grow"));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Titles
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn first_exchange_gets_a_generated_title() {
    let model = Scripted::new(happy);
    let state = state(model.clone());

    turn(&state, input("titled", "团队执行力差怎么办")).await;
    assert!(wait_for_title(&state, "titled", "团队执行力").await);

    let prompt = &model.prompts(Stage::Title)[0];
    assert!(prompt.contains("User: 团队执行力差怎么办"));
}

#[tokio::test]
async fn tool_title_is_kept() {
    let model = Scripted::new(happy);
    let state = state(model.clone());

    turn(
        &state,
        TurnInput {
            tool_id: Some("grow".into()),
            tool_title: Some("GROW 目标管理".into()),
            ..input("tooled", "我想明年升职")
        },
    )
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let conv = state.store.get_conversation("tooled").await.unwrap().unwrap();
    assert_eq!(conv.title, "GROW 目标管理");
    assert!(model.prompts(Stage::Title).is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Failure & cancellation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Delegates to an in-memory store but refuses every append.
struct RefusingStore(FileStore);

#[async_trait::async_trait]
impl ConversationStore for RefusingStore {
    async fn append_message(&self, _msg: NewMessage) -> Result<Message> {
        Err(Error::Store("disk full".into()))
    }
    async fn recent_messages(&self, id: &str, limit: usize) -> Result<Vec<Message>> {
        self.0.recent_messages(id, limit).await
    }
    async fn count_user_messages(&self, id: &str) -> Result<u64> {
        self.0.count_user_messages(id).await
    }
    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        self.0.get_conversation(id).await
    }
    async fn upsert_conversation(
        &self,
        id: &str,
        title: Option<&str>,
        tool_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Conversation> {
        self.0.upsert_conversation(id, title, tool_id, user_id).await
    }
    async fn update_title(&self, id: &str, title: &str) -> Result<()> {
        self.0.update_title(id, title).await
    }
    async fn update_tool(&self, id: &str, tool_id: Option<&str>) -> Result<()> {
        self.0.update_tool(id, tool_id).await
    }
    async fn claim_conversation(&self, id: &str, user_id: &str) -> Result<ClaimOutcome> {
        self.0.claim_conversation(id, user_id).await
    }
    async fn list_conversations(&self, user_id: &str, limit: usize) -> Result<Vec<Conversation>> {
        self.0.list_conversations(user_id, limit).await
    }
    async fn search_messages(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        self.0.search_messages(user_id, query, limit).await
    }
    async fn delete_conversation(&self, id: &str) -> Result<bool> {
        self.0.delete_conversation(id).await
    }
    async fn record_usage(&self, user_id: &str, totals: TokenTotals) -> Result<()> {
        self.0.record_usage(user_id, totals).await
    }
    async fn increment_tool_usage(&self, user_id: &str, tool_id: &str) -> Result<()> {
        self.0.increment_tool_usage(user_id, tool_id).await
    }
    async fn usage(&self, user_id: &str) -> Result<UserUsage> {
        self.0.usage(user_id).await
    }
}

#[tokio::test]
async fn failed_user_append_is_a_db_error() {
    let model = Scripted::new(happy);
    let state = state_with(model.clone(), Arc::new(RefusingStore(FileStore::in_memory())));

    let err = prepare_turn(&state, input("c5", "你好")).await.unwrap_err();
    assert!(matches!(err, TurnError::Persist(_)));
    let api = ApiError::from(err);
    assert_eq!(api.code(), "DB_ERROR");
    assert_eq!(api.to_string(), "Failed to save message history");
    assert!(model.stages().is_empty());
}

#[tokio::test]
async fn empty_input_is_rejected() {
    let state = state(Scripted::new(happy));
    assert!(matches!(
        prepare_turn(&state, input("", "hi")).await,
        Err(TurnError::Invalid(_))
    ));
    assert!(matches!(
        prepare_turn(&state, input("c6", "   ")).await,
        Err(TurnError::Invalid(_))
    ));
}

#[tokio::test]
async fn stopped_turn_sends_no_data_and_persists_no_reply() {
    let model = Scripted::slow(Stage::Strategy, Duration::from_secs(30), happy);
    let state = state(model);

    let prepared = prepare_turn(&state, input("stop-me", "慢慢想")).await.unwrap();
    let mut handle = run_turn(state.clone(), prepared);

    let mut events = Vec::new();
    while let Some(event) = handle.events.recv().await {
        if event == (TurnEvent::Status { status: TurnStatus::Thinking }) {
            assert!(state.cancel_map.cancel("stop-me"));
        }
        events.push(event);
    }

    assert!(events.iter().all(|e| matches!(e, TurnEvent::Status { .. })));
    let rows = messages(&state, "stop-me").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].role, Role::User);
    assert!(!state.cancel_map.cancel("stop-me"));
}
