//! Turn orchestration.
//!
//! A turn is split in two. [`prepare_turn`] runs before any response is
//! opened: it validates input, applies the anonymous quota and persists the
//! user message, so its failures map to plain HTTP errors. [`run_turn`]
//! then spawns the pipeline and returns a channel of [`TurnEvent`]s:
//!
//! `analyzing` (memory ‖ stage 1) → `thinking` (stage 3) → `replying`
//! (apology | card | stage 4) → debug record + reply persisted → `data`.

use std::future::Future;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::Instrument;

use ei_domain::analysis::{DebugInfo, DEBUG_RECORD_CONTENT};
use ei_domain::conversation::{MessageKind, NewMessage, Role};
use ei_domain::error::Error;
use ei_domain::stream::TokenTotals;
use ei_domain::trace::TraceEvent;
use ei_pipeline::analyzer::{self, AnalysisOutcome};
use ei_pipeline::artifact;
use ei_pipeline::composer::{self, ComposerPrompt, NO_STRATEGY_REPLY};
use ei_pipeline::memory::recent_transcript;
use ei_pipeline::strategist;
use ei_pipeline::PipelineConfig;

use crate::auth::Caller;
use crate::state::AppState;

use super::cancel::CancelToken;
use super::quota::{self, QuotaDecision};
use super::title::{spawn_title_job, TitleJob};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Analyzing,
    Thinking,
    Replying,
}

/// One line of the NDJSON response stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TurnEvent {
    Status { status: TurnStatus },
    Data {
        reply: String,
        /// Present for privileged callers only.
        #[serde(skip_serializing_if = "Option::is_none")]
        debug_info: Option<DebugInfo>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Input & errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub conversation_id: String,
    pub message: String,
    pub tool_id: Option<String>,
    /// Set when the client opened the conversation from a tool card; it
    /// becomes the conversation title and suppresses generated titles.
    pub tool_title: Option<String>,
    pub provider: Option<String>,
    pub persona: Option<String>,
    pub caller: Caller,
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("{0}")]
    Invalid(String),
    #[error("Anonymous limit reached")]
    LimitReached,
    #[error("conversation belongs to another user")]
    Forbidden,
    #[error("Failed to check message quota")]
    Quota(#[source] Error),
    #[error("Failed to save message history")]
    Persist(#[source] Error),
}

/// A turn whose user message is already stored.
#[derive(Debug, Clone)]
pub struct PreparedTurn {
    pub input: TurnInput,
    pub config: PipelineConfig,
}

/// Handle on a spawned turn.
pub struct TurnHandle {
    pub events: mpsc::Receiver<TurnEvent>,
    pub cancel: CancelToken,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// prepare_turn
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn prepare_turn(state: &AppState, mut input: TurnInput) -> Result<PreparedTurn, TurnError> {
    input.conversation_id = input.conversation_id.trim().to_owned();
    if input.conversation_id.is_empty() {
        return Err(TurnError::Invalid("conversationId is required".into()));
    }
    if input.message.trim().is_empty() {
        return Err(TurnError::Invalid("message is required".into()));
    }
    input.tool_id = input.tool_id.filter(|t| !t.trim().is_empty());
    input.tool_title = input.tool_title.filter(|t| !t.trim().is_empty());

    let existing = state
        .store
        .get_conversation(&input.conversation_id)
        .await
        .map_err(TurnError::Persist)?;
    if let Some(conv) = existing {
        if !conv.accessible_by(input.caller.user_id()) {
            tracing::warn!(
                conversation_id = %input.conversation_id,
                "chat rejected: conversation belongs to another user"
            );
            return Err(TurnError::Forbidden);
        }
    }

    if input.caller.is_anonymous() {
        let decision = quota::check_anonymous(
            state.store.as_ref(),
            &input.conversation_id,
            state.config.quota.anonymous_message_limit,
        )
        .await
        .map_err(TurnError::Quota)?;
        if let QuotaDecision::LimitReached { .. } = decision {
            return Err(TurnError::LimitReached);
        }
    }

    let user_message = NewMessage::new(&input.conversation_id, Role::User, &input.message)
        .user(input.caller.user_id.clone())
        .title(input.tool_title.clone())
        .tool(input.tool_id.clone());
    if let Err(e) = state.store.append_message(user_message).await {
        tracing::error!(
            conversation_id = %input.conversation_id,
            error = %e,
            "failed to persist user message"
        );
        return Err(TurnError::Persist(e));
    }

    let config = PipelineConfig::from_request(
        &state.config.pipeline,
        input.provider.as_deref(),
        input.persona.as_deref(),
    );
    Ok(PreparedTurn { input, config })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// run_turn
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Spawn the pipeline for a prepared turn.
///
/// The turn registers a cancel token under its conversation id. Once
/// cancelled it stops at the next model call: nothing further is
/// persisted and no `data` event is sent.
pub fn run_turn(state: AppState, turn: PreparedTurn) -> TurnHandle {
    let (tx, rx) = mpsc::channel::<TurnEvent>(64);
    let conversation_id = turn.input.conversation_id.clone();
    let (turn_id, cancel) = state.cancel_map.register(&conversation_id);
    let token = cancel.clone();

    let turn_span = tracing::info_span!(
        "turn",
        conversation_id = %conversation_id,
        tool_id = turn.input.tool_id.as_deref().unwrap_or(""),
        provider = %turn.config.provider,
        "otel.kind" = "SERVER",
    );
    tokio::spawn(
        async move {
            tracing::debug!("turn started");
            if run_turn_inner(&state, turn, &tx, &token).await.is_none() {
                tracing::info!("turn cancelled");
            }
            state.cancel_map.remove(&conversation_id, turn_id);
        }
        .instrument(turn_span),
    );

    TurnHandle { events: rx, cancel }
}

/// Run `fut` unless the turn is cancelled first.
async fn guarded<T>(cancel: &CancelToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

async fn emit(tx: &mpsc::Sender<TurnEvent>, event: TurnEvent) {
    if tx.send(event).await.is_err() {
        tracing::debug!("turn receiver dropped");
    }
}

/// Returns `None` when the turn was cancelled.
async fn run_turn_inner(
    state: &AppState,
    turn: PreparedTurn,
    tx: &mpsc::Sender<TurnEvent>,
    cancel: &CancelToken,
) -> Option<()> {
    let PreparedTurn { input, config } = turn;
    let conversation_id = input.conversation_id.as_str();

    // ── Analyze: memory ‖ stage 1 ────────────────────────────────────
    emit(tx, TurnEvent::Status { status: TurnStatus::Analyzing }).await;

    let tool_prompt = state.tools.effective_prompt(input.tool_id.as_deref());
    let tool_active = tool_prompt.is_some();

    let mut memory_task = {
        let store = state.store.clone();
        let settings = state.config.pipeline.memory.clone();
        let conversation_id = conversation_id.to_owned();
        tokio::spawn(
            async move { recent_transcript(store.as_ref(), &conversation_id, &settings).await }
                .instrument(tracing::info_span!("stage", stage = "memory")),
        )
    };
    let mut analysis_task = {
        let gateway = state.gateway.clone();
        let stage = config.stage1.clone();
        let message = input.message.clone();
        tokio::spawn(
            async move { analyzer::analyze(&gateway, &stage, &message, tool_active).await }
                .instrument(tracing::info_span!("stage", stage = "stage1")),
        )
    };

    let joined = guarded(cancel, async {
        tokio::join!(&mut memory_task, &mut analysis_task)
    })
    .await;
    let Some((memory, analysis)) = joined else {
        memory_task.abort();
        analysis_task.abort();
        return None;
    };
    let memory = memory.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "memory task failed");
        String::new()
    });
    let analysis = analysis.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "analysis task failed");
        AnalysisOutcome::fallback()
    });

    // ── Think: stage 3 ───────────────────────────────────────────────
    emit(tx, TurnEvent::Status { status: TurnStatus::Thinking }).await;

    let strategy = guarded(
        cancel,
        strategist::think(
            &state.gateway,
            &config.stage3,
            &input.message,
            &analysis.analysis,
            &memory,
            tool_prompt.as_deref(),
        )
        .instrument(tracing::info_span!("stage", stage = "stage3")),
    )
    .await?;

    // ── Reply: apology | card | stage 4 ──────────────────────────────
    emit(tx, TurnEvent::Status { status: TurnStatus::Replying }).await;

    let mut totals = TokenTotals::default();
    totals.add(analysis.usage.as_ref());
    totals.add(strategy.usage.as_ref());

    let trigger = state
        .trigger
        .detect(input.tool_id.as_deref(), &input.message);
    let mut has_card = false;
    let mut card_fallback = false;

    let reply = match (&strategy.strategy, trigger, tool_prompt.as_deref()) {
        (None, _, _) => {
            tracing::warn!("no strategy produced, replying with apology");
            NO_STRATEGY_REPLY.to_owned()
        }
        (Some(plan), Some(kind), Some(tool)) => {
            let card = guarded(
                cancel,
                artifact::build_grow_card(
                    &state.gateway,
                    &config.stage4,
                    kind,
                    &input.message,
                    tool,
                    Some(plan.as_str()),
                )
                .instrument(tracing::info_span!("stage", stage = "artifact")),
            )
            .await?;
            totals.add(card.usage.as_ref());
            has_card = true;
            card_fallback = card.used_fallback;
            card.reply
        }
        (Some(plan), _, tool) => {
            let prompt = ComposerPrompt::select(None, tool, config.effective_persona());
            let out = guarded(
                cancel,
                composer::compose(&state.gateway, &config.stage4, plan, prompt)
                    .instrument(tracing::info_span!("stage", stage = "stage4")),
            )
            .await?;
            totals.add(out.usage.as_ref());
            out.reply
        }
    };

    if cancel.is_cancelled() {
        return None;
    }

    // ── Usage ────────────────────────────────────────────────────────
    if let Some(user_id) = input.caller.user_id() {
        if let Err(e) = state.store.record_usage(user_id, totals).await {
            tracing::warn!(user_id = %user_id, error = %e, "failed to record usage");
        }
        if let Some(tool_id) = input.tool_id.as_deref().filter(|_| tool_active) {
            if let Err(e) = state.store.increment_tool_usage(user_id, tool_id).await {
                tracing::warn!(user_id = %user_id, error = %e, "failed to record tool usage");
            }
        }
    }

    // ── Persist: debug record, then reply ────────────────────────────
    let debug = DebugInfo::new(
        config.provider.id(),
        config.model_info(),
        analysis.analysis,
        &memory,
        strategy.strategy.as_deref(),
    );
    match serde_json::to_string(&debug) {
        Ok(metadata) => {
            let record = NewMessage::new(conversation_id, Role::Ai, DEBUG_RECORD_CONTENT)
                .kind(MessageKind::Analysis)
                .metadata(metadata);
            if let Err(e) = state.store.append_message(record).await {
                tracing::warn!(error = %e, "failed to persist debug record");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to encode debug record"),
    }
    if let Err(e) = state
        .store
        .append_message(NewMessage::new(conversation_id, Role::Ai, &reply))
        .await
    {
        tracing::warn!(error = %e, "failed to persist reply");
    }

    tracing::info!(
        conversation_id = %conversation_id,
        tool_id = input.tool_id.as_deref().unwrap_or(""),
        total_tokens = totals.total_tokens,
        input_tokens = totals.input_tokens,
        output_tokens = totals.output_tokens,
        model = %config.stage4.model,
        has_card,
        card_fallback,
        "chat completed"
    );
    TraceEvent::TurnCompleted {
        conversation_id: conversation_id.to_owned(),
        tool_id: input.tool_id.clone(),
        total_tokens: totals.total_tokens,
        model: config.stage4.model.clone(),
        has_card,
    }
    .emit();

    let debug_info = input.caller.privileged.then_some(debug);
    emit(tx, TurnEvent::Data { reply: reply.clone(), debug_info }).await;

    // ── Title ────────────────────────────────────────────────────────
    if input.tool_title.is_none() {
        spawn_title_job(
            state.gateway.clone(),
            state.store.clone(),
            TitleJob {
                conversation_id: conversation_id.to_owned(),
                user_message: input.message,
                reply,
                config: config.stage1,
                max_chars: state.config.pipeline.title.max_chars,
            },
        );
    }

    Some(())
}
