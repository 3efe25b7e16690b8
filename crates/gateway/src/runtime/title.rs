//! Background title generation after a conversation's first exchange.

use std::sync::Arc;

use tracing::Instrument;

use ei_domain::error::Result;
use ei_domain::trace::TraceEvent;
use ei_pipeline::title::generate_title;
use ei_pipeline::{ModelGateway, StageConfig};
use ei_store::ConversationStore;

/// Rows inspected when deciding whether a conversation is still on its
/// first exchange. Every analysis row is paired with a reply, so a
/// conversation this long is always past it.
const SCAN_ROWS: usize = 32;

/// Conversational messages allowed before titling stops.
const MAX_MESSAGES_FOR_TITLE: usize = 2;

pub struct TitleJob {
    pub conversation_id: String,
    pub user_message: String,
    pub reply: String,
    pub config: StageConfig,
    pub max_chars: usize,
}

/// Spawn the job. It is never awaited by the turn and reports failures
/// only through the log.
pub fn spawn_title_job(
    gateway: ModelGateway,
    store: Arc<dyn ConversationStore>,
    job: TitleJob,
) -> tokio::task::JoinHandle<()> {
    let span = tracing::info_span!("title", conversation_id = %job.conversation_id);
    tokio::spawn(
        async move {
            if let Err(e) = run(&gateway, store.as_ref(), &job).await {
                tracing::warn!(error = %e, "title job failed");
            }
        }
        .instrument(span),
    )
}

async fn run(gateway: &ModelGateway, store: &dyn ConversationStore, job: &TitleJob) -> Result<()> {
    let rows = store.recent_messages(&job.conversation_id, SCAN_ROWS).await?;
    let conversational = rows.iter().filter(|m| m.is_conversational()).count();
    if rows.len() >= SCAN_ROWS || conversational > MAX_MESSAGES_FOR_TITLE {
        tracing::debug!(conversational, "conversation past first exchange, keeping title");
        return Ok(());
    }

    let Some(title) = generate_title(
        gateway,
        &job.config,
        &job.user_message,
        &job.reply,
        job.max_chars,
    )
    .await
    else {
        return Ok(());
    };

    store.update_title(&job.conversation_id, &title).await?;
    TraceEvent::TitleGenerated {
        conversation_id: job.conversation_id.clone(),
        title,
    }
    .emit();
    Ok(())
}
