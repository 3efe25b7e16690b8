//! Anonymous usage gate.
//!
//! Anonymous callers may send a fixed number of messages per conversation
//! before they must sign in. Authenticated callers are never limited here.

use ei_domain::error::Result;
use ei_store::ConversationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed,
    LimitReached { used: u64, limit: u64 },
}

/// Check whether an anonymous caller may post another message to
/// `conversation_id`.
pub async fn check_anonymous(
    store: &dyn ConversationStore,
    conversation_id: &str,
    limit: u64,
) -> Result<QuotaDecision> {
    let used = store.count_user_messages(conversation_id).await?;
    if used >= limit {
        tracing::info!(
            conversation_id = %conversation_id,
            used,
            limit,
            "anonymous message limit reached"
        );
        return Ok(QuotaDecision::LimitReached { used, limit });
    }
    Ok(QuotaDecision::Allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ei_domain::conversation::{NewMessage, Role};
    use ei_store::FileStore;

    #[tokio::test]
    async fn counts_only_user_messages() {
        let store = FileStore::in_memory();
        store
            .append_message(NewMessage::new("c", Role::User, "one"))
            .await
            .unwrap();
        store
            .append_message(NewMessage::new("c", Role::Ai, "reply"))
            .await
            .unwrap();

        assert_eq!(
            check_anonymous(&store, "c", 2).await.unwrap(),
            QuotaDecision::Allowed
        );

        store
            .append_message(NewMessage::new("c", Role::User, "two"))
            .await
            .unwrap();
        assert_eq!(
            check_anonymous(&store, "c", 2).await.unwrap(),
            QuotaDecision::LimitReached { used: 2, limit: 2 }
        );
    }

    #[tokio::test]
    async fn zero_limit_rejects_fresh_conversation() {
        let store = FileStore::in_memory();
        assert!(matches!(
            check_anonymous(&store, "new", 0).await.unwrap(),
            QuotaDecision::LimitReached { used: 0, .. }
        ));
    }
}
