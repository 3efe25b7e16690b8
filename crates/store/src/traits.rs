use ei_domain::conversation::{
    ClaimOutcome, Conversation, Message, NewMessage, SearchHit, UserUsage,
};
use ei_domain::error::Result;
use ei_domain::stream::TokenTotals;

/// Durable conversation storage.
///
/// Implementations assign message ids from a monotonic counter and never
/// rewrite a stored message. No cross-call locking is implied: concurrent
/// turns on one conversation interleave, and title/`updated_at` writes are
/// last-writer-wins.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append a message, creating the conversation first if it is absent and
    /// claiming it for `msg.user_id` if it is still anonymous. Bumps
    /// `updated_at`.
    async fn append_message(&self, msg: NewMessage) -> Result<Message>;

    /// The last `limit` messages of a conversation, oldest first.
    async fn recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>>;

    /// Number of user-authored messages in a conversation.
    async fn count_user_messages(&self, conversation_id: &str) -> Result<u64>;

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    /// Create a conversation, or update title/tool of an existing one.
    async fn upsert_conversation(
        &self,
        conversation_id: &str,
        title: Option<&str>,
        tool_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Conversation>;

    async fn update_title(&self, conversation_id: &str, title: &str) -> Result<()>;

    async fn update_tool(&self, conversation_id: &str, tool_id: Option<&str>) -> Result<()>;

    /// Claim an anonymous conversation for `user_id`.
    async fn claim_conversation(&self, conversation_id: &str, user_id: &str)
        -> Result<ClaimOutcome>;

    /// Conversations owned by `user_id`, most recently updated first.
    async fn list_conversations(&self, user_id: &str, limit: usize) -> Result<Vec<Conversation>>;

    /// Text messages in `user_id`'s conversations whose content, or whose
    /// conversation title, contains `query` ignoring case. Newest first.
    /// A blank query matches nothing.
    async fn search_messages(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    /// Delete a conversation and its messages. Returns `false` if absent.
    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool>;

    /// Add one turn's token totals to the user's cumulative counters.
    async fn record_usage(&self, user_id: &str, totals: TokenTotals) -> Result<()>;

    /// Count one use of `tool_id` by `user_id`.
    async fn increment_tool_usage(&self, user_id: &str, tool_id: &str) -> Result<()>;

    async fn usage(&self, user_id: &str) -> Result<UserUsage>;
}
