use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A stored conversation.
///
/// `user_id == None` means the conversation is anonymous. The transition to
/// an owned conversation is one-way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tool_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// Whether `user_id` may read or modify this conversation.
    /// Anonymous conversations are open to everyone.
    pub fn accessible_by(&self, user_id: Option<&str>) -> bool {
        match &self.user_id {
            None => true,
            Some(owner) => user_id == Some(owner.as_str()),
        }
    }
}

/// Fallback title when neither an explicit title nor a first message exists.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Characters of the first message used for an implicit title.
const IMPLICIT_TITLE_CHARS: usize = 20;

/// Title for a conversation created implicitly by its first message.
pub fn implicit_title(explicit: Option<&str>, first_message: &str) -> String {
    if let Some(t) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return t.to_owned();
    }
    let trimmed = first_message.trim();
    if trimmed.is_empty() {
        return DEFAULT_TITLE.to_owned();
    }
    let head: String = trimmed.chars().take(IMPLICIT_TITLE_CHARS).collect();
    format!("{head}...")
}

/// Outcome of an ownership claim on an anonymous conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyOwned,
    OwnedByOther,
    NotFound,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Ai,
}

impl Role {
    /// Speaker label used in memory transcripts.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Ai => "AI",
        }
    }
}

/// Message kind. `text` rows are conversational, `analysis` rows carry the
/// per-turn debug record; anything else round-trips as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    #[default]
    Text,
    Analysis,
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Analysis => "analysis",
            MessageKind::Other(s) => s,
        }
    }
}

impl From<String> for MessageKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" | "text" => MessageKind::Text,
            "analysis" => MessageKind::Analysis,
            _ => MessageKind::Other(s),
        }
    }
}

impl From<MessageKind> for String {
    fn from(k: MessageKind) -> Self {
        k.as_str().to_owned()
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable stored message. `id` is assigned by the store and is the
/// only ordering key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub conversation_id: String,
    pub role: Role,
    #[serde(default)]
    pub kind: MessageKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Rows the memory reader treats as conversation: text rows, plus any
    /// user-authored row regardless of kind.
    pub fn is_conversational(&self) -> bool {
        self.kind == MessageKind::Text || self.role == Role::User
    }
}

/// A message to append. Conversation-creation hints (`title`, `tool_id`)
/// only apply when the conversation does not exist yet; `user_id` claims an
/// anonymous conversation.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub role: Role,
    pub kind: MessageKind,
    pub content: String,
    pub metadata: Option<String>,
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub tool_id: Option<String>,
}

impl NewMessage {
    pub fn new(conversation_id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            role,
            kind: MessageKind::Text,
            content: content.into(),
            metadata: None,
            user_id: None,
            title: None,
            tool_id: None,
        }
    }

    pub fn kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn tool(mut self, tool_id: Option<String>) -> Self {
        self.tool_id = tool_id;
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A text message matched by a search, with its conversation's title.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub message_id: u64,
    pub conversation_id: String,
    pub conversation_title: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

const SNIPPET_BEFORE: usize = 30;
const SNIPPET_AFTER: usize = 70;
/// Leading characters shown when only the title matched.
const SNIPPET_HEAD: usize = 100;

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Char offset of the first case-insensitive occurrence of `needle`.
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let pat: Vec<char> = needle.chars().map(fold).collect();
    if pat.is_empty() {
        return Some(0);
    }
    let hay: Vec<char> = haystack.chars().map(fold).collect();
    hay.windows(pat.len()).position(|w| w == pat.as_slice())
}

/// Excerpt of `content` around the first match of `query`, marked with
/// `...` where text was cut. Falls back to the head of the content.
pub fn search_snippet(content: &str, query: &str) -> String {
    let chars: Vec<char> = content.chars().collect();
    let (start, end) = match find_ignore_case(content, query) {
        Some(at) => (
            at.saturating_sub(SNIPPET_BEFORE),
            (at + query.chars().count() + SNIPPET_AFTER).min(chars.len()),
        ),
        None => (0, SNIPPET_HEAD.min(chars.len())),
    };

    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.extend(&chars[start..end]);
    if end < chars.len() {
        out.push_str("...");
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Usage counters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Cumulative per-user token and tool usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUsage {
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub turns: u64,
    #[serde(default)]
    pub tools: HashMap<String, u64>,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}
