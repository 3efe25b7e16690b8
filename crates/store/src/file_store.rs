//! File-backed conversation store.
//!
//! Layout under `<state_path>/conversations/`:
//! - `index.json`: conversations, per-user usage counters and the next
//!   message id, rewritten atomically after every mutation.
//! - `messages/<sha256 of id>.jsonl`: one append-only JSON line per message.
//!
//! Message transcripts are loaded lazily into a write-through cache so a
//! conversation is read from disk at most once per process.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use ei_domain::conversation::{
    find_ignore_case, implicit_title, ClaimOutcome, Conversation, Message, MessageKind,
    NewMessage, Role, SearchHit, UserUsage, DEFAULT_TITLE,
};
use ei_domain::error::{Error, Result};
use ei_domain::stream::TokenTotals;
use ei_domain::trace::TraceEvent;

use crate::traits::ConversationStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Index
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreIndex {
    /// Next id to hand out. Persisted before the message line is written,
    /// so a crash can leave a gap but never a duplicate.
    #[serde(default)]
    next_message_id: u64,
    #[serde(default)]
    conversations: HashMap<String, Conversation>,
    #[serde(default)]
    usage: HashMap<String, UserUsage>,
}

impl StoreIndex {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_message_id.max(1);
        self.next_message_id = id + 1;
        id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FileStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct FileStore {
    /// `None` keeps everything in memory.
    dir: Option<PathBuf>,
    index: RwLock<StoreIndex>,
    messages: RwLock<HashMap<String, Vec<Message>>>,
    /// Serializes mutations so index snapshots hit disk in order.
    io: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Load or create the store at `state_path/conversations`.
    pub fn open(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("conversations");
        std::fs::create_dir_all(dir.join("messages"))?;

        let index_path = dir.join("index.json");
        let index = if index_path.exists() {
            let raw = std::fs::read_to_string(&index_path)?;
            serde_json::from_str(&raw).map_err(|e| {
                Error::Store(format!("parsing {}: {e}", index_path.display()))
            })?
        } else {
            StoreIndex::default()
        };

        tracing::info!(
            path = %dir.display(),
            conversations = index.conversations.len(),
            "conversation store opened"
        );

        Ok(Self {
            dir: Some(dir),
            index: RwLock::new(index),
            messages: RwLock::new(HashMap::new()),
            io: tokio::sync::Mutex::new(()),
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            index: RwLock::new(StoreIndex::default()),
            messages: RwLock::new(HashMap::new()),
            io: tokio::sync::Mutex::new(()),
        }
    }

    // ── Private helpers ───────────────────────────────────────────────

    fn index_path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join("index.json"))
    }

    fn transcript_path(&self, conversation_id: &str) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| {
            d.join("messages")
                .join(format!("{}.jsonl", file_stem(conversation_id)))
        })
    }

    /// Make sure the conversation's transcript is cached. Returns `false`
    /// when the conversation does not exist.
    async fn ensure_loaded(&self, conversation_id: &str) -> Result<bool> {
        if self.messages.read().contains_key(conversation_id) {
            return Ok(true);
        }
        if !self.index.read().conversations.contains_key(conversation_id) {
            return Ok(false);
        }

        let loaded = match self.transcript_path(conversation_id) {
            Some(path) => {
                let cid = conversation_id.to_owned();
                tokio::task::spawn_blocking(move || read_jsonl_file(&path, &cid))
                    .await
                    .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??
            }
            None => Vec::new(),
        };

        self.messages
            .write()
            .entry(conversation_id.to_owned())
            .or_insert(loaded);
        Ok(true)
    }

    /// Persist the index. Callers hold `io`.
    async fn flush_index(&self) -> Result<()> {
        let Some(path) = self.index_path() else {
            return Ok(());
        };
        let json = {
            let index = self.index.read();
            serde_json::to_string_pretty(&*index)?
        };
        tokio::task::spawn_blocking(move || write_atomic(&path, json.as_bytes()))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;
        Ok(())
    }

    async fn append_line(&self, message: &Message) -> Result<()> {
        let Some(path) = self.transcript_path(&message.conversation_id) else {
            return Ok(());
        };
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        tokio::task::spawn_blocking(move || {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            file.write_all(line.as_bytes())?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;
        Ok(())
    }

    fn mutate_conversation<F>(&self, conversation_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Conversation),
    {
        let mut index = self.index.write();
        let conv = index
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| Error::NotFound(format!("conversation {conversation_id}")))?;
        f(conv);
        Ok(())
    }

    /// Put a conversation's index entry back the way it was before a failed
    /// append. The allocated message id stays consumed. Callers hold `io`.
    async fn restore_conversation(&self, conversation_id: &str, previous: Option<Conversation>) {
        {
            let mut index = self.index.write();
            match previous {
                Some(conv) => {
                    index.conversations.insert(conversation_id.to_owned(), conv);
                }
                None => {
                    index.conversations.remove(conversation_id);
                }
            }
        }
        if let Err(e) = self.flush_index().await {
            tracing::warn!(
                conversation_id = conversation_id,
                error = %e,
                "failed to persist index rollback"
            );
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ConversationStore impl
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ConversationStore for FileStore {
    async fn append_message(&self, msg: NewMessage) -> Result<Message> {
        let _io = self.io.lock().await;
        self.ensure_loaded(&msg.conversation_id).await?;

        let now = Utc::now();
        let (message, claimed, previous) = {
            let mut index = self.index.write();
            let id = index.allocate_id();
            let previous = index.conversations.get(&msg.conversation_id).cloned();
            let mut claimed = false;
            let conv = index
                .conversations
                .entry(msg.conversation_id.clone())
                .or_insert_with(|| Conversation {
                    id: msg.conversation_id.clone(),
                    title: implicit_title(msg.title.as_deref(), &msg.content),
                    user_id: msg.user_id.clone(),
                    tool_id: msg.tool_id.clone(),
                    created_at: now,
                    updated_at: now,
                });
            if conv.user_id.is_none() {
                if let Some(ref uid) = msg.user_id {
                    conv.user_id = Some(uid.clone());
                    claimed = true;
                }
            }
            conv.updated_at = now;

            let message = Message {
                id,
                conversation_id: msg.conversation_id.clone(),
                role: msg.role,
                kind: msg.kind,
                content: msg.content,
                metadata: msg.metadata,
                created_at: now,
            };
            (message, claimed, previous)
        };

        let written = match self.flush_index().await {
            Ok(()) => self.append_line(&message).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.restore_conversation(&message.conversation_id, previous)
                .await;
            return Err(e);
        }

        self.messages
            .write()
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());

        if claimed {
            if let Some(uid) = msg.user_id {
                TraceEvent::ConversationClaimed {
                    conversation_id: message.conversation_id.clone(),
                    user_id: uid,
                }
                .emit();
            }
        }
        TraceEvent::MessageAppended {
            conversation_id: message.conversation_id.clone(),
            message_id: message.id,
            role: format!("{:?}", message.role).to_lowercase(),
            kind: message.kind.to_string(),
        }
        .emit();

        Ok(message)
    }

    async fn recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>> {
        if !self.ensure_loaded(conversation_id).await? {
            return Ok(Vec::new());
        }
        let cache = self.messages.read();
        let all = cache.get(conversation_id).map(Vec::as_slice).unwrap_or(&[]);
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }

    async fn count_user_messages(&self, conversation_id: &str) -> Result<u64> {
        if !self.ensure_loaded(conversation_id).await? {
            return Ok(0);
        }
        let cache = self.messages.read();
        Ok(cache
            .get(conversation_id)
            .map(|msgs| msgs.iter().filter(|m| m.role == Role::User).count() as u64)
            .unwrap_or(0))
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        Ok(self.index.read().conversations.get(conversation_id).cloned())
    }

    async fn upsert_conversation(
        &self,
        conversation_id: &str,
        title: Option<&str>,
        tool_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Conversation> {
        let _io = self.io.lock().await;
        let now = Utc::now();
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let conv = {
            let mut index = self.index.write();
            let conv = index
                .conversations
                .entry(conversation_id.to_owned())
                .or_insert_with(|| Conversation {
                    id: conversation_id.to_owned(),
                    title: title.unwrap_or(DEFAULT_TITLE).to_owned(),
                    user_id: None,
                    tool_id: None,
                    created_at: now,
                    updated_at: now,
                });
            if let Some(t) = title {
                conv.title = t.to_owned();
            }
            if let Some(tool) = tool_id {
                conv.tool_id = Some(tool.to_owned());
            }
            if conv.user_id.is_none() {
                conv.user_id = user_id.map(str::to_owned);
            }
            conv.updated_at = now;
            conv.clone()
        };
        self.flush_index().await?;
        Ok(conv)
    }

    async fn update_title(&self, conversation_id: &str, title: &str) -> Result<()> {
        let _io = self.io.lock().await;
        self.mutate_conversation(conversation_id, |c| c.title = title.to_owned())?;
        self.flush_index().await
    }

    async fn update_tool(&self, conversation_id: &str, tool_id: Option<&str>) -> Result<()> {
        let _io = self.io.lock().await;
        self.mutate_conversation(conversation_id, |c| c.tool_id = tool_id.map(str::to_owned))?;
        self.flush_index().await
    }

    async fn claim_conversation(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<ClaimOutcome> {
        let _io = self.io.lock().await;
        let outcome = {
            let mut index = self.index.write();
            match index.conversations.get_mut(conversation_id) {
                None => ClaimOutcome::NotFound,
                Some(conv) => match conv.user_id.as_deref() {
                    Some(owner) if owner == user_id => ClaimOutcome::AlreadyOwned,
                    Some(_) => ClaimOutcome::OwnedByOther,
                    None => {
                        conv.user_id = Some(user_id.to_owned());
                        ClaimOutcome::Claimed
                    }
                },
            }
        };
        if outcome == ClaimOutcome::Claimed {
            self.flush_index().await?;
            TraceEvent::ConversationClaimed {
                conversation_id: conversation_id.to_owned(),
                user_id: user_id.to_owned(),
            }
            .emit();
        }
        Ok(outcome)
    }

    async fn list_conversations(&self, user_id: &str, limit: usize) -> Result<Vec<Conversation>> {
        let index = self.index.read();
        let mut owned: Vec<Conversation> = index
            .conversations
            .values()
            .filter(|c| c.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        owned.truncate(limit);
        Ok(owned)
    }

    async fn search_messages(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let owned: Vec<(String, String)> = self
            .index
            .read()
            .conversations
            .values()
            .filter(|c| c.user_id.as_deref() == Some(user_id))
            .map(|c| (c.id.clone(), c.title.clone()))
            .collect();
        for (id, _) in &owned {
            self.ensure_loaded(id).await?;
        }

        let cache = self.messages.read();
        let mut hits = Vec::new();
        for (id, title) in &owned {
            let title_matches = find_ignore_case(title, query).is_some();
            let rows = cache.get(id).map(Vec::as_slice).unwrap_or(&[]);
            for m in rows.iter().filter(|m| m.kind == MessageKind::Text) {
                if title_matches || find_ignore_case(&m.content, query).is_some() {
                    hits.push(SearchHit {
                        message_id: m.id,
                        conversation_id: id.clone(),
                        conversation_title: title.clone(),
                        role: m.role,
                        content: m.content.clone(),
                        created_at: m.created_at,
                    });
                }
            }
        }
        hits.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.message_id.cmp(&a.message_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        let _io = self.io.lock().await;
        let removed = self
            .index
            .write()
            .conversations
            .remove(conversation_id)
            .is_some();
        if !removed {
            return Ok(false);
        }
        self.flush_index().await?;
        self.messages.write().remove(conversation_id);

        if let Some(path) = self.transcript_path(conversation_id) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(true)
    }

    async fn record_usage(&self, user_id: &str, totals: TokenTotals) -> Result<()> {
        let _io = self.io.lock().await;
        {
            let mut index = self.index.write();
            let usage = index.usage.entry(user_id.to_owned()).or_default();
            usage.total_tokens += totals.total_tokens;
            usage.input_tokens += totals.input_tokens;
            usage.output_tokens += totals.output_tokens;
            usage.turns += 1;
            usage.last_active = Some(Utc::now());
        }
        self.flush_index().await
    }

    async fn increment_tool_usage(&self, user_id: &str, tool_id: &str) -> Result<()> {
        let _io = self.io.lock().await;
        {
            let mut index = self.index.write();
            let usage = index.usage.entry(user_id.to_owned()).or_default();
            *usage.tools.entry(tool_id.to_owned()).or_insert(0) += 1;
        }
        self.flush_index().await
    }

    async fn usage(&self, user_id: &str) -> Result<UserUsage> {
        Ok(self
            .index
            .read()
            .usage
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Transcript file name for a client-supplied conversation id: the hex
/// SHA-256 of the id, so every id maps to a fixed-length, distinct name.
fn file_stem(conversation_id: &str) -> String {
    hex::encode(Sha256::digest(conversation_id.as_bytes()))
}

/// Write via a sibling temp file and rename, so readers never see a
/// half-written index.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read and parse a JSONL transcript file, skipping malformed lines and
/// lines that belong to another conversation.
fn read_jsonl_file(path: &Path, conversation_id: &str) -> Result<Vec<Message>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path)?;
    let mut messages = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Message>(line) {
            Ok(m) if m.conversation_id == conversation_id => messages.push(m),
            Ok(m) => {
                tracing::warn!(
                    conversation_id = conversation_id,
                    found = %m.conversation_id,
                    "skipping message line from another conversation"
                );
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = conversation_id,
                    error = %e,
                    "skipping malformed message line"
                );
            }
        }
    }
    messages.sort_by_key(|m| m.id);
    Ok(messages)
}
