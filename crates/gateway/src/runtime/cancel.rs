//! Per-conversation cancellation tokens.
//!
//! Each running turn registers a [`CancelToken`] under its conversation id.
//! `POST /v1/conversations/:id/stop` cancels it through the [`CancelMap`];
//! the streaming response cancels it through a [`CancelOnDrop`] guard when
//! the client goes away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }
}

/// Cancels the wrapped token when dropped.
pub struct CancelOnDrop(CancelToken);

impl CancelOnDrop {
    pub fn new(token: CancelToken) -> Self {
        Self(token)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Active turn tokens keyed by conversation id.
///
/// Each registration gets its own turn id, so a turn that finishes late
/// cannot unregister a newer turn on the same conversation.
#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<String, (u64, CancelToken)>>,
    next_turn: AtomicU64,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token, replacing any previous one for the key.
    /// Returns the turn id to hand back to [`CancelMap::remove`].
    pub fn register(&self, conversation_id: &str) -> (u64, CancelToken) {
        let turn_id = self.next_turn.fetch_add(1, Ordering::Relaxed);
        let token = CancelToken::new();
        self.tokens
            .lock()
            .insert(conversation_id.to_owned(), (turn_id, token.clone()));
        (turn_id, token)
    }

    /// Cancel the running turn. Returns true if one was registered.
    pub fn cancel(&self, conversation_id: &str) -> bool {
        match self.tokens.lock().get(conversation_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Unregister `turn_id`. A no-op when a newer turn holds the key.
    pub fn remove(&self, conversation_id: &str, turn_id: u64) {
        let mut tokens = self.tokens.lock();
        if tokens.get(conversation_id).is_some_and(|(id, _)| *id == turn_id) {
            tokens.remove(conversation_id);
        }
    }
}
