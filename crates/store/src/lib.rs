//! Conversation storage.
//!
//! [`ConversationStore`] is the storage capability the turn pipeline is
//! written against. [`FileStore`] implements it with a JSON conversation
//! index plus one append-only JSONL file per conversation, fronted by an
//! in-memory write-through cache. [`FileStore::in_memory`] skips the disk
//! entirely.

pub mod file_store;
pub mod traits;

pub use file_store::FileStore;
pub use traits::ConversationStore;
