//! Shared types for the Executive Insider workspace: errors, token usage,
//! conversation records, per-turn analysis/debug records, and config.

pub mod analysis;
pub mod config;
pub mod conversation;
pub mod error;
pub mod stream;
pub mod trace;
