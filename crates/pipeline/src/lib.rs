//! Stage logic of a conversational turn.
//!
//! Each stage is a free function over a [`ModelGateway`] and a
//! [`StageConfig`]; none of them fail. Gateway errors and unusable model
//! output are converted into the stage's fallback value here, so the turn
//! orchestrator only sequences stages and aggregates usage.

pub mod analyzer;
pub mod artifact;
pub mod composer;
pub mod gateway;
pub mod json;
pub mod memory;
pub mod prompts;
pub mod resolver;
pub mod strategist;
pub mod title;
pub mod tools;

pub use gateway::{Completion, ModelGateway};
pub use resolver::{PipelineConfig, StageConfig};
pub use tools::{Tool, ToolCatalog};
