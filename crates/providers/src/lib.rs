pub mod openai_compat;
pub mod registry;
pub mod traits;
pub(crate) mod util;

// Re-exports for convenience.
pub use registry::ProviderRegistry;
pub use traits::{ChatMessage, ChatRequest, ChatResponse, ChatRole, LlmProvider};
