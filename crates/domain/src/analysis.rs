//! Per-turn analysis records: the stage-1 classification and the debug
//! record persisted alongside every reply.

use std::fmt;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stage 1 analysis
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Classified intent of a user message.
///
/// Decoding is tolerant of case and surrounding whitespace; anything that is
/// not a known label becomes [`Intent::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Intent {
    Decision,
    Emotional,
    Query,
    Chat,
    ToolExecution,
    Unknown,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Decision => "DECISION",
            Intent::Emotional => "EMOTIONAL",
            Intent::Query => "QUERY",
            Intent::Chat => "CHAT",
            Intent::ToolExecution => "tool_execution",
            Intent::Unknown => "UNKNOWN",
        }
    }
}

impl From<String> for Intent {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "DECISION" => Intent::Decision,
            "EMOTIONAL" => Intent::Emotional,
            "QUERY" => Intent::Query,
            "CHAT" => Intent::Chat,
            "TOOL_EXECUTION" => Intent::ToolExecution,
            _ => Intent::Unknown,
        }
    }
}

impl From<Intent> for String {
    fn from(i: Intent) -> Self {
        i.as_str().to_owned()
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Complexity {
    High,
    Low,
}

impl From<String> for Complexity {
    fn from(s: String) -> Self {
        if s.trim().eq_ignore_ascii_case("high") {
            Complexity::High
        } else {
            Complexity::Low
        }
    }
}

impl From<Complexity> for String {
    fn from(c: Complexity) -> Self {
        match c {
            Complexity::High => "HIGH".into(),
            Complexity::Low => "LOW".into(),
        }
    }
}

/// Stage-1 classification of the inbound message. Never persisted on its
/// own, only inside [`DebugInfo`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage1Analysis {
    pub intent: Intent,
    #[serde(default = "d_sentiment")]
    pub sentiment: String,
    #[serde(default = "d_complexity")]
    pub complexity: Complexity,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Stage1Analysis {
    /// Substituted when the classifier call fails or its output is unusable.
    pub fn fallback() -> Self {
        Self {
            intent: Intent::Chat,
            sentiment: "Unknown".into(),
            complexity: Complexity::Low,
            keywords: vec!["Error".into()],
        }
    }

    /// Synthetic analysis used when a tool is active and stage 1 is skipped.
    pub fn tool_execution() -> Self {
        Self {
            intent: Intent::ToolExecution,
            sentiment: "neutral".into(),
            complexity: Complexity::High,
            keywords: Vec::new(),
        }
    }
}

fn d_sentiment() -> String {
    "Unknown".into()
}
fn d_complexity() -> Complexity {
    Complexity::Low
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Debug record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Content of the `analysis` message persisted before every reply.
pub const DEBUG_RECORD_CONTENT: &str = "Full-Link Debug";

/// Shown in place of an empty memory snapshot.
pub const EMPTY_MEMORY_LABEL: &str = "无历史记忆";

/// Shown in place of a missing strategy.
pub const MISSING_STRATEGY_LABEL: &str = "策略生成失败";

/// Model identifiers used by each stage of one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub stage1: String,
    pub stage3: String,
    pub stage4: String,
}

/// Internal per-turn trace: config, analysis, memory and strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub config_provider: String,
    pub model_info: ModelInfo,
    pub stage1: Stage1Analysis,
    pub stage2_memory: String,
    pub stage3_strategy: String,
}

impl DebugInfo {
    pub fn new(
        config_provider: impl Into<String>,
        model_info: ModelInfo,
        stage1: Stage1Analysis,
        memory: &str,
        strategy: Option<&str>,
    ) -> Self {
        Self {
            config_provider: config_provider.into(),
            model_info,
            stage1,
            stage2_memory: if memory.is_empty() {
                EMPTY_MEMORY_LABEL.to_owned()
            } else {
                memory.to_owned()
            },
            stage3_strategy: strategy.unwrap_or(MISSING_STRATEGY_LABEL).to_owned(),
        }
    }
}
