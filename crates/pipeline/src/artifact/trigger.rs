use regex::Regex;

/// Tool whose turns may produce a GROW card.
pub const GROW_TOOL_ID: &str = "grow";

const SAMPLE_PATTERN: &str = r"(?i)样本|示例|样例|demo|例子";
const CARD_PATTERN: &str = r"(?i)(生成|制作|整理|输出|要|来).{0,6}(卡片|总结)|(卡片|总结).{0,6}(生成|制作|整理|输出|要|来)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Card built from the canned sample case.
    Sample,
    /// Card built from the user's own request.
    Card,
}

/// Detects card requests in GROW turns. Compile once and share.
#[derive(Debug, Clone)]
pub struct ArtifactTrigger {
    sample: Regex,
    card: Regex,
}

impl ArtifactTrigger {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            sample: Regex::new(SAMPLE_PATTERN)?,
            card: Regex::new(CARD_PATTERN)?,
        })
    }

    /// Sample wins when both patterns match. Other tools never trigger.
    pub fn detect(&self, tool_id: Option<&str>, message: &str) -> Option<TriggerKind> {
        if tool_id != Some(GROW_TOOL_ID) {
            return None;
        }
        if self.sample.is_match(message) {
            Some(TriggerKind::Sample)
        } else if self.card.is_match(message) {
            Some(TriggerKind::Card)
        } else {
            None
        }
    }
}
