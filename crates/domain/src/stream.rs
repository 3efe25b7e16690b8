use serde::{Deserialize, Serialize};

/// Token usage for a single completion, as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Token counters summed over every model call made during one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenTotals {
    /// Fold one call's usage into the running totals. `None` (the provider
    /// did not report usage) leaves the totals untouched.
    pub fn add(&mut self, usage: Option<&Usage>) {
        if let Some(u) = usage {
            self.total_tokens += u64::from(u.total_tokens);
            self.input_tokens += u64::from(u.prompt_tokens);
            self.output_tokens += u64::from(u.completion_tokens);
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total_tokens == 0 && self.input_tokens == 0 && self.output_tokens == 0
    }
}

impl std::ops::AddAssign for TokenTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.total_tokens += rhs.total_tokens;
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}
