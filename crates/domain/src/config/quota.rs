use serde::{Deserialize, Serialize};

/// Anonymous usage quota.
///
/// Unauthenticated callers may send at most `anonymous_message_limit` user
/// messages per conversation. The count is per conversation id, so a new
/// conversation starts from zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "d_2")]
    pub anonymous_message_limit: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            anonymous_message_limit: d_2(),
        }
    }
}

fn d_2() -> u64 {
    2
}
