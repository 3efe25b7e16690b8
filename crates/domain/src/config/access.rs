use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Caller access
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Caller authentication and privilege settings.
///
/// Callers authenticate with a signed bearer token (see the gateway's
/// `auth` module). The signing secret is read from `secret_env` once at
/// startup; when it is unset every caller is treated as anonymous.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "d_secret_env")]
    pub secret_env: String,
    /// User ids that receive the per-turn debug record.
    #[serde(default)]
    pub privileged_users: Vec<String>,
    /// Emails that receive the per-turn debug record.
    #[serde(default)]
    pub privileged_emails: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            secret_env: d_secret_env(),
            privileged_users: Vec::new(),
            privileged_emails: Vec::new(),
        }
    }
}

impl AccessConfig {
    pub fn is_privileged(&self, user_id: &str, email: Option<&str>) -> bool {
        if self.privileged_users.iter().any(|u| u == user_id) {
            return true;
        }
        email.is_some_and(|e| {
            self.privileged_emails
                .iter()
                .any(|p| p.eq_ignore_ascii_case(e))
        })
    }
}

fn d_secret_env() -> String {
    "EI_AUTH_SECRET".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privilege_matches_user_or_email() {
        let cfg = AccessConfig {
            privileged_users: vec!["42".into()],
            privileged_emails: vec!["Admin@Example.com".into()],
            ..AccessConfig::default()
        };
        assert!(cfg.is_privileged("42", None));
        assert!(cfg.is_privileged("7", Some("admin@example.com")));
        assert!(!cfg.is_privileged("7", Some("someone@example.com")));
        assert!(!cfg.is_privileged("7", None));
    }
}
