//! Caller identity.
//!
//! Callers present `Authorization: Bearer <user_id>:<email>:<hex hmac>`,
//! where the MAC is HMAC-SHA256 over `<user_id>:<email>` keyed with the
//! secret read from `[auth].secret_env` at startup. A request without a
//! bearer token is anonymous. With no secret configured every caller is
//! anonymous.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use ei_domain::config::AccessConfig;

type HmacSha256 = Hmac<Sha256>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Caller
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Who is making a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<String>,
    pub email: Option<String>,
    /// Privileged callers receive the per-turn debug record.
    pub privileged: bool,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("malformed bearer token")]
    Malformed,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token signing is not configured")]
    NoSecret,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CallerResolver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CallerResolver {
    secret: Option<Vec<u8>>,
    access: AccessConfig,
}

impl CallerResolver {
    pub fn new(secret: Option<String>, access: AccessConfig) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()).map(String::into_bytes),
            access,
        }
    }

    /// Read the secret from the env var named by `access.secret_env`.
    pub fn from_env(access: AccessConfig) -> Self {
        let secret = std::env::var(&access.secret_env).ok();
        if secret.as_deref().map_or(true, str::is_empty) {
            tracing::warn!(
                env = %access.secret_env,
                "auth secret not set; every caller is anonymous"
            );
        }
        Self::new(secret, access)
    }

    pub fn enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Mint a token for `user_id`.
    pub fn sign(&self, user_id: &str, email: Option<&str>) -> Result<String, AuthError> {
        let secret = self.secret.as_deref().ok_or(AuthError::NoSecret)?;
        if user_id.is_empty() || user_id.contains(':') {
            return Err(AuthError::Malformed);
        }
        let payload = format!("{user_id}:{}", email.unwrap_or(""));
        let sig = mac(secret, &payload);
        Ok(format!("{payload}:{}", hex::encode(sig)))
    }

    /// Resolve the value of an `Authorization` header.
    pub fn resolve(&self, authorization: Option<&str>) -> Result<Caller, AuthError> {
        let Some(secret) = self.secret.as_deref() else {
            return Ok(Caller::anonymous());
        };
        let Some(token) = authorization
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            return Ok(Caller::anonymous());
        };
        let token = token.strip_prefix("Bearer ").ok_or(AuthError::Malformed)?;

        let (payload, sig_hex) = token.rsplit_once(':').ok_or(AuthError::Malformed)?;
        let (user_id, email) = payload.split_once(':').ok_or(AuthError::Malformed)?;
        if user_id.is_empty() {
            return Err(AuthError::Malformed);
        }
        let provided = hex::decode(sig_hex).map_err(|_| AuthError::Malformed)?;
        let expected = mac(secret, payload);
        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            return Err(AuthError::BadSignature);
        }

        let email = (!email.is_empty()).then(|| email.to_owned());
        Ok(Caller {
            privileged: self.access.is_privileged(user_id, email.as_deref()),
            user_id: Some(user_id.to_owned()),
            email,
        })
    }
}

fn mac(secret: &[u8], payload: &str) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let mut m = match HmacSha256::new_from_slice(secret) {
        Ok(m) => m,
        Err(_) => return Vec::new(),
    };
    m.update(payload.as_bytes());
    m.finalize().into_bytes().to_vec()
}
