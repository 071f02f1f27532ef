//! Session token resolution.
//!
//! # Contract
//! - Config YAML stores only the env var NAME (`auth.token_env`).
//! - Binaries call [`resolve_session_token`] once at startup and pass the
//!   result into the identity source and REST client constructors.
//! - `Debug` on [`SessionToken`] redacts the value; error messages name the
//!   env var, never the value.

use anyhow::{bail, Result};

use crate::PortalConfig;

/// Bearer token presented to the identity endpoint and REST endpoints.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(<REDACTED>)")
    }
}

/// Resolve the session token from the process environment.
///
/// Returns `Ok(None)` when the variable is unset or blank: an anonymous
/// viewer is still allowed to ask the identity endpoint, which will deny.
pub fn resolve_session_token(cfg: &PortalConfig) -> Result<Option<SessionToken>> {
    resolve_session_token_with(cfg, |name| std::env::var(name).ok())
}

pub fn resolve_session_token_with<F>(cfg: &PortalConfig, lookup: F) -> Result<Option<SessionToken>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(&cfg.token_env) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().any(char::is_whitespace) {
        bail!(
            "SESSION_TOKEN_INVALID: env var {} contains whitespace",
            cfg.token_env
        );
    }
    Ok(Some(SessionToken::new(trimmed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_value() {
        let t = SessionToken::new("super-secret-value");
        let dbg = format!("{t:?}");
        assert!(!dbg.contains("super-secret-value"));
        assert!(dbg.contains("REDACTED"));
    }

    #[test]
    fn blank_env_is_anonymous() {
        let cfg = PortalConfig::default();
        let tok = resolve_session_token_with(&cfg, |_| Some("   ".to_string())).unwrap();
        assert!(tok.is_none());
    }

    #[test]
    fn token_is_read_from_named_var() {
        let cfg = PortalConfig {
            token_env: "MY_TOKEN".to_string(),
            ..PortalConfig::default()
        };
        let tok = resolve_session_token_with(&cfg, |name| {
            (name == "MY_TOKEN").then(|| "abc123".to_string())
        })
        .unwrap()
        .unwrap();
        assert_eq!(tok.bearer(), "Bearer abc123");
    }

    #[test]
    fn error_names_var_not_value() {
        let cfg = PortalConfig::default();
        let err = resolve_session_token_with(&cfg, |_| Some("abc def".to_string())).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("JCR_SESSION_TOKEN"));
        assert!(!msg.contains("abc def"));
    }
}
