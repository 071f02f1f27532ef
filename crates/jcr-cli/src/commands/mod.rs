//! Command handler modules for the `jcr` CLI.
//!
//! Shared helpers live here; command-specific logic lives in the submodules.

pub mod access;
pub mod live;

use anyhow::{Context, Result};
use jcr_config::PortalConfig;
use jcr_gate::HttpIdentitySource;
use jcr_page::Portal;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Layered config (built-in defaults when no path is given) plus env overrides.
pub fn load_config(paths: &[String]) -> Result<PortalConfig> {
    let mut cfg = if paths.is_empty() {
        PortalConfig::default()
    } else {
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        jcr_config::load_layered_yaml(&refs).context("load config failed")?
    };
    cfg.apply_env_overrides(|name| std::env::var(name).ok())?;
    Ok(cfg)
}

/// Portal wired to the configured origin with the session token from env.
pub fn portal(cfg: &PortalConfig) -> Result<Portal<HttpIdentitySource>> {
    let token = jcr_config::resolve_session_token(cfg)?;
    if token.is_none() {
        tracing::warn!(env = %cfg.token_env, "no session token set; requests are anonymous");
    }
    Ok(Portal::from_config(cfg, token))
}
