//! jcr-config
//!
//! Layered YAML configuration for the portal core.
//!
//! Documents are merged in order (earlier docs are base, later docs override),
//! converted to JSON, checked for literal secrets, then decoded into
//! [`PortalConfig`]. The session token never lives in YAML; the config only
//! names the env var that carries it (see [`secrets`]).

pub mod secrets;

use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

pub use secrets::{resolve_session_token, resolve_session_token_with, SessionToken};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";
pub const DEFAULT_VERIFY_PATH: &str = "/api/auth/verify";
pub const DEFAULT_LIVE_PATH: &str = "/live";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_TOKEN_ENV: &str = "JCR_SESSION_TOKEN";

/// Env var that replaces `portal.base_url` when set.
pub const BASE_URL_ENV: &str = "JCR_BASE_URL";

/// Known secret-like prefixes. Any leaf string starting with one of these
/// aborts loading with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "Bearer ",
    "eyJ", // JWT header
    "sk-",
    "sk_live",
    "-----BEGIN",
    "ghp_",
    "xoxb-",
];

// ---------------------------------------------------------------------------
// Effective config
// ---------------------------------------------------------------------------

/// Effective configuration after layering and env overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// `http://` or `https://` origin serving both REST and live endpoints.
    pub base_url: String,
    pub verify_path: String,
    pub live_path: String,
    /// Upper bound on the identity lookup and every page data fetch.
    pub request_timeout: Duration,
    /// Name of the env var holding the session token.
    pub token_env: String,
    /// Route -> required permission overrides, applied on top of the built-in table.
    pub routes: BTreeMap<String, String>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            verify_path: DEFAULT_VERIFY_PATH.to_string(),
            live_path: DEFAULT_LIVE_PATH.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            routes: BTreeMap::new(),
        }
    }
}

impl PortalConfig {
    /// Absolute URL for a REST path on the configured origin.
    pub fn http_url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    pub fn verify_url(&self) -> String {
        self.http_url(&self.verify_path)
    }

    /// Live channel URL: the same host, upgraded to `ws://` / `wss://`.
    pub fn live_url(&self) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        join_url(&base, &self.live_path)
    }

    /// Apply environment overrides through `lookup` (usually `std::env::var`).
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().trim_end_matches('/').to_string();
            validate_base_url(&self.base_url)
                .with_context(|| format!("invalid {BASE_URL_ENV}"))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Raw (YAML) shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    portal: RawPortal,
    #[serde(default)]
    auth: RawAuth,
    #[serde(default)]
    routes: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPortal {
    base_url: Option<String>,
    verify_path: Option<String>,
    live_path: Option<String>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAuth {
    token_env: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

pub fn load_layered_yaml(paths: &[&str]) -> Result<PortalConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<PortalConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty document parses as null; treat it as an empty layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    let raw: RawConfig =
        serde_json::from_value(merged).context("config does not match the portal schema")?;
    from_raw(raw)
}

fn from_raw(raw: RawConfig) -> Result<PortalConfig> {
    let defaults = PortalConfig::default();

    let base_url = raw
        .portal
        .base_url
        .map(|u| u.trim().trim_end_matches('/').to_string())
        .unwrap_or(defaults.base_url);
    validate_base_url(&base_url)?;

    let request_timeout_ms = raw
        .portal
        .request_timeout_ms
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
    if request_timeout_ms == 0 {
        bail!("CONFIG_INVALID: portal.request_timeout_ms must be > 0");
    }

    let mut routes = BTreeMap::new();
    for (route, permission) in raw.routes {
        if permission.trim().is_empty() {
            bail!("CONFIG_INVALID: routes.{route} has an empty permission");
        }
        routes.insert(route, permission.trim().to_string());
    }

    Ok(PortalConfig {
        base_url,
        verify_path: normalize_path(raw.portal.verify_path, DEFAULT_VERIFY_PATH),
        live_path: normalize_path(raw.portal.live_path, DEFAULT_LIVE_PATH),
        request_timeout: std::time::Duration::from_millis(request_timeout_ms),
        token_env: raw
            .auth
            .token_env
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.token_env),
        routes,
    })
}

fn validate_base_url(url: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("CONFIG_INVALID: base_url must start with http:// or https:// (got '{url}')");
    }
    Ok(())
}

fn normalize_path(p: Option<String>, default: &str) -> String {
    let p = p.unwrap_or_else(|| default.to_string());
    let p = p.trim();
    if p.starts_with('/') {
        p.to_string()
    } else {
        format!("/{p}")
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => out.push(prefix.to_string()),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}
