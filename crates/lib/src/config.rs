//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.mozo/config.json`). A missing
//! file means defaults; every section and field has a serde default so partial
//! configs stay valid as fields are added.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Tenant session settings (login artifacts, QR timing).
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Assistant dispatch settings (context TTL, query timeout).
    #[serde(default)]
    pub assistant: AssistantConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// HTTP port for the trigger API (default 3000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Per-tenant session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsConfig {
    /// Root directory for per-tenant login artifacts (default ~/.mozo/bots).
    /// A tenant subdirectory existing is the "already logged in" signal.
    pub dir: Option<PathBuf>,

    /// Seconds a session may sit in qr_pending before it is marked errored
    /// and becomes replaceable (default 120).
    #[serde(default = "default_qr_timeout_secs")]
    pub qr_timeout_secs: u64,

    /// Seconds the first trigger call waits for the QR payload before
    /// answering with an error (default 30).
    #[serde(default = "default_qr_wait_secs")]
    pub qr_wait_secs: u64,
}

fn default_qr_timeout_secs() -> u64 {
    120
}

fn default_qr_wait_secs() -> u64 {
    30
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            qr_timeout_secs: default_qr_timeout_secs(),
            qr_wait_secs: default_qr_wait_secs(),
        }
    }
}

/// Conversation dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    /// Minutes before a conversational context is treated as absent (default 10).
    #[serde(default = "default_context_ttl_mins")]
    pub context_ttl_mins: u64,

    /// Seconds to wait on a data-provider query before giving the user the
    /// generic error reply (default 10).
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_context_ttl_mins() -> u64 {
    10
}

fn default_query_timeout_secs() -> u64 {
    10
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            context_ttl_mins: default_context_ttl_mins(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MOZO_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".mozo").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Resolve the login-artifact root: config.sessions.dir or ~/.mozo/bots.
pub fn resolve_sessions_dir(config: &Config) -> PathBuf {
    config.sessions.dir.clone().unwrap_or_else(|| {
        dirs::home_dir()
            .map(|h| h.join(".mozo").join("bots"))
            .unwrap_or_else(|| PathBuf::from("bots"))
    })
}

/// Load config from the default path (or MOZO_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
