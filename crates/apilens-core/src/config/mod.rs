//! Process configuration.
//!
//! Loaded once at startup from a TOML file (path in `APILENS_SERVER_CONFIG`,
//! default `config.toml`), with individual env var overrides applied on top.
//! Missing file means defaults.

mod limits;
mod mcp;

pub use limits::LimitsConfig;
pub use mcp::{McpConfig, Transport};

use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

/// Top-level apilens configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApilensConfig {
    /// Context budgets and remote call timeouts.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// MCP server transport settings.
    #[serde(default)]
    pub mcp: McpConfig,
}

impl ApilensConfig {
    /// Load configuration from the configured file path, then apply env
    /// var overrides. A missing config file yields defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();
        let mut cfg: Self = match fs::read_to_string(&path) {
            Ok(raw) => toml::from_str(&raw)?,
            Err(_) => Self::default(),
        };
        cfg.limits.apply_env_overrides();
        Ok(cfg)
    }
}

fn config_path() -> PathBuf {
    if let Ok(p) = env::var("APILENS_SERVER_CONFIG") {
        return PathBuf::from(p);
    }
    PathBuf::from("config.toml")
}
