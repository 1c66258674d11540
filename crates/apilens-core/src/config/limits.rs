//! Context budget and timeout configuration.

use serde::{Deserialize, Serialize};
use std::env;

/// Character budgets and remote call timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum serialized characters in one tool response before the
    /// tabular preview is truncated.
    #[serde(default = "default_max_tool_response_chars")]
    pub max_tool_response_chars: usize,

    /// Maximum characters in the compacted schema context before the
    /// truncation sentinel is appended.
    #[serde(default = "default_max_schema_chars")]
    pub max_schema_chars: usize,

    /// Timeout applied to every outbound HTTP call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_tool_response_chars: default_max_tool_response_chars(),
            max_schema_chars: default_max_schema_chars(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl LimitsConfig {
    /// Apply env var overrides on top of file values. Unparseable values
    /// are ignored in favor of the existing setting.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_usize("APILENS_MAX_TOOL_RESPONSE_CHARS") {
            self.max_tool_response_chars = v;
        }
        if let Some(v) = env_usize("APILENS_MAX_SCHEMA_CHARS") {
            self.max_schema_chars = v;
        }
        if let Some(v) = env_usize("APILENS_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = v as u64;
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn default_max_tool_response_chars() -> usize {
    4000
}

fn default_max_schema_chars() -> usize {
    20000
}

fn default_request_timeout_secs() -> u64 {
    30
}
