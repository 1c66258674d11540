//! # apilens-core
//!
//! Shared configuration types for the apilens API bridge.
//!
//! Everything here is immutable, read-only process configuration established
//! at startup: context character budgets, remote call timeouts, and the MCP
//! transport settings. Per-request state (session headers, turn context)
//! lives in `apilens-mcp` and is never stored here.

pub mod config;

pub use config::{ApilensConfig, LimitsConfig, McpConfig, Transport};
