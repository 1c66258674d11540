//! # apilens-mcp
//!
//! MCP (Model Context Protocol) server that sits between an LLM-driven agent
//! and arbitrary remote GraphQL/REST APIs. It keeps the agent's context
//! window bounded on every path:
//!
//! - **Schema compaction**: a verbose OpenAPI 3.x document becomes a compact,
//!   budget-bounded textual DSL (`openapi`).
//! - **Response tabulation**: arbitrary JSON responses become named tables
//!   with order-preserving truncated previews and shape hints (`tabulate`).
//! - **Ad-hoc SQL**: the agent can filter a payload with SQL against
//!   request-scoped staged tables, no persistent database (`sql`).
//! - **Read-only GraphQL**: mutations are blocked before any network I/O
//!   (`graphql`).
//! - **Session tool identity**: one stable internal tool surface is renamed
//!   per session, so a single handler serves many concurrent APIs
//!   (`identity`).
//!
//! ## Architecture
//!
//! ```text
//! AI Agent
//!     │  MCP protocol (list tools / call tool)
//!     ▼
//! ┌───────────────────────────┐
//! │ apilens MCP server        │
//! │ 1. Derive session context │ ← request headers (target URL, API kind)
//! │ 2. Rename tools in        │ ← identity middleware
//! │ 3. Dispatch _query /      │
//! │    _execute               │
//! │ 4. Tabulate + truncate    │
//! │ 5. Optional ad-hoc SQL    │ ← in-memory engine, per-call staging
//! └────────────┬──────────────┘
//!              │
//!              ▼
//!     Upstream GraphQL/REST API
//! ```

pub mod context;
pub mod error;
pub mod executor;
pub mod graphql;
pub mod http_transport;
pub mod identity;
pub mod openapi;
pub mod protocol;
pub mod server;
pub mod sql;
pub mod tabulate;
pub mod tools;

pub use context::SessionContext;
pub use error::McpError;
pub use executor::{ExecutionResult, ToolExecutor};
pub use graphql::GraphQlGate;
pub use protocol::{
    CallToolParams, JsonRpcRequest, JsonRpcResponse, RequestContext, ToolContent, ToolDefinition,
};
pub use server::McpServer;
pub use sql::QueryResult;
pub use tabulate::{TablePayload, TableSchemaInfo, TruncatedView};
pub use tools::ToolRegistry;
