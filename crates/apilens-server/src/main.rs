//! apilens server binary.
//!
//! Loads process configuration, initializes tracing, and runs the MCP
//! server on the configured transport.

use apilens_core::ApilensConfig;
use apilens_mcp::McpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ApilensConfig::load()?;
    tracing::info!(
        max_tool_response_chars = config.limits.max_tool_response_chars,
        max_schema_chars = config.limits.max_schema_chars,
        "apilens configuration loaded"
    );

    let server = McpServer::new(config);
    server.run().await?;

    Ok(())
}
