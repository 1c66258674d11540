//! MCP server implementation.
//!
//! This module provides the main MCP server: JSON-RPC dispatch over stdio or
//! HTTP, with every tool listing and invocation routed through the session
//! identity middleware. Each request is handled independently against its
//! own `RequestContext`; the only cross-request state is the immutable
//! process configuration.

use crate::context::SessionContext;
use crate::error::McpError;
use crate::executor::{ExecutionResult, ToolExecutor};
use crate::http_transport::HttpServer;
use crate::identity;
use crate::protocol::*;
use crate::tools::ToolRegistry;
use apilens_core::{ApilensConfig, Transport};
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use tokio::sync::mpsc;

/// The MCP server.
#[derive(Clone)]
pub struct McpServer {
    config: ApilensConfig,
    tools: ToolRegistry,
    executor: ToolExecutor,
}

impl McpServer {
    /// Create a new MCP server with the given configuration and the builtin
    /// tool surface.
    pub fn new(config: ApilensConfig) -> Self {
        let executor = ToolExecutor::new(config.limits.clone());
        Self {
            config,
            tools: ToolRegistry::builtin(),
            executor,
        }
    }

    /// Start the MCP server on the configured transport.
    pub async fn run(&self) -> Result<(), McpError> {
        match self.config.mcp.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Http => self.run_http().await,
        }
    }

    /// Run the server with stdio transport.
    ///
    /// Stdio has no session headers, so tools keep their internal names and
    /// the identity middleware passes everything through.
    async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!("Starting MCP server with stdio transport");

        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut stdout_lock = stdout.lock();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let response = self.handle_line(&line, &RequestContext::default()).await;
            let response_json = serde_json::to_string(&response)?;

            writeln!(stdout_lock, "{}", response_json)?;
            stdout_lock.flush()?;
        }

        Ok(())
    }

    /// Handle one line of input. A line that is not a JSON-RPC request
    /// yields a parse error response; the transport loop keeps running.
    async fn handle_line(&self, line: &str, ctx: &RequestContext) -> JsonRpcResponse {
        match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => self.handle_request(request, ctx).await,
            Err(e) => JsonRpcResponse::error(None, -32700, format!("Parse error: {}", e)),
        }
    }

    /// Run the server with HTTP transport.
    pub async fn run_http(&self) -> Result<(), McpError> {
        tracing::info!(
            host = %self.config.mcp.host,
            port = self.config.mcp.port,
            "Starting MCP server with HTTP transport"
        );

        let (request_tx, request_rx) = mpsc::channel(100);
        tokio::spawn(self.clone().serve_channel(request_rx));

        let http_server = HttpServer::new(
            self.config.mcp.host.clone(),
            self.config.mcp.port,
            request_tx,
        );
        http_server.run().await
    }

    /// Consume JSON-RPC requests from the transport channel.
    ///
    /// Each request is handled in its own task, so a slow upstream call
    /// stalls only itself, never the requests queued behind it.
    async fn serve_channel(
        self,
        mut request_rx: mpsc::Receiver<(JsonRpcRequest, RequestContext, mpsc::Sender<JsonRpcResponse>)>,
    ) {
        while let Some((request, ctx, response_tx)) = request_rx.recv().await {
            let server = self.clone();
            tokio::spawn(async move {
                let response = server.handle_request(request, &ctx).await;
                let _ = response_tx.send(response).await;
            });
        }
    }

    /// Handle a JSON-RPC request within its request-scoped context.
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        ctx: &RequestContext,
    ) -> JsonRpcResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "initialized" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_list_tools(id, ctx),
            "tools/call" => self.handle_call_tool(id, request.params, ctx).await,
            "shutdown" => self.handle_shutdown(id),
            _ => JsonRpcResponse::error(
                id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        let result = json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {
                "name": "apilens-mcp",
                "version": env!("CARGO_PKG_VERSION")
            },
            "capabilities": {
                "tools": {
                    "listChanged": true
                }
            }
        });
        JsonRpcResponse::success(id, result)
    }

    fn handle_list_tools(&self, id: Option<Value>, ctx: &RequestContext) -> JsonRpcResponse {
        let session = SessionContext::resolve(ctx);
        let tools = identity::rename_for_listing(self.tools.list(), session.as_ref());

        let result = serde_json::to_value(ListToolsResponse { tools })
            .unwrap_or_else(|_| json!({ "tools": [] }));
        JsonRpcResponse::success(id, result)
    }

    async fn handle_call_tool(
        &self,
        id: Option<Value>,
        params: Option<Value>,
        ctx: &RequestContext,
    ) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e))
                }
            },
            None => return JsonRpcResponse::error(id, -32602, "Missing params"),
        };

        let session = SessionContext::resolve(ctx);

        // Rename-in: translate the session-external name back to the stable
        // internal name. A prefix mismatch is a user-visible error result,
        // not a protocol fault.
        let internal_name = match identity::resolve_invocation(&params.name, session.as_ref()) {
            Ok(name) => name,
            Err(message) => {
                return JsonRpcResponse::success(
                    id,
                    call_response(vec![ToolContent::Text { text: message }], true),
                )
            }
        };

        if !self.tools.contains(&internal_name) {
            return JsonRpcResponse::error(id, -32602, format!("Tool not found: {}", params.name));
        }

        let result = self
            .executor
            .execute(&internal_name, &params.arguments, session.as_ref())
            .await;
        self.execution_result_to_response(id, result)
    }

    fn execution_result_to_response(
        &self,
        id: Option<Value>,
        result: ExecutionResult,
    ) -> JsonRpcResponse {
        JsonRpcResponse::success(id, call_response(result.content, !result.success))
    }

    fn handle_shutdown(&self, id: Option<Value>) -> JsonRpcResponse {
        tracing::info!("MCP server shutdown requested");
        JsonRpcResponse::success(id, json!(null))
    }
}

fn call_response(content: Vec<ToolContent>, is_error: bool) -> Value {
    let response = CallToolResponse {
        content,
        is_error: Some(is_error),
    };
    serde_json::to_value(response).unwrap_or_else(|_| json!({"content": [], "isError": true}))
}
