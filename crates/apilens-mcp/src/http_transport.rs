//! HTTP transport for the MCP server.
//!
//! Each POST carries its own session headers; they are captured into a
//! `RequestContext` and travel with the JSON-RPC request over the channel,
//! so the server side never consults any ambient session state.

use crate::error::McpError;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, RequestContext};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

/// Sender side of the request channel: request, its context, and where the
/// response goes.
pub type RequestSender = mpsc::Sender<(JsonRpcRequest, RequestContext, mpsc::Sender<JsonRpcResponse>)>;

/// HTTP transport handler state.
pub struct HttpTransportState {
    request_tx: RequestSender,
}

impl HttpTransportState {
    /// Create a new HTTP transport state.
    pub fn new(request_tx: RequestSender) -> Self {
        Self { request_tx }
    }
}

/// Create the HTTP router for MCP.
pub fn create_router(state: Arc<HttpTransportState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp_post))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle POST requests to /mcp (JSON-RPC over HTTP).
async fn handle_mcp_post(
    State(state): State<Arc<HttpTransportState>>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let ctx = context_from_headers(&headers);
    let (response_tx, mut response_rx) = mpsc::channel(1);

    if state.request_tx.send((request, ctx, response_tx)).await.is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(JsonRpcResponse::error(
                None,
                -32603,
                "MCP server unavailable",
            )),
        );
    }

    match response_rx.recv().await {
        Some(response) => (StatusCode::OK, Json(response)),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(JsonRpcResponse::error(None, -32603, "No response from MCP server")),
        ),
    }
}

fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    let pairs = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)));
    RequestContext::from_headers(pairs)
}

/// Handle health check requests.
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "apilens-mcp",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// HTTP server for MCP transport.
pub struct HttpServer {
    host: String,
    port: u16,
    state: Arc<HttpTransportState>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(host: String, port: u16, request_tx: RequestSender) -> Self {
        Self {
            host,
            port,
            state: Arc::new(HttpTransportState::new(request_tx)),
        }
    }

    /// Run the HTTP server.
    pub async fn run(self) -> Result<(), McpError> {
        let app = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(format!("{}:{}", self.host, self.port))
            .await
            .map_err(|e| {
                McpError::StartupFailed(format!(
                    "Failed to bind to {}:{}: {}",
                    self.host, self.port, e
                ))
            })?;

        tracing::info!(host = %self.host, port = self.port, "MCP HTTP server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| McpError::Internal(e.into()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_endpoint() {
        let (tx, _rx) = mpsc::channel(1);
        let state = Arc::new(HttpTransportState::new(tx));
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_post_carries_session_headers() {
        let (tx, mut rx) = mpsc::channel(1);
        let state = Arc::new(HttpTransportState::new(tx));
        let app = create_router(state);

        // Echo task standing in for the server loop.
        let echo = tokio::spawn(async move {
            let (request, ctx, response_tx) = rx.recv().await.unwrap();
            assert_eq!(ctx.target_url.as_deref(), Some("https://api.github.com/graphql"));
            assert_eq!(ctx.api_kind.as_deref(), Some("graphql"));
            let _ = response_tx
                .send(JsonRpcResponse::success(request.id, serde_json::json!({})))
                .await;
        });

        let body = serde_json::json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize"
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .header("x-target-url", "https://api.github.com/graphql")
                    .header("x-api-type", "graphql")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: JsonRpcResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(parsed.result.is_some());
        echo.await.unwrap();
    }
}
