//! Tool execution engine.
//!
//! Dispatches the two internal tools (`_query`, `_execute`) to the schema
//! compaction and execution pipelines. Every failure mode lands in a
//! structured envelope: remote and query errors come back as data inside a
//! successful tool result, and unexpected faults are caught one level up and
//! converted to a generic error result, so a failing call never terminates
//! the surrounding agent loop.

use crate::context::SessionContext;
use crate::protocol::ToolContent;
use crate::tools::{EXECUTE_TOOL, QUERY_TOOL};
use crate::{graphql, openapi, sql, tabulate};
use apilens_core::LimitsConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Result of a tool execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Whether the execution was successful.
    pub success: bool,
    /// The result content.
    pub content: Vec<ToolContent>,
    /// Error message if failed.
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Create a successful result with JSON content.
    pub fn success_json(value: Value) -> Self {
        Self {
            success: true,
            content: vec![ToolContent::Json { json: value }],
            error: None,
        }
    }

    /// Create an error result.
    pub fn error(message: impl Into<String>) -> Self {
        let msg = message.into();
        Self {
            success: false,
            content: vec![ToolContent::Text { text: msg.clone() }],
            error: Some(msg),
        }
    }
}

/// The tool executor runs internal tools against the target API.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    limits: LimitsConfig,
}

impl ToolExecutor {
    /// Create a new tool executor with the process limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.limits.request_timeout_secs)
    }

    /// Execute an internal tool by its stable name.
    ///
    /// Handlers never see external names; the identity middleware has
    /// already mapped the invoked name back before dispatch.
    pub async fn execute(
        &self,
        internal_name: &str,
        arguments: &Value,
        session: Option<&SessionContext>,
    ) -> ExecutionResult {
        match internal_name {
            QUERY_TOOL => self.run_query_tool(arguments, session).await,
            EXECUTE_TOOL => self.run_execute_tool(arguments, session).await,
            other => ExecutionResult::error(format!("Tool not found: {other}")),
        }
    }

    /// `_query`: fetch and compact the target API's OpenAPI document.
    async fn run_query_tool(
        &self,
        arguments: &Value,
        session: Option<&SessionContext>,
    ) -> ExecutionResult {
        let spec_url = arguments
            .get("spec_url")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| session.map(|s| s.target_url.clone()))
            .unwrap_or_default();

        if spec_url.is_empty() {
            return ExecutionResult::error(
                "No spec URL available: pass spec_url or connect with a target URL",
            );
        }

        let schema = openapi::fetch_schema_context(
            &spec_url,
            &HashMap::new(),
            self.timeout(),
            self.limits.max_schema_chars,
        )
        .await;

        // Empty context means the spec was unusable, not legitimately empty.
        if schema.context.is_empty() {
            return ExecutionResult::error(format!(
                "OpenAPI spec at '{spec_url}' is unavailable or not version 3.x"
            ));
        }

        ExecutionResult::success_json(json!({
            "context": schema.context,
            "base_url": schema.base_url,
        }))
    }

    /// `_execute`: GraphQL execution and/or ad-hoc SQL over a payload.
    async fn run_execute_tool(
        &self,
        arguments: &Value,
        session: Option<&SessionContext>,
    ) -> ExecutionResult {
        let query = arguments.get("query").and_then(Value::as_str);
        let sql_text = arguments.get("sql").and_then(Value::as_str);
        let variables = arguments.get("variables");
        let data = arguments.get("data");

        match (query, sql_text) {
            (Some(query), sql_text) => {
                self.run_graphql(query, variables, sql_text, session).await
            }
            (None, Some(sql_text)) => match data {
                Some(data) => ExecutionResult::success_json(result_value(sql::execute(data, sql_text))),
                None => ExecutionResult::error("sql requires a data payload (or a query to run first)"),
            },
            (None, None) => {
                ExecutionResult::error("Nothing to execute: pass query (GraphQL) and/or sql with data")
            }
        }
    }

    async fn run_graphql(
        &self,
        query: &str,
        variables: Option<&Value>,
        sql_text: Option<&str>,
        session: Option<&SessionContext>,
    ) -> ExecutionResult {
        let endpoint = session.map(|s| s.target_url.as_str()).unwrap_or("");
        let gate = graphql::GraphQlGate::new(self.timeout());
        let result = gate
            .execute(query, variables, endpoint, &HashMap::new())
            .await;

        if !result.success {
            return ExecutionResult::success_json(result_value(result));
        }
        let data = result.data.unwrap_or_else(|| json!({}));

        // With sql, filter the fresh payload instead of returning a preview.
        if let Some(sql_text) = sql_text {
            return ExecutionResult::success_json(result_value(sql::execute(&data, sql_text)));
        }

        self.preview(&data)
    }

    /// Bounded tabular preview of a response payload.
    fn preview(&self, data: &Value) -> ExecutionResult {
        let (tables, schema_info) = tabulate::tabulize(data, "result");
        let Some(table) = tables.into_iter().next() else {
            // Scalar payloads have no tabular shape; return them as-is.
            return ExecutionResult::success_json(json!({ "data": data }));
        };

        let mut view = tabulate::truncate(&table.rows, &table.name, self.limits.max_tool_response_chars);
        if let Some(info) = schema_info {
            if view.schema.is_none() {
                view.schema = Some(info.schema);
                view.hint = Some(info.hint);
            }
        }

        match serde_json::to_value(&view) {
            Ok(value) => ExecutionResult::success_json(value),
            Err(e) => ExecutionResult::error(format!("failed to serialize preview: {e}")),
        }
    }
}

fn result_value(result: sql::QueryResult) -> Value {
    serde_json::to_value(&result).unwrap_or_else(|_| json!({"success": false, "error": "unserializable result"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor() -> ToolExecutor {
        ToolExecutor::new(LimitsConfig::default())
    }

    #[tokio::test]
    async fn test_unknown_internal_tool() {
        let result = executor().execute("_nope", &json!({}), None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("_nope"));
    }

    #[tokio::test]
    async fn test_query_tool_requires_spec_url() {
        let result = executor().execute(QUERY_TOOL, &json!({}), None).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("spec_url"));
    }

    #[tokio::test]
    async fn test_execute_tool_requires_arguments() {
        let result = executor().execute(EXECUTE_TOOL, &json!({}), None).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_execute_sql_over_payload() {
        let args = json!({
            "sql": "SELECT id FROM users ORDER BY id DESC",
            "data": {"users": [{"id": 1}, {"id": 2}]}
        });
        let result = executor().execute(EXECUTE_TOOL, &args, None).await;
        assert!(result.success);
        let ToolContent::Json { json: value } = &result.content[0] else {
            panic!("expected json content");
        };
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["result"][0]["id"], json!(2));
    }

    #[tokio::test]
    async fn test_execute_sql_error_is_data_not_fault() {
        let args = json!({
            "sql": "SELECT nope FROM nowhere",
            "data": {"users": [{"id": 1}]}
        });
        let result = executor().execute(EXECUTE_TOOL, &args, None).await;
        // The tool call succeeds; the envelope carries the engine failure.
        assert!(result.success);
        let ToolContent::Json { json: value } = &result.content[0] else {
            panic!("expected json content");
        };
        assert_eq!(value["success"], json!(false));
        assert!(value["error"].as_str().unwrap().starts_with("SQL error:"));
    }

    #[tokio::test]
    async fn test_sql_without_data_or_query() {
        let args = json!({"sql": "SELECT 1"});
        let result = executor().execute(EXECUTE_TOOL, &args, None).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_config_error() {
        let args = json!({"query": "query { viewer }"});
        let result = executor().execute(EXECUTE_TOOL, &args, None).await;
        assert!(result.success);
        let ToolContent::Json { json: value } = &result.content[0] else {
            panic!("expected json content");
        };
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("No endpoint provided"));
    }

    #[tokio::test]
    async fn test_mutation_rejected_via_execute_tool() {
        let session = crate::context::SessionContext {
            api_name: "example".to_string(),
            hostname: "api.example.com".to_string(),
            api_kind_label: "GraphQL".to_string(),
            // Unreachable on purpose: the pre-filter must reject first.
            target_url: "http://192.0.2.1/graphql".to_string(),
        };
        let args = json!({"query": "mutation { drop }"});
        let result = executor().execute(EXECUTE_TOOL, &args, Some(&session)).await;
        assert!(result.success);
        let ToolContent::Json { json: value } = &result.content[0] else {
            panic!("expected json content");
        };
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("Mutations are not allowed (read-only mode)"));
    }
}
