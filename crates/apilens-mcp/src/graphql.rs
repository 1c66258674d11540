//! Read-only GraphQL execution gate.
//!
//! Mutations are blocked by a textual pre-filter before any network I/O: a
//! line whose trimmed start is the `mutation` keyword rejects the query.
//! This is a line-start heuristic, not a parse of the document: it can both
//! under- and over-block adversarially formatted text. Stronger guarantees
//! would require parsing the operation type.

use crate::sql::QueryResult;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// Matches a line beginning (after whitespace) with the `mutation` keyword.
fn mutation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?im)^\s*mutation\b").expect("valid literal regex"))
}

/// GraphQL execution gate.
#[derive(Debug, Clone)]
pub struct GraphQlGate {
    timeout: Duration,
}

impl GraphQlGate {
    /// Create a gate with the given outbound call timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Execute a GraphQL query. Mutations are blocked (read-only mode).
    ///
    /// Every failure mode comes back as a `QueryResult` with `success:
    /// false`; nothing raises past this boundary.
    pub async fn execute(
        &self,
        query: &str,
        variables: Option<&Value>,
        endpoint: &str,
        headers: &HashMap<String, String>,
    ) -> QueryResult {
        if endpoint.is_empty() {
            return QueryResult::err("No endpoint provided");
        }

        if mutation_pattern().is_match(query) {
            return QueryResult::err("Mutations are not allowed (read-only mode)");
        }

        let mut payload = json!({ "query": query });
        if let Some(vars) = variables {
            if !vars.is_null() {
                payload["variables"] = vars.clone();
            }
        }

        match self.post(endpoint, &payload, headers).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(endpoint, error = %e, "GraphQL error");
                QueryResult::err(e.to_string())
            }
        }
    }

    async fn post(
        &self,
        endpoint: &str,
        payload: &Value,
        headers: &HashMap<String, String>,
    ) -> anyhow::Result<QueryResult> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let mut request = client.post(endpoint).json(payload);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(QueryResult::err(format!("HTTP {}", status.as_u16())));
        }

        let body: Value = response.json().await?;
        if let Some(errors) = body.get("errors") {
            return Ok(QueryResult::err(errors.to_string()));
        }

        let data = body.get("data").cloned().unwrap_or_else(|| json!({}));
        Ok(QueryResult::ok_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> GraphQlGate {
        GraphQlGate::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_empty_endpoint_is_config_error() {
        let result = gate()
            .execute("query { viewer }", None, "", &HashMap::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "No endpoint provided");
    }

    #[tokio::test]
    async fn test_mutation_blocked_without_network() {
        // Endpoint is unreachable on purpose: the pre-filter must reject
        // before any I/O is attempted.
        let result = gate()
            .execute(
                "mutation { deleteUser(id: 1) }",
                None,
                "http://192.0.2.1/graphql",
                &HashMap::new(),
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "Mutations are not allowed (read-only mode)");
    }

    #[tokio::test]
    async fn test_mutation_on_later_line_blocked() {
        let query = "query { viewer }\n  MUTATION { dropEverything }";
        let result = gate()
            .execute(query, None, "http://192.0.2.1/graphql", &HashMap::new())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap(), "Mutations are not allowed (read-only mode)");
    }

    #[test]
    fn test_mutation_pattern_edges() {
        let p = mutation_pattern();
        assert!(p.is_match("mutation M { x }"));
        assert!(p.is_match("   Mutation { x }"));
        assert!(p.is_match("query Q { a }\nmutation { b }"));
        // keyword must stand alone at line start
        assert!(!p.is_match("query mutationLog { entries }"));
        assert!(!p.is_match("query { mutations }"));
    }
}
