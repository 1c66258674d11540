//! Per-session tool identity rewriting.
//!
//! Handlers only ever see stable internal tool names (`_query`, `_execute`);
//! each session perceives its own external surface (`github_query`,
//! `shopify_execute`, ...) derived from its request headers. The rewriting
//! is an explicit two-way name map keyed by the request's session context,
//! a capability-boundary translation rather than a dispatch hierarchy, so
//! one handler implementation serves unboundedly many concurrent sessions
//! with no session awareness inside it.

use crate::context::SessionContext;
use crate::protocol::ToolDefinition;
use regex::Regex;
use std::sync::OnceLock;

/// Marker pattern for internal tool names: `_query` -> suffix `query`.
fn internal_tool_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^_(.+)$").expect("valid literal regex"))
}

/// Extract the suffix from an internal tool name. Names without the marker
/// pass through whole.
fn tool_suffix(internal_name: &str) -> &str {
    internal_tool_pattern()
        .captures(internal_name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(internal_name)
}

/// Compute the external name for an internal tool within a session.
pub fn external_name(session: &SessionContext, internal_name: &str) -> String {
    format!("{}_{}", session.api_name, tool_suffix(internal_name))
}

/// Prefix a tool description with the session's API tag.
fn tag_description(session: &SessionContext, description: &str) -> String {
    format!(
        "[{} {} API] {description}",
        session.hostname, session.api_kind_label
    )
}

/// Rewrite advertised tools to their session-external identity.
///
/// With no resolvable session (e.g. a non-networked transport), tools pass
/// through unmodified.
pub fn rename_for_listing(
    tools: Vec<ToolDefinition>,
    session: Option<&SessionContext>,
) -> Vec<ToolDefinition> {
    let Some(session) = session else {
        return tools;
    };
    tools
        .into_iter()
        .map(|tool| {
            let name = external_name(session, &tool.name);
            let description = tag_description(session, tool.description.as_deref().unwrap_or(""));
            ToolDefinition {
                name,
                description: Some(description),
                input_schema: tool.input_schema,
            }
        })
        .collect()
}

/// Translate an invoked external name back to its internal marker form.
///
/// The expected prefix is recomputed from the current session's headers; a
/// name lacking it is rejected with an explicit, user-visible message (an
/// error result, never a fault). Without a session the name passes through
/// unchanged.
pub fn resolve_invocation(
    invoked_name: &str,
    session: Option<&SessionContext>,
) -> Result<String, String> {
    let Some(session) = session else {
        return Ok(invoked_name.to_string());
    };

    let expected_prefix = format!("{}_", session.api_name);
    let Some(suffix) = invoked_name.strip_prefix(&expected_prefix) else {
        return Err(format!(
            "Tool '{invoked_name}' not valid for API '{}'. Expected tool name starting with '{expected_prefix}'.",
            session.api_name
        ));
    };

    Ok(format!("_{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SessionContext;
    use serde_json::json;

    fn session() -> SessionContext {
        SessionContext {
            api_name: "github".to_string(),
            hostname: "api.github.com".to_string(),
            api_kind_label: "GraphQL".to_string(),
            target_url: "https://api.github.com/graphql".to_string(),
        }
    }

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: Some("Run a query".to_string()),
            input_schema: json!({"type": "object"}),
        }
    }

    #[test]
    fn test_listing_renames_and_tags() {
        let out = rename_for_listing(vec![tool("_query"), tool("_execute")], Some(&session()));
        assert_eq!(out[0].name, "github_query");
        assert_eq!(out[1].name, "github_execute");
        assert_eq!(
            out[0].description.as_deref(),
            Some("[api.github.com GraphQL API] Run a query")
        );
    }

    #[test]
    fn test_listing_passthrough_without_session() {
        let out = rename_for_listing(vec![tool("_query")], None);
        assert_eq!(out[0].name, "_query");
        assert_eq!(out[0].description.as_deref(), Some("Run a query"));
    }

    #[test]
    fn test_invocation_maps_back_to_internal() {
        assert_eq!(
            resolve_invocation("github_query", Some(&session())).unwrap(),
            "_query"
        );
        assert_eq!(
            resolve_invocation("github_execute", Some(&session())).unwrap(),
            "_execute"
        );
    }

    #[test]
    fn test_invocation_rejects_wrong_prefix() {
        let err = resolve_invocation("shopify_query", Some(&session())).unwrap_err();
        assert!(err.contains("github_"));
        assert!(err.contains("shopify_query"));
    }

    #[test]
    fn test_invocation_passthrough_without_session() {
        assert_eq!(resolve_invocation("_query", None).unwrap(), "_query");
    }

    #[test]
    fn test_unmarked_name_keeps_suffix() {
        assert_eq!(external_name(&session(), "query"), "github_query");
        assert_eq!(external_name(&session(), "_query"), "github_query");
    }
}
