//! Tool registry and builtin tool definitions.
//!
//! Exactly two logical tools exist behind the dispatch surface: a
//! structure/schema query and a generic execute operation. Their internal
//! names carry the `_` marker prefix; the identity middleware derives the
//! per-session external names.

use crate::protocol::ToolDefinition;
use serde_json::json;
use std::collections::HashMap;

/// Internal name of the schema/structure query tool.
pub const QUERY_TOOL: &str = "_query";
/// Internal name of the generic execute tool.
pub const EXECUTE_TOOL: &str = "_execute";

/// Registry of available MCP tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
    /// Registration order, so listings are stable.
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the builtin tool surface.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(query_tool());
        registry.register(execute_tool());
        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: ToolDefinition) {
        if !self.tools.contains_key(&tool.name) {
            self.order.push(tool.name.clone());
        }
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tools in registration order.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).cloned())
            .collect()
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// The structure/schema query tool.
fn query_tool() -> ToolDefinition {
    ToolDefinition {
        name: QUERY_TOOL.to_string(),
        description: Some(
            "Fetch a compact schema description of the target API. For REST APIs, \
             pass spec_url pointing at the OpenAPI document (defaults to the \
             session target URL)."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "spec_url": {
                    "type": "string",
                    "description": "URL of the OpenAPI 3.x document (JSON or YAML)"
                }
            }
        }),
    }
}

/// The generic execute tool.
fn execute_tool() -> ToolDefinition {
    ToolDefinition {
        name: EXECUTE_TOOL.to_string(),
        description: Some(
            "Execute against the target API. Pass query (+ optional variables) to \
             run a read-only GraphQL query; results come back as a bounded table \
             preview. Pass sql with data to filter a JSON payload with SQL; top-level \
             list keys become tables. With both query and sql, the SQL runs over the \
             query's tables."
                .to_string(),
        ),
        input_schema: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "GraphQL query text (mutations are rejected)"
                },
                "variables": {
                    "type": "object",
                    "description": "GraphQL variables"
                },
                "sql": {
                    "type": "string",
                    "description": "SQL to run over staged tables"
                },
                "data": {
                    "description": "JSON payload to stage as tables for sql"
                }
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_surface_is_two_tools() {
        let registry = ToolRegistry::builtin();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(QUERY_TOOL));
        assert!(registry.contains(EXECUTE_TOOL));
    }

    #[test]
    fn test_listing_order_is_stable() {
        let registry = ToolRegistry::builtin();
        let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec![QUERY_TOOL.to_string(), EXECUTE_TOOL.to_string()]);
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut registry = ToolRegistry::builtin();
        registry.register(ToolDefinition {
            name: QUERY_TOOL.to_string(),
            description: Some("replaced".to_string()),
            input_schema: serde_json::json!({}),
        });
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get(QUERY_TOOL).unwrap().description.as_deref(),
            Some("replaced")
        );
    }
}
