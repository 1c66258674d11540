//! OpenAPI 3.x loading and compact schema context building.
//!
//! This module turns a verbose OpenAPI document into a compact textual DSL
//! an agent can hold in context:
//!
//! ```text
//! <endpoints>
//! GET /users/{id}(id: int) -> User  # Get user by ID
//!
//! <schemas>
//! User { id: int!, name: str! }
//!
//! <auth>
//! bearerAuth: HTTP bearer JWT
//! ```
//!
//! Only required parameters and required object fields are rendered. That is
//! deliberate information hiding: an agent that never sees optional fields
//! cannot invent values for them. `$ref` resolution is shallow by the same
//! logic: the trailing path segment is used verbatim as a type name, with
//! no dereferencing and no cycle handling. This is a display DSL, not a
//! schema resolver.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Sentinel appended when the assembled DSL exceeds the schema budget.
const TRUNCATION_SENTINEL: &str =
    "\n[SCHEMA TRUNCATED - use a narrower search of the raw spec instead]";

/// Compact recursive type descriptor resolved from a JSON Schema fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactType {
    /// Named reference from `$ref`, not dereferenced.
    Reference(String),
    /// Homogeneous array.
    Array(Box<CompactType>),
    /// Object with `additionalProperties`.
    Dict(Box<CompactType>),
    /// Plain object without a dict shape.
    Object,
    /// Scalar with an optional string format.
    Scalar {
        kind: ScalarKind,
        format: Option<String>,
    },
    /// Unknown or missing schema.
    Any,
    /// Unrecognized declared type, passed through verbatim.
    Verbatim(String),
}

/// Scalar kinds in the compact grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Str,
    Int,
    Float,
    Bool,
}

impl CompactType {
    /// Resolve a JSON Schema fragment to a compact type.
    ///
    /// `field_name` is used to infer a string format when the schema does
    /// not declare one. Resolution is a pure function of its inputs.
    pub fn resolve(schema: &Value, field_name: &str) -> Self {
        let Some(obj) = schema.as_object() else {
            return Self::Any;
        };
        if obj.is_empty() {
            return Self::Any;
        }

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            let name = reference.rsplit('/').next().unwrap_or(reference);
            return Self::Reference(name.to_string());
        }

        match declared_type(obj).as_deref() {
            Some("array") => {
                let elem = obj
                    .get("items")
                    .map_or(Self::Any, |items| Self::resolve(items, ""));
                Self::Array(Box::new(elem))
            }
            Some("object") => match obj.get("additionalProperties") {
                Some(Value::Bool(true)) => Self::Dict(Box::new(Self::Any)),
                Some(extra @ Value::Object(map)) if !map.is_empty() => {
                    Self::Dict(Box::new(Self::resolve(extra, "")))
                }
                _ => Self::Object,
            },
            Some("string") => {
                let format = obj
                    .get("format")
                    .and_then(Value::as_str)
                    .filter(|f| !f.is_empty())
                    .map(String::from)
                    .or_else(|| infer_string_format(field_name));
                Self::Scalar {
                    kind: ScalarKind::Str,
                    format,
                }
            }
            Some("integer") => Self::Scalar {
                kind: ScalarKind::Int,
                format: None,
            },
            Some("number") => Self::Scalar {
                kind: ScalarKind::Float,
                format: None,
            },
            Some("boolean") => Self::Scalar {
                kind: ScalarKind::Bool,
                format: None,
            },
            Some(other) => Self::Verbatim(other.to_string()),
            None => Self::Any,
        }
    }

    /// Render the type in the compact grammar.
    pub fn render(&self) -> String {
        match self {
            Self::Reference(name) => name.clone(),
            Self::Array(elem) => format!("{}[]", elem.render()),
            Self::Dict(value) => format!("dict[str, {}]", value.render()),
            Self::Object => "object".to_string(),
            Self::Scalar { kind, format } => {
                let base = match kind {
                    ScalarKind::Str => "str",
                    ScalarKind::Int => "int",
                    ScalarKind::Float => "float",
                    ScalarKind::Bool => "bool",
                };
                match format {
                    Some(f) => format!("{base}({f})"),
                    None => base.to_string(),
                }
            }
            Self::Any => "any".to_string(),
            Self::Verbatim(t) => t.clone(),
        }
    }
}

/// Declared schema type, flattening OpenAPI 3.1 type arrays to the first
/// non-null entry.
fn declared_type(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("type") {
        Some(Value::String(t)) => Some(t.clone()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .map(String::from)
            .or(Some("any".to_string())),
        _ => None,
    }
}

/// Infer a string format from the field name when the schema has none.
fn infer_string_format(field_name: &str) -> Option<String> {
    if field_name.is_empty() {
        return None;
    }
    let name = field_name.to_lowercase();
    if name.contains("datetime") {
        return Some("date-time".to_string());
    }
    if name.contains("date") && !name.contains("update") {
        return Some("date".to_string());
    }
    if name.contains("time") && !name.contains("update") {
        return Some("time".to_string());
    }
    None
}

/// One endpoint line in the DSL: method, path, required-only parameters,
/// optional request body, return type, summary.
#[derive(Debug, Clone)]
pub struct EndpointSignature {
    pub method: String,
    pub path: String,
    /// Required parameters only, in declaration order.
    pub params: Vec<(String, CompactType)>,
    /// Request body type and whether the body is required.
    pub body: Option<(CompactType, bool)>,
    pub returns: CompactType,
    pub summary: String,
}

impl EndpointSignature {
    /// Render the endpoint as one DSL line.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if let Some((body_type, required)) = &self.body {
            let suffix = if *required { "!" } else { "" };
            parts.push(format!("body: {}{suffix}", body_type.render()));
        }
        for (name, param_type) in &self.params {
            parts.push(format!("{name}: {}", param_type.render()));
        }
        let desc = if self.summary.is_empty() {
            String::new()
        } else {
            format!("  # {}", self.summary)
        };
        format!(
            "{} {}({}) -> {}{desc}",
            self.method,
            self.path,
            parts.join(", "),
            self.returns.render(),
        )
    }
}

/// Build an endpoint signature for one path/method pair.
fn build_signature(method: &str, path: &str, path_item: &Value, op: &Value) -> EndpointSignature {
    // Path-level parameters come first, then operation-level.
    let mut raw_params: Vec<&Value> = Vec::new();
    for source in [path_item, op] {
        if let Some(list) = source.get("parameters").and_then(Value::as_array) {
            raw_params.extend(list.iter());
        }
    }

    let mut params = Vec::new();
    for p in raw_params {
        let name = p.get("name").and_then(Value::as_str).unwrap_or("");
        // Path parameters are implicitly required.
        let required = p.get("required").and_then(Value::as_bool).unwrap_or_else(|| {
            p.get("in").and_then(Value::as_str) == Some("path")
        });
        if !required {
            continue;
        }
        let param_type = p
            .get("schema")
            .map_or(CompactType::Any, |schema| CompactType::resolve(schema, name));
        params.push((name.to_string(), param_type));
    }

    let body = if matches!(method, "post" | "put" | "patch") {
        op.get("requestBody").and_then(|req_body| {
            json_content_schema(req_body).map(|schema| {
                let required = req_body
                    .get("required")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                (CompactType::resolve(schema, ""), required)
            })
        })
    } else {
        None
    };

    let summary = op
        .get("description")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| op.get("summary").and_then(Value::as_str).filter(|s| !s.is_empty()))
        .or_else(|| op.get("operationId").and_then(Value::as_str))
        .unwrap_or("")
        .to_string();

    EndpointSignature {
        method: method.to_uppercase(),
        path: path.to_string(),
        params,
        body,
        returns: extract_response_type(op.get("responses")),
        summary,
    }
}

/// Return type from the first present of `200`, `201`, `default` JSON
/// responses.
fn extract_response_type(responses: Option<&Value>) -> CompactType {
    let Some(responses) = responses else {
        return CompactType::Any;
    };
    for code in ["200", "201", "default"] {
        if let Some(schema) = responses.get(code).and_then(json_content_schema) {
            return CompactType::resolve(schema, "");
        }
    }
    CompactType::Any
}

/// Pull a non-empty `content."application/json".schema` out of a response
/// or request body object.
fn json_content_schema(container: &Value) -> Option<&Value> {
    container
        .get("content")
        .and_then(|c| c.get("application/json"))
        .and_then(|j| j.get("schema"))
        .filter(|schema| matches!(schema, Value::Object(obj) if !obj.is_empty()))
}

/// Render one component schema definition.
///
/// Object schemas list only required fields (`name: type!`); enum schemas
/// render their values; anything else falls back to the compact type.
fn format_schema(name: &str, schema: &Value) -> String {
    let is_object = schema.get("type").and_then(Value::as_str) == Some("object")
        || schema.get("properties").is_some();

    if is_object {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut fields = Vec::new();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (field_name, field_schema) in props {
                if !required.contains(&field_name.as_str()) {
                    continue;
                }
                let field_type = CompactType::resolve(field_schema, field_name);
                fields.push(format!("{field_name}: {}!", field_type.render()));
            }
        }
        return format!("{name} {{ {} }}", fields.join(", "));
    }

    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        if !values.is_empty() {
            let rendered: Vec<String> = values.iter().map(plain_value).collect();
            return format!("{name}: enum({})", rendered.join(" | "));
        }
    }

    format!("{name}: {}", CompactType::resolve(schema, "").render())
}

/// Render a JSON value without string quoting, for enum members.
fn plain_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render one security scheme line.
fn format_security_scheme(name: &str, scheme: &Value) -> String {
    let scheme_type = scheme.get("type").and_then(Value::as_str).unwrap_or("");
    match scheme_type {
        "http" => {
            let http_scheme = scheme.get("scheme").and_then(Value::as_str).unwrap_or("");
            let bearer_format = scheme
                .get("bearerFormat")
                .and_then(Value::as_str)
                .unwrap_or("");
            format!("{name}: HTTP {http_scheme} {bearer_format}")
                .trim_end()
                .to_string()
        }
        "apiKey" => {
            let in_loc = scheme.get("in").and_then(Value::as_str).unwrap_or("");
            let key_name = scheme.get("name").and_then(Value::as_str).unwrap_or("");
            format!("{name}: API key in {in_loc} '{key_name}'")
        }
        "oauth2" => format!("{name}: OAuth2"),
        other => format!("{name}: {other}"),
    }
}

/// Build the compact schema context from an OpenAPI document, bounded by
/// `max_chars`.
///
/// Documents without an `openapi` version starting with `3.` compact to the
/// empty string; callers must treat empty as "unusable", not as a spec with
/// no content.
pub fn compact(spec: &Value, max_chars: usize) -> String {
    let version = spec.get("openapi").and_then(Value::as_str).unwrap_or("");
    if !version.starts_with("3.") {
        tracing::warn!(version, "unsupported OpenAPI version, expected 3.x");
        return String::new();
    }

    let mut sections: Vec<String> = Vec::new();

    let mut endpoint_lines = Vec::new();
    if let Some(paths) = spec.get("paths").and_then(Value::as_object) {
        for (path, path_item) in paths {
            for method in ["get", "post", "put", "delete", "patch"] {
                if let Some(op) = path_item.get(method) {
                    endpoint_lines.push(build_signature(method, path, path_item, op).render());
                }
            }
        }
    }
    if !endpoint_lines.is_empty() {
        sections.push(format!("<endpoints>\n{}", endpoint_lines.join("\n")));
    }

    let components = spec.get("components");
    if let Some(schemas) = components
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
    {
        if !schemas.is_empty() {
            let lines: Vec<String> = schemas
                .iter()
                .map(|(name, schema)| format_schema(name, schema))
                .collect();
            sections.push(format!("<schemas>\n{}", lines.join("\n")));
        }
    }

    if let Some(schemes) = components
        .and_then(|c| c.get("securitySchemes"))
        .and_then(Value::as_object)
    {
        if !schemes.is_empty() {
            let lines: Vec<String> = schemes
                .iter()
                .map(|(name, scheme)| format_security_scheme(name, scheme))
                .collect();
            sections.push(format!("<auth>\n{}", lines.join("\n")));
        }
    }

    let text = sections.join("\n\n");
    enforce_budget(text, max_chars)
}

/// Hard-truncate to the budget and append the exploration sentinel.
fn enforce_budget(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str(TRUNCATION_SENTINEL);
    truncated
}

/// Extract the base URL from the spec's `servers[0]`, or derive scheme+host
/// from the spec's own fetch URL.
pub fn base_url_from_spec(spec: &Value, spec_url: &str) -> String {
    if let Some(url) = spec
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|servers| servers.first())
        .and_then(|server| server.get("url"))
        .and_then(Value::as_str)
    {
        return url.to_string();
    }

    if !spec_url.is_empty() {
        if let Ok(parsed) = Url::parse(spec_url) {
            if let Some(host) = parsed.host_str() {
                return format!("{}://{host}", parsed.scheme());
            }
        }
    }

    String::new()
}

/// Compacted schema context plus the resolved base URL.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    /// The bounded DSL text; empty means the spec was unusable.
    pub context: String,
    /// Base URL for subsequent REST calls.
    pub base_url: String,
}

/// Load an OpenAPI 3.x document from a URL. The body may be JSON or YAML.
pub async fn load_spec(
    spec_url: &str,
    headers: &HashMap<String, String>,
    timeout: Duration,
) -> anyhow::Result<Value> {
    if spec_url.is_empty() {
        anyhow::bail!("no spec URL provided");
    }

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let mut request = client.get(spec_url);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    let response = request.send().await?.error_for_status()?;
    let raw = response.text().await?;

    let spec: Value = if raw.trim_start().starts_with('{') {
        serde_json::from_str(&raw)?
    } else {
        serde_yaml::from_str(&raw)?
    };
    Ok(spec)
}

/// Fetch and compact a schema context.
///
/// Load failures and unusable versions degrade to an empty context with a
/// logged warning; they never propagate as faults.
pub async fn fetch_schema_context(
    spec_url: &str,
    headers: &HashMap<String, String>,
    timeout: Duration,
    max_chars: usize,
) -> SchemaContext {
    let spec = match load_spec(spec_url, headers, timeout).await {
        Ok(spec) => spec,
        Err(e) => {
            tracing::warn!(spec_url, error = %e, "failed to load OpenAPI spec");
            return SchemaContext::default();
        }
    };

    let context = compact(&spec, max_chars);
    if context.is_empty() {
        return SchemaContext::default();
    }
    SchemaContext {
        context,
        base_url: base_url_from_spec(&spec, spec_url),
    }
}
