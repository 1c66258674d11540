//! Session context derivation from request headers.
//!
//! A session is one request/response exchange carrying headers that identify
//! the target API (`x-target-url`) and its kind (`x-api-type`). Everything
//! here is a pure function of the current request's `RequestContext`; there
//! is no session registry.

use crate::protocol::RequestContext;
use url::Url;

/// Resolved identity of the API a session is talking to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Short name used as the tool name prefix (e.g. `github`).
    pub api_name: String,
    /// Full hostname used in description tags (e.g. `api.github.com`).
    pub hostname: String,
    /// API kind label: "GraphQL" or "REST".
    pub api_kind_label: String,
    /// Raw target URL, for building outbound requests.
    pub target_url: String,
}

impl SessionContext {
    /// Derive the session context from request headers, or `None` if no
    /// session headers are resolvable.
    pub fn resolve(ctx: &RequestContext) -> Option<Self> {
        if !ctx.has_session() {
            return None;
        }
        let target_url = ctx.target_url.clone().unwrap_or_default();
        let api_kind = ctx.api_kind.as_deref().unwrap_or("api");
        Some(Self {
            api_name: api_name(&target_url),
            hostname: full_hostname(&target_url),
            api_kind_label: api_kind_label(api_kind),
            target_url,
        })
    }
}

/// Extract the full hostname from a URL, falling back to the raw string for
/// non-URL input and `"unknown"` for empty input.
pub fn full_hostname(target_url: &str) -> String {
    if target_url.is_empty() {
        return "unknown".to_string();
    }
    match Url::parse(target_url) {
        Ok(url) => url.host_str().unwrap_or("unknown").to_string(),
        Err(_) => target_url.to_string(),
    }
}

/// Derive a short, tool-name-safe API name from the target URL.
///
/// Takes the first hostname label after stripping a leading `www.` or
/// `api.`, lowercased, with anything outside `[a-z0-9]` mapped to `_`.
pub fn api_name(target_url: &str) -> String {
    let hostname = full_hostname(target_url);
    if hostname == "unknown" {
        return "unknown".to_string();
    }
    let trimmed = hostname
        .strip_prefix("www.")
        .or_else(|| hostname.strip_prefix("api."))
        .unwrap_or(&hostname);
    let label = trimmed.split('.').next().unwrap_or(trimmed);
    let name: String = label
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name
    }
}

fn api_kind_label(api_kind: &str) -> String {
    if api_kind.eq_ignore_ascii_case("graphql") {
        "GraphQL".to_string()
    } else {
        "REST".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_hostname() {
        assert_eq!(full_hostname("https://api.github.com/graphql"), "api.github.com");
        assert_eq!(full_hostname("not a url"), "not a url");
        assert_eq!(full_hostname(""), "unknown");
    }

    #[test]
    fn test_api_name_strips_common_prefixes() {
        assert_eq!(api_name("https://api.github.com/graphql"), "github");
        assert_eq!(api_name("https://www.example.org/v1"), "example");
        assert_eq!(api_name("https://petstore.swagger.io/v2"), "petstore");
    }

    #[test]
    fn test_api_name_sanitizes() {
        assert_eq!(api_name("https://my-api.example.com"), "my_api");
        assert_eq!(api_name(""), "unknown");
    }

    #[test]
    fn test_resolve_none_without_headers() {
        assert!(SessionContext::resolve(&RequestContext::default()).is_none());
    }

    #[test]
    fn test_resolve_graphql_session() {
        let ctx = RequestContext {
            target_url: Some("https://api.github.com/graphql".to_string()),
            api_kind: Some("graphql".to_string()),
        };
        let session = SessionContext::resolve(&ctx).unwrap();
        assert_eq!(session.api_name, "github");
        assert_eq!(session.hostname, "api.github.com");
        assert_eq!(session.api_kind_label, "GraphQL");
    }

    #[test]
    fn test_resolve_defaults_to_rest_label() {
        let ctx = RequestContext {
            target_url: Some("https://petstore.swagger.io/v2".to_string()),
            api_kind: None,
        };
        let session = SessionContext::resolve(&ctx).unwrap();
        assert_eq!(session.api_kind_label, "REST");
    }
}
