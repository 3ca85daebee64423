//! Spec loading and base URL resolution.

use crate::error::{OpenApiToolsError, Result};
use crate::transport::{read_body_limited, sanitize_reqwest_error};
use reqwest::Client;
use serde_json::Value;
use url::Url;

/// Size cap for fetched documents when no explicit limit is configured.
pub const DEFAULT_MAX_SPEC_BYTES: usize = 32 * 1024 * 1024;

fn is_http_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Load an `OpenAPI` document from an `http(s)://` URL, a `file://` URL or a filesystem path.
///
/// JSON is a subset of YAML, so both formats go through `serde_yaml`. Fetched documents are
/// capped at `max_bytes` (default [`DEFAULT_MAX_SPEC_BYTES`]).
///
/// # Errors
///
/// Returns an error if the document cannot be fetched/read, does not parse, or is not a mapping.
pub async fn load_spec(location: &str, client: &Client, max_bytes: Option<usize>) -> Result<Value> {
    let content = if is_http_url(location) {
        tracing::info!(spec = %location, "fetching OpenAPI spec");
        fetch_spec(location, client, max_bytes.unwrap_or(DEFAULT_MAX_SPEC_BYTES)).await?
    } else {
        let path = match location.strip_prefix("file://") {
            Some(p) => p,
            None => location,
        };
        tracing::info!(spec = %path, "loading OpenAPI spec");
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| OpenApiToolsError::SpecReadFile {
                path: path.to_string(),
                source: e,
            })?
    };

    parse_spec(location, &content)
}

async fn fetch_spec(location: &str, client: &Client, max_bytes: usize) -> Result<String> {
    let fetch_err = |message: String| OpenApiToolsError::SpecFetch {
        url: location.to_string(),
        message,
    };

    let resp = client
        .get(location)
        .send()
        .await
        .map_err(|e| fetch_err(sanitize_reqwest_error(&e)))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(fetch_err(format!("HTTP {status}")));
    }

    let bytes = read_body_limited(resp, Some(max_bytes))
        .await
        .map_err(|e| fetch_err(e.to_string()))?;
    String::from_utf8(bytes).map_err(|_| fetch_err("document is not valid UTF-8".to_string()))
}

/// Parse spec text (JSON or YAML) into a document value.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::SpecParse`] for malformed text or a non-mapping root.
pub fn parse_spec(location: &str, content: &str) -> Result<Value> {
    let parse_err = |message: String| OpenApiToolsError::SpecParse {
        location: location.to_string(),
        message,
    };

    let doc: Value = serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
    if !doc.is_object() {
        return Err(parse_err("document root is not a mapping".to_string()));
    }
    Ok(doc)
}

/// URL of the first usable entry of a `servers` array, with variables substituted.
#[must_use]
pub fn first_server_url(servers: Option<&Value>) -> Option<String> {
    let server = servers?.as_array()?.first()?;
    let url = server.get("url")?.as_str()?.trim();
    if url.is_empty() {
        return None;
    }
    Some(substitute_server_variables(url, server.get("variables")))
}

/// Replace `{var}` placeholders with each variable's `default`.
fn substitute_server_variables(url: &str, variables: Option<&Value>) -> String {
    let Some(vars) = variables.and_then(Value::as_object) else {
        return url.to_string();
    };
    vars.iter().fold(url.to_string(), |acc, (name, var)| {
        match var.get("default").and_then(Value::as_str) {
            Some(default) => acc.replace(&format!("{{{name}}}"), default),
            None => acc,
        }
    })
}

/// Turn a (possibly relative) server URL into an absolute base URL.
///
/// Relative URLs (`/api/v3`) are resolved against the spec URL when the spec was fetched over
/// HTTP; otherwise they cannot be used and `None` is returned.
#[must_use]
pub fn absolutize_base_url(base_url: &str, spec_location: Option<&str>) -> Option<String> {
    if is_http_url(base_url) {
        return Some(base_url.trim_end_matches('/').to_string());
    }

    let spec_location = spec_location.filter(|s| is_http_url(s))?;
    let mut spec_url = Url::parse(spec_location).ok()?;
    spec_url.set_fragment(None);
    match spec_url.join(base_url) {
        Ok(resolved) => Some(resolved.to_string().trim_end_matches('/').to_string()),
        Err(e) => {
            tracing::warn!(base_url = %base_url, error = %e, "cannot resolve relative server URL");
            None
        }
    }
}

/// Base URL for the whole document: the configured override, else `servers[0]`.
#[must_use]
pub fn resolve_base_url(
    override_url: Option<&str>,
    spec: &Value,
    spec_location: Option<&str>,
) -> Option<String> {
    if let Some(url) = override_url.map(str::trim).filter(|u| !u.is_empty()) {
        return Some(url.trim_end_matches('/').to_string());
    }
    let server = first_server_url(spec.get("servers"))?;
    absolutize_base_url(&server, spec_location)
}
