//! Tool invocation: arguments → HTTP request → tool result.

use crate::config::AuthConfig;
use crate::error::DispatchError;
use crate::headers::merge_headers;
use crate::query::{
    QueryPair, encode_path_segment, encode_query, serialize_query_param, value_to_string,
};
use crate::registry::{ParamLocation, ToolDefinition, ToolParameter, ToolRegistry};
use crate::schema::declared_type;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use base64::Engine as _;
use mime::Mime;
use parking_lot::RwLock;
use rmcp::model::{CallToolResult, Content};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Maximum number of response body characters kept in a downstream error.
const ERROR_BODY_LIMIT: usize = 4096;

/// Request-shaping settings shared by every call.
#[derive(Debug, Clone, Default)]
pub struct DispatchSettings {
    /// Configured base URL; wins over every `servers` entry.
    pub base_url_override: Option<String>,
    /// Base URL derived from the document's `servers`.
    pub default_base_url: Option<String>,
    /// Headers injected into every request (`EXTRA_HEADERS`).
    pub extra_headers: HashMap<String, String>,
    pub auth: Option<AuthConfig>,
}

/// Successful tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Json(Value),
    Text(String),
    /// Base64-encoded image bytes.
    Image { data: String, mime_type: String },
}

impl ToolOutput {
    fn from_response(response: HttpResponse) -> Self {
        let parsed: Option<Mime> = response
            .content_type
            .as_deref()
            .and_then(|ct| ct.parse().ok());

        if let Some(m) = &parsed
            && m.type_() == mime::IMAGE
        {
            return Self::Image {
                data: base64::engine::general_purpose::STANDARD.encode(&response.body),
                mime_type: m.essence_str().to_string(),
            };
        }

        let is_json = parsed.as_ref().is_some_and(|m| {
            m.subtype() == mime::JSON || m.suffix().is_some_and(|s| s == mime::JSON)
        });
        if is_json && let Ok(v) = serde_json::from_slice::<Value>(&response.body) {
            return Self::Json(v);
        }

        match String::from_utf8(response.body) {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Text(json!({
                "encoding": "base64",
                "mimeType": response.content_type,
                "data": base64::engine::general_purpose::STANDARD.encode(e.as_bytes()),
            })
            .to_string()),
        }
    }
}

impl From<ToolOutput> for CallToolResult {
    fn from(output: ToolOutput) -> Self {
        match output {
            ToolOutput::Json(v) => {
                let text = serde_json::to_string(&v).unwrap_or_else(|_| v.to_string());
                CallToolResult::success(vec![Content::text(text)])
            }
            ToolOutput::Text(text) => CallToolResult::success(vec![Content::text(text)]),
            ToolOutput::Image { data, mime_type } => {
                CallToolResult::success(vec![Content::image(data, mime_type)])
            }
        }
    }
}

impl From<DispatchError> for CallToolResult {
    fn from(err: DispatchError) -> Self {
        CallToolResult {
            content: vec![Content::text(format!("{}: {err}", err.kind()))],
            structured_content: Some(json!({ "error": err.to_json() })),
            is_error: Some(true),
            meta: None,
        }
    }
}

/// Resolves tool calls against a shared registry and executes them through a transport.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<RwLock<ToolRegistry>>,
    transport: Arc<dyn HttpTransport>,
    settings: Arc<DispatchSettings>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: Arc<RwLock<ToolRegistry>>,
        transport: Arc<dyn HttpTransport>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry,
            transport,
            settings: Arc::new(settings),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<RwLock<ToolRegistry>> {
        &self.registry
    }

    /// Invoke a tool by name.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] for unknown tools, missing/invalid arguments, a missing base URL,
    /// transport failures and non-2xx responses.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<ToolOutput, DispatchError> {
        // Clone the definition out of the lock; it must not be held across the request.
        let tool = self
            .registry
            .read()
            .get(name)
            .ok_or_else(|| DispatchError::ToolNotFound {
                name: name.to_string(),
            })?;

        let request = resolve_request(&tool, &arguments, &self.settings)?;
        tracing::info!(
            tool = %tool.name,
            method = %tool.method,
            path = %tool.path,
            "dispatching tool call"
        );

        let response = self.transport.execute(request).await.map_err(|e| match e {
            TransportError::InvalidRequest(msg) => {
                tracing::warn!(tool = %tool.name, error = %msg, "request could not be built");
                DispatchError::Configuration(msg)
            }
            TransportError::Failed(msg) => {
                tracing::warn!(tool = %tool.name, error = %msg, "downstream request failed");
                DispatchError::DownstreamError {
                    status: None,
                    message: format!("Request failed: {msg}"),
                    body: None,
                }
            }
        })?;

        if !response.is_success() {
            let status = response.status;
            let reason = reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown");
            tracing::warn!(tool = %tool.name, status, "downstream returned an error status");
            let mut body = String::from_utf8_lossy(&response.body).into_owned();
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(DispatchError::DownstreamError {
                status: Some(status),
                message: format!("API returned {status} {reason}"),
                body: (!body.is_empty()).then_some(body),
            });
        }

        tracing::debug!(tool = %tool.name, status = response.status, "tool call succeeded");
        Ok(ToolOutput::from_response(response))
    }

    /// [`Dispatcher::dispatch`] mapped onto an MCP result; errors become `isError` results.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> CallToolResult {
        match self.dispatch(name, arguments).await {
            Ok(output) => output.into(),
            Err(err) => err.into(),
        }
    }
}

/// Build the concrete HTTP request for one invocation. Performs no I/O.
///
/// # Errors
///
/// Path parameters are checked first: if any is missing, [`DispatchError::MissingPathParameter`]
/// is returned before anything else is resolved.
pub fn resolve_request(
    tool: &ToolDefinition,
    arguments: &Value,
    settings: &DispatchSettings,
) -> Result<HttpRequest, DispatchError> {
    let mut args: Map<String, Value> = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        _ => {
            return Err(DispatchError::invalid(
                "arguments",
                "tool arguments must be a JSON object",
            ));
        }
    };

    let missing: Vec<String> = tool
        .parameters_in(ParamLocation::Path)
        .filter(|p| match args.get(&p.name) {
            None => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        })
        .map(|p| p.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(DispatchError::MissingPathParameter {
            tool: tool.name.clone(),
            names: missing,
        });
    }

    let mut path = tool.path.clone();
    for param in tool.parameters_in(ParamLocation::Path) {
        let Some(value) = args.remove(&param.name) else {
            continue;
        };
        if value.is_array() || value.is_object() {
            return Err(DispatchError::invalid(
                &param.name,
                "path parameters must be scalar values",
            ));
        }
        check_shape(param, &value)?;
        path = path.replace(
            &format!("{{{}}}", param.name),
            &encode_path_segment(&value_to_string(&value)),
        );
    }

    let mut query: Vec<QueryPair> = Vec::new();
    for param in tool.parameters_in(ParamLocation::Query) {
        match args.remove(&param.name) {
            Some(value) => {
                check_shape(param, &value)?;
                let ser = param.query.clone().unwrap_or_default();
                query.extend(serialize_query_param(&param.name, &value, param.required, &ser));
            }
            None if param.required => {
                return Err(DispatchError::invalid(
                    &param.name,
                    "required query parameter is missing",
                ));
            }
            None => {}
        }
    }

    let body = resolve_body(tool, args)?;

    let base_url = settings
        .base_url_override
        .as_deref()
        .or(tool.base_url.as_deref())
        .or(settings.default_base_url.as_deref())
        .ok_or_else(|| {
            DispatchError::Configuration(
                "no base URL: set a server URL override or declare 'servers' in the document"
                    .to_string(),
            )
        })?;

    if let Some(AuthConfig::Query { name, value }) = &settings.auth {
        query.push(QueryPair {
            key: name.clone(),
            value: value.clone(),
            allow_reserved: false,
        });
    }

    let mut url = Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), path))
        .map_err(|e| DispatchError::Configuration(format!("invalid request URL: {e}")))?;
    if !query.is_empty() {
        url.set_query(Some(&encode_query(&query)));
    }

    let mut implied = vec![("Accept".to_string(), "application/json".to_string())];
    if body.is_some() {
        implied.push(("Content-Type".to_string(), "application/json".to_string()));
    }
    implied.extend(auth_headers(settings.auth.as_ref()));

    Ok(HttpRequest {
        method: tool.method.clone(),
        url,
        headers: merge_headers(implied, &settings.extra_headers),
        body,
    })
}

fn resolve_body(
    tool: &ToolDefinition,
    mut args: Map<String, Value>,
) -> Result<Option<Value>, DispatchError> {
    if let Some(param) = tool.parameters_in(ParamLocation::Body).next() {
        let body = args.remove(&param.name);
        if !args.is_empty() {
            let ignored: Vec<&String> = args.keys().collect();
            tracing::debug!(tool = %tool.name, ?ignored, "dropping unknown arguments");
        }
        return match body {
            Some(value) => {
                check_shape(param, &value)?;
                Ok(Some(value))
            }
            None if param.required => Err(DispatchError::invalid(
                &param.name,
                "required request body is missing",
            )),
            None => Ok(None),
        };
    }

    let mut fields = Map::new();
    for param in tool.parameters_in(ParamLocation::BodyField) {
        match args.remove(&param.name) {
            Some(value) => {
                check_shape(param, &value)?;
                fields.insert(param.name.clone(), value);
            }
            None if param.required => {
                return Err(DispatchError::invalid(
                    &param.name,
                    "required body field is missing",
                ));
            }
            None => {}
        }
    }

    if !args.is_empty() {
        if tool.accepts_body() {
            fields.extend(args);
        } else {
            let ignored: Vec<&String> = args.keys().collect();
            tracing::debug!(tool = %tool.name, ?ignored, "dropping unknown arguments");
        }
    }

    Ok((!fields.is_empty()).then_some(Value::Object(fields)))
}

fn auth_headers(auth: Option<&AuthConfig>) -> Vec<(String, String)> {
    match auth {
        Some(AuthConfig::Bearer { token }) => {
            vec![("Authorization".to_string(), format!("Bearer {token}"))]
        }
        Some(AuthConfig::Basic { username, password }) => {
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
            vec![("Authorization".to_string(), format!("Basic {encoded}"))]
        }
        Some(AuthConfig::Header { name, value }) => vec![(name.clone(), value.clone())],
        Some(AuthConfig::Query { .. } | AuthConfig::None) | None => Vec::new(),
    }
}

/// Shape-level check of an argument against its declared type.
///
/// Scalars are accepted in string form (`"10"` for an integer) since many clients stringify.
fn check_shape(param: &ToolParameter, value: &Value) -> Result<(), DispatchError> {
    let Some(expected) = declared_type(&param.schema) else {
        return Ok(());
    };
    let as_str = value.as_str().map(str::trim);
    let ok = match expected {
        "string" => !(value.is_array() || value.is_object()),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || as_str.is_some_and(|s| s.parse::<i64>().is_ok())
        }
        "number" => value.is_number() || as_str.is_some_and(|s| s.parse::<f64>().is_ok()),
        "boolean" => value.is_boolean() || matches!(as_str, Some("true" | "false")),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(DispatchError::invalid(
            &param.name,
            format!("expected {expected}, got {}", json_type_name(value)),
        ))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
