//! Tool registry and the `OpenAPI` → tool registration pass.

use crate::config::DEFAULT_TOOL_NAME_MAX_LENGTH;
use crate::error::{OpenApiToolsError, Result};
use crate::loader::{absolutize_base_url, first_server_url};
use crate::naming::{NamingPolicy, reserve_unique_tool_name};
use crate::query::QuerySerialization;
use crate::resolver::RefResolver;
use crate::schema::{parameter_schema, schema_to_json};
use crate::semantics::annotations_for_method;
use crate::whitelist::ToolWhitelist;
use regex::Regex;
use reqwest::Method;
use rmcp::model::{JsonObject, Tool};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Argument name used when a request body is not a JSON object.
pub const BODY_ARGUMENT: &str = "body";

static PATH_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^}/]+)\}").expect("static regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    /// One top-level property of a JSON object request body.
    BodyField,
    /// The whole (non-object) request body.
    Body,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    /// Converted JSON Schema, as advertised in the tool's input schema.
    pub schema: Value,
    /// Serialization rules, for query parameters only.
    pub query: Option<QuerySerialization>,
}

/// One registered operation.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub summary: Option<String>,
    pub operation_id: Option<String>,
    pub input_schema: Value,
    pub method: Method,
    /// Path template as written in the document (`/workspaces/{workspace_gid}/custom_fields`).
    pub path: String,
    pub parameters: Vec<ToolParameter>,
    /// Base URL from operation- or path-level `servers`, if any.
    pub base_url: Option<String>,
}

impl ToolDefinition {
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameters_in(&self, location: ParamLocation) -> impl Iterator<Item = &ToolParameter> {
        self.parameters.iter().filter(move |p| p.location == location)
    }

    /// Whether unmatched arguments are folded into a JSON body.
    #[must_use]
    pub fn accepts_body(&self) -> bool {
        self.method == Method::POST || self.method == Method::PUT || self.method == Method::PATCH
    }

    /// MCP listing entry.
    #[must_use]
    pub fn to_tool(&self) -> Tool {
        let schema: JsonObject = self
            .input_schema
            .as_object()
            .cloned()
            .unwrap_or_else(JsonObject::new);
        let mut tool = Tool::new(self.name.clone(), self.description.clone(), Arc::new(schema));
        tool.annotations = Some(annotations_for_method(&self.method, self.summary.as_deref()));
        tool
    }
}

/// Ordered set of tools keyed by unique name.
///
/// Names stay reserved until [`ToolRegistry::clear`], so repeated registration passes never
/// produce duplicates.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<ToolDefinition>>,
    by_name: HashMap<String, usize>,
    names: HashSet<String>,
    operations: HashSet<(Method, String)>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.by_name.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ToolDefinition>> {
        self.tools.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn clear(&mut self) {
        self.tools.clear();
        self.by_name.clear();
        self.names.clear();
        self.operations.clear();
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|t| t.to_tool()).collect()
    }

    fn contains_operation(&self, method: &Method, path: &str) -> bool {
        self.operations.contains(&(method.clone(), path.to_string()))
    }

    fn insert(&mut self, tool: Arc<ToolDefinition>) {
        self.names.insert(tool.name.clone());
        self.operations
            .insert((tool.method.clone(), tool.path.clone()));
        self.by_name.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationOptions {
    pub whitelist: ToolWhitelist,
    pub naming: NamingPolicy,
    /// Where the document was loaded from; relative `servers` URLs resolve against it.
    pub spec_location: Option<String>,
}

impl Default for RegistrationOptions {
    fn default() -> Self {
        Self {
            whitelist: ToolWhitelist::default(),
            naming: NamingPolicy {
                prefix: None,
                max_length: DEFAULT_TOOL_NAME_MAX_LENGTH,
            },
            spec_location: None,
        }
    }
}

/// Derive one tool per operation of `spec` and append them to `registry`.
///
/// Returns the newly registered tools in document order. A document without `paths`, or whose
/// operations are all filtered out, yields an empty result. Operations that cannot be turned into
/// tools (unresolvable refs, malformed parameters) are skipped with a warning.
pub fn register_functions(
    registry: &mut ToolRegistry,
    spec: &Value,
    options: &RegistrationOptions,
) -> Vec<Arc<ToolDefinition>> {
    let mut registered = Vec::new();

    let Some(paths) = spec.get("paths") else {
        tracing::warn!("OpenAPI document has no 'paths'; no tools registered");
        return registered;
    };
    let Some(paths) = paths.as_object() else {
        tracing::warn!("OpenAPI 'paths' is not a mapping; no tools registered");
        return registered;
    };

    let resolver = RefResolver::new(spec);

    for (path, item) in paths {
        let item = match resolver.resolve(item) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "skipping path item");
                continue;
            }
        };
        let Some(item_obj) = item.as_object() else {
            tracing::warn!(path = %path, "skipping path item that is not a mapping");
            continue;
        };

        for (key, operation) in item_obj {
            let key = key.to_ascii_lowercase();
            if !HTTP_METHODS.contains(&key.as_str()) {
                continue;
            }
            let method = match Method::from_bytes(key.to_ascii_uppercase().as_bytes()) {
                Ok(m) => m,
                Err(_) => continue,
            };

            if let Some(tool) =
                register_operation(registry, &resolver, options, path, item, &method, operation)
            {
                registered.push(tool);
            }
        }
    }

    tracing::info!(
        registered = registered.len(),
        total = registry.len(),
        "registered OpenAPI tools"
    );
    registered
}

fn register_operation(
    registry: &mut ToolRegistry,
    resolver: &RefResolver<'_>,
    options: &RegistrationOptions,
    path: &str,
    item: &Value,
    method: &Method,
    operation: &Value,
) -> Option<Arc<ToolDefinition>> {
    let Some(op) = operation.as_object() else {
        tracing::warn!(method = %method, path = %path, "skipping operation that is not a mapping");
        return None;
    };

    let operation_id = op
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let base_name = options
        .naming
        .base_name(operation_id, method.as_str(), path);

    if !(options.whitelist.is_tool_whitelisted(path)
        || options.whitelist.is_tool_whitelisted(&base_name))
    {
        tracing::debug!(method = %method, path = %path, "operation not whitelisted");
        return None;
    }

    if registry.contains_operation(method, path) {
        tracing::warn!(
            method = %method,
            path = %path,
            "operation already registered; keeping the first registration"
        );
        return None;
    }

    let parameters = match collect_parameters(resolver, path, item, operation) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(method = %method, path = %path, error = %e, "skipping operation");
            return None;
        }
    };

    let summary = non_empty_str(op.get("summary"));
    let description = summary
        .clone()
        .or_else(|| non_empty_str(op.get("description")))
        .unwrap_or_else(|| format!("Calls {method} {path}"));

    let base_url = first_server_url(operation.get("servers"))
        .or_else(|| first_server_url(item.get("servers")))
        .and_then(|url| absolutize_base_url(&url, options.spec_location.as_deref()));

    let name = reserve_unique_tool_name(
        &mut registry.names,
        &base_name,
        options.naming.max_length,
    );

    let tool = Arc::new(ToolDefinition {
        input_schema: build_input_schema(&parameters),
        name,
        description,
        summary,
        operation_id: operation_id.map(str::to_string),
        method: method.clone(),
        path: path.to_string(),
        parameters,
        base_url,
    });
    tracing::debug!(tool = %tool.name, method = %method, path = %path, "registered tool");
    registry.insert(Arc::clone(&tool));
    Some(tool)
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn collect_parameters(
    resolver: &RefResolver<'_>,
    path: &str,
    item: &Value,
    operation: &Value,
) -> Result<Vec<ToolParameter>> {
    // Path-level parameters first, then operation parameters overriding on (in, name).
    let mut declared: Vec<(String, String, &Value)> = Vec::new();
    for source in [item.get("parameters"), operation.get("parameters")] {
        let Some(list) = source else { continue };
        let Some(list) = list.as_array() else {
            return Err(OpenApiToolsError::OpenApi(
                "'parameters' is not a sequence".to_string(),
            ));
        };
        for raw in list {
            let param = resolver.resolve(raw)?;
            let name = param.get("name").and_then(Value::as_str).ok_or_else(|| {
                OpenApiToolsError::OpenApi("parameter without a 'name'".to_string())
            })?;
            let location = param.get("in").and_then(Value::as_str).ok_or_else(|| {
                OpenApiToolsError::OpenApi(format!("parameter '{name}' has no 'in'"))
            })?;
            match declared
                .iter_mut()
                .find(|(n, l, _)| n == name && l == location)
            {
                Some(slot) => slot.2 = param,
                None => declared.push((name.to_string(), location.to_string(), param)),
            }
        }
    }

    let mut params: Vec<ToolParameter> = Vec::new();
    for (name, location, param) in declared {
        let location = match location.as_str() {
            "path" => ParamLocation::Path,
            "query" => ParamLocation::Query,
            "header" | "cookie" => {
                tracing::debug!(parameter = %name, location = %location, "not exposed as a tool argument");
                continue;
            }
            other => {
                return Err(OpenApiToolsError::OpenApi(format!(
                    "parameter '{name}' has unsupported location '{other}'"
                )));
            }
        };
        let required = location == ParamLocation::Path
            || param.get("required").and_then(Value::as_bool).unwrap_or(false);
        params.push(ToolParameter {
            schema: parameter_schema(resolver, param),
            query: (location == ParamLocation::Query).then(|| QuerySerialization::from_parameter(param)),
            name,
            location,
            required,
        });
    }

    for caps in PATH_PLACEHOLDER.captures_iter(path) {
        let name = &caps[1];
        let declared = params
            .iter()
            .any(|p| p.location == ParamLocation::Path && p.name == name);
        if !declared {
            params.push(ToolParameter {
                name: name.to_string(),
                location: ParamLocation::Path,
                required: true,
                schema: json!({ "type": "string" }),
                query: None,
            });
        }
    }

    if let Some(body) = operation.get("requestBody") {
        let body = resolver.resolve(body)?;
        collect_body_parameters(resolver, body, &mut params);
    }

    Ok(params)
}

fn collect_body_parameters(
    resolver: &RefResolver<'_>,
    body: &Value,
    params: &mut Vec<ToolParameter>,
) {
    let body_required = body.get("required").and_then(Value::as_bool).unwrap_or(false);
    let schema = select_media_schema(body.get("content"))
        .map(|s| schema_to_json(resolver, s))
        .unwrap_or_else(|| json!({}));

    let Some((properties, required)) = object_properties(&schema) else {
        params.push(ToolParameter {
            name: BODY_ARGUMENT.to_string(),
            location: ParamLocation::Body,
            required: body_required,
            schema,
            query: None,
        });
        return;
    };

    for (name, prop_schema) in properties {
        if params.iter().any(|p| p.name == name) {
            tracing::warn!(
                property = %name,
                "request body property shadows a path/query parameter; not exposed"
            );
            continue;
        }
        params.push(ToolParameter {
            required: body_required && required.contains(&name),
            name,
            location: ParamLocation::BodyField,
            schema: prop_schema,
            query: None,
        });
    }
}

/// Schema of the JSON media type (or the first declared one).
fn select_media_schema(content: Option<&Value>) -> Option<&Value> {
    let content = content?.as_object()?;
    let media = content
        .iter()
        .find(|(mt, _)| mt.as_str() == "application/json")
        .or_else(|| content.iter().find(|(mt, _)| mt.contains("json")))
        .or_else(|| content.iter().next())?;
    media.1.get("schema")
}

/// Top-level properties and `required` names of an object schema (merging `allOf` members).
fn object_properties(schema: &Value) -> Option<(Map<String, Value>, HashSet<String>)> {
    let mut properties = Map::new();
    let mut required = HashSet::new();
    let mut is_object = false;

    let mut parts: Vec<&Value> = vec![schema];
    if let Some(all_of) = schema.get("allOf").and_then(Value::as_array) {
        parts.extend(all_of);
    }

    for part in parts {
        let declares_object = part.get("type").and_then(Value::as_str) == Some("object");
        if let Some(props) = part.get("properties").and_then(Value::as_object) {
            is_object = true;
            for (k, v) in props {
                properties.insert(k.clone(), v.clone());
            }
        } else if declares_object {
            is_object = true;
        }
        if let Some(req) = part.get("required").and_then(Value::as_array) {
            required.extend(req.iter().filter_map(Value::as_str).map(str::to_string));
        }
    }

    is_object.then_some((properties, required))
}

fn build_input_schema(params: &[ToolParameter]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for p in params {
        properties.insert(p.name.clone(), p.schema.clone());
        if p.required {
            required.push(Value::String(p.name.clone()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
