//! Error types for `openapi-mcp-tools`.

use serde_json::{Value, json};
use thiserror::Error;

/// Error type for spec loading and configuration.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (invalid config, missing fields, conflicts).
    #[error("Configuration error: {0}")]
    Config(String),

    /// `OpenAPI` errors (spec shape, unresolved references).
    #[error("OpenAPI error: {0}")]
    OpenApi(String),

    #[error("OpenAPI error: failed to fetch spec from '{url}': {message}")]
    SpecFetch { url: String, message: String },

    #[error("OpenAPI error: failed to read spec file '{path}': {source}")]
    SpecReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OpenAPI error: failed to parse OpenAPI spec from '{location}': {message}")]
    SpecParse { location: String, message: String },
}

/// Result type alias for loading/configuration operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;

/// Failure of a single tool invocation.
///
/// Every variant is returned to the MCP client as a structured error result; none of them
/// terminate the serving process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Missing required path parameters for '{tool}': {}", .names.join(", "))]
    MissingPathParameter { tool: String, names: Vec<String> },

    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument { name: String, message: String },

    /// Transport failure (`status == None`) or a non-2xx response from the target API.
    #[error("{message}")]
    DownstreamError {
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DispatchError {
    /// Stable discriminant exposed to clients.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolNotFound { .. } => "tool_not_found",
            Self::MissingPathParameter { .. } => "missing_path_parameter",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::DownstreamError { .. } => "downstream_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// `true` when the target API (or the network) rejected the request, as opposed to tool misuse.
    #[must_use]
    pub fn is_downstream(&self) -> bool {
        matches!(self, Self::DownstreamError { .. })
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut out = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Self::DownstreamError { status, body, .. } = self {
            if let Some(status) = status {
                out["status"] = json!(status);
            }
            if let Some(body) = body {
                out["body"] = json!(body);
            }
        }
        out
    }

    pub(crate) fn invalid(name: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.to_string(),
            message: message.into(),
        }
    }
}
