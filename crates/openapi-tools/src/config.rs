use crate::error::{OpenApiToolsError, Result};
use serde::{Deserialize, Serialize};

/// Maximum tool name length accepted by most MCP clients.
pub const DEFAULT_TOOL_NAME_MAX_LENGTH: usize = 64;

/// Default per-call timeout for outbound API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Resolved proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// `OpenAPI` spec location (URL, `file://` URL or file path).
    pub spec: String,

    /// Override base URL from spec.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Allow-list of path prefixes / patterns or tool names. Empty = everything allowed.
    #[serde(default)]
    pub tool_whitelist: Vec<String>,

    /// Raw multi-line `Name: Value` header block injected into every request.
    #[serde(default)]
    pub extra_headers: Option<String>,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Prefix prepended to every derived tool name.
    #[serde(default)]
    pub tool_name_prefix: Option<String>,

    #[serde(default = "default_tool_name_max_length")]
    pub tool_name_max_length: usize,

    /// Per-call timeout in seconds (`0` disables the timeout).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum downstream response size (bytes). `None` = unlimited.
    #[serde(default)]
    pub max_response_bytes: Option<usize>,
}

fn default_tool_name_max_length() -> usize {
    DEFAULT_TOOL_NAME_MAX_LENGTH
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ProxyConfig {
    #[must_use]
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            base_url: None,
            tool_whitelist: Vec::new(),
            extra_headers: None,
            auth: None,
            tool_name_prefix: None,
            tool_name_max_length: DEFAULT_TOOL_NAME_MAX_LENGTH,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_response_bytes: None,
        }
    }

    /// Check the configuration for values that would make every call fail.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::Config`] for an empty spec location, a zero tool name length,
    /// or an auth header/query parameter with an empty name.
    pub fn validate(&self) -> Result<()> {
        if self.spec.trim().is_empty() {
            return Err(OpenApiToolsError::Config(
                "spec location must not be empty".to_string(),
            ));
        }
        if self.tool_name_max_length == 0 {
            return Err(OpenApiToolsError::Config(
                "toolNameMaxLength must be greater than zero".to_string(),
            ));
        }
        match &self.auth {
            Some(AuthConfig::Header { name, .. } | AuthConfig::Query { name, .. })
                if name.trim().is_empty() =>
            {
                Err(OpenApiToolsError::Config(
                    "auth parameter name must not be empty".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Authentication applied to every outbound request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    None,
    Bearer { token: String },
    Header { name: String, value: String },
    Basic { username: String, password: String },
    Query { name: String, value: String },
}
