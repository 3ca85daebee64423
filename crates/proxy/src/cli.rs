//! Command line / environment configuration.

use crate::error::{ProxyError, Result};
use clap::{Parser, ValueEnum};
use openapi_mcp_tools::config::{DEFAULT_TIMEOUT_SECS, DEFAULT_TOOL_NAME_MAX_LENGTH};
use openapi_mcp_tools::whitelist::ToolWhitelist;
use openapi_mcp_tools::{AuthConfig, ProxyConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ApiAuthType {
    /// `Authorization: Bearer <API_KEY>`
    Bearer,
    /// `<API_AUTH_HEADER>: <API_KEY>`
    ApiKey,
    /// `API_KEY` is `username:password`
    Basic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "openapi-mcp-proxy",
    version,
    about = "Expose an OpenAPI-described HTTP API as MCP tools over stdio"
)]
pub struct Args {
    /// `OpenAPI` document location (http(s) URL, file:// URL or path; JSON or YAML).
    #[arg(long, env = "OPENAPI_SPEC_URL")]
    pub spec: String,

    /// Base URL for API calls; overrides the document's `servers`.
    #[arg(long, env = "SERVER_URL_OVERRIDE")]
    pub base_url: Option<String>,

    /// Comma-separated allow-list of path prefixes (`/users,/projects/{id}`) or tool name globs.
    #[arg(long, env = "TOOL_WHITELIST")]
    pub tool_whitelist: Option<String>,

    /// Newline-separated `Name: Value` headers added to every request.
    #[arg(long, env = "EXTRA_HEADERS")]
    pub extra_headers: Option<String>,

    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "API_AUTH_TYPE", value_enum, default_value_t = ApiAuthType::Bearer)]
    pub api_auth_type: ApiAuthType,

    /// Header name used with `--api-auth-type api-key`.
    #[arg(long, env = "API_AUTH_HEADER", default_value = "X-API-Key")]
    pub api_auth_header: String,

    #[arg(long, env = "TOOL_NAME_PREFIX")]
    pub tool_name_prefix: Option<String>,

    #[arg(long, env = "TOOL_NAME_MAX_LENGTH", default_value_t = DEFAULT_TOOL_NAME_MAX_LENGTH)]
    pub tool_name_max_length: usize,

    /// Per-call timeout for API requests (0 disables).
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Reject API responses larger than this many bytes.
    #[arg(long)]
    pub max_response_bytes: Option<usize>,

    /// Default log filter when `RUST_LOG` is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Print the tool listing as JSON and exit.
    #[arg(long)]
    pub print_tools: bool,
}

impl Args {
    /// Build and validate the proxy configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for a basic-auth key without `username:password` or an invalid config.
    pub fn to_config(&self) -> Result<ProxyConfig> {
        let mut config = ProxyConfig::new(self.spec.trim());
        config.base_url = non_empty(self.base_url.as_deref());
        config.tool_whitelist = ToolWhitelist::parse(self.tool_whitelist.as_deref())
            .entries()
            .to_vec();
        config.extra_headers = non_empty(self.extra_headers.as_deref());
        config.auth = self.auth()?;
        config.tool_name_prefix = non_empty(self.tool_name_prefix.as_deref());
        config.tool_name_max_length = self.tool_name_max_length;
        config.timeout_secs = self.timeout_secs;
        config.max_response_bytes = self.max_response_bytes;
        config.validate()?;
        Ok(config)
    }

    fn auth(&self) -> Result<Option<AuthConfig>> {
        let Some(key) = non_empty(self.api_key.as_deref()) else {
            return Ok(None);
        };
        let auth = match self.api_auth_type {
            ApiAuthType::Bearer => AuthConfig::Bearer { token: key },
            ApiAuthType::ApiKey => AuthConfig::Header {
                name: self.api_auth_header.trim().to_string(),
                value: key,
            },
            ApiAuthType::Basic => {
                let (username, password) = key.split_once(':').ok_or_else(|| {
                    ProxyError::Config(
                        "API_KEY must be 'username:password' for basic auth".to_string(),
                    )
                })?;
                AuthConfig::Basic {
                    username: username.to_string(),
                    password: password.to_string(),
                }
            }
        };
        Ok(Some(auth))
    }
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["openapi-mcp-proxy"];
        argv.extend_from_slice(args);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&["--spec", "./openapi.yaml"]).to_config().unwrap();
        assert_eq!(config.spec, "./openapi.yaml");
        assert_eq!(config.tool_name_max_length, DEFAULT_TOOL_NAME_MAX_LENGTH);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.auth.is_none());
        assert!(config.tool_whitelist.is_empty());
    }

    #[test]
    fn whitelist_and_prefix() {
        let config = parse(&[
            "--spec",
            "s.json",
            "--tool-whitelist",
            "/users, /projects/{id} ,",
            "--tool-name-prefix",
            "asana_",
        ])
        .to_config()
        .unwrap();
        assert_eq!(config.tool_whitelist, vec!["/users", "/projects/{id}"]);
        assert_eq!(config.tool_name_prefix.as_deref(), Some("asana_"));
    }

    #[test]
    fn auth_types() {
        let bearer = parse(&["--spec", "s", "--api-key", "k"]).to_config().unwrap();
        assert_eq!(
            bearer.auth,
            Some(AuthConfig::Bearer {
                token: "k".to_string()
            })
        );

        let header = parse(&[
            "--spec",
            "s",
            "--api-key",
            "k",
            "--api-auth-type",
            "api-key",
            "--api-auth-header",
            "X-Asana-Key",
        ])
        .to_config()
        .unwrap();
        assert_eq!(
            header.auth,
            Some(AuthConfig::Header {
                name: "X-Asana-Key".to_string(),
                value: "k".to_string()
            })
        );

        let basic = parse(&["--spec", "s", "--api-key", "me:pw", "--api-auth-type", "basic"])
            .to_config()
            .unwrap();
        assert_eq!(
            basic.auth,
            Some(AuthConfig::Basic {
                username: "me".to_string(),
                password: "pw".to_string()
            })
        );

        assert!(
            parse(&["--spec", "s", "--api-key", "nocolon", "--api-auth-type", "basic"])
                .to_config()
                .is_err()
        );
    }

    #[test]
    fn empty_spec_is_rejected() {
        assert!(parse(&["--spec", "  "]).to_config().is_err());
    }
}
