//! Stdio MCP server exposing an `OpenAPI`-described API as tools.

pub mod cli;
pub mod error;
pub mod logging;
pub mod server;

use crate::error::{ProxyError, Result};
use crate::server::ProxyServer;
use openapi_mcp_tools::headers::get_additional_headers;
use openapi_mcp_tools::loader::{load_spec, resolve_base_url};
use openapi_mcp_tools::naming::NamingPolicy;
use openapi_mcp_tools::whitelist::ToolWhitelist;
use openapi_mcp_tools::{
    DispatchSettings, Dispatcher, HttpTransport, ProxyConfig, RegistrationOptions,
    ReqwestTransport, ToolRegistry, register_functions,
};
use parking_lot::RwLock;
use rmcp::ServiceExt as _;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Register the document's tools and wire them to `transport`.
#[must_use]
pub fn assemble(spec: Value, config: &ProxyConfig, transport: Arc<dyn HttpTransport>) -> ProxyServer {
    let options = RegistrationOptions {
        whitelist: ToolWhitelist::new(config.tool_whitelist.iter().cloned()),
        naming: NamingPolicy {
            prefix: config.tool_name_prefix.clone(),
            max_length: config.tool_name_max_length,
        },
        spec_location: Some(config.spec.clone()),
    };

    let mut registry = ToolRegistry::new();
    let tools = register_functions(&mut registry, &spec, &options);
    if tools.is_empty() {
        tracing::warn!(spec = %config.spec, "no tools registered");
    }

    let default_base_url = resolve_base_url(None, &spec, Some(&config.spec));
    if config.base_url.is_none()
        && default_base_url.is_none()
        && tools.iter().any(|t| t.base_url.is_none())
    {
        tracing::warn!("no base URL configured and none found in 'servers'; calls will fail");
    }

    let settings = DispatchSettings {
        base_url_override: config.base_url.clone(),
        default_base_url,
        extra_headers: get_additional_headers(config.extra_headers.as_deref()),
        auth: config.auth.clone(),
    };
    let dispatcher = Dispatcher::new(Arc::new(RwLock::new(registry)), transport, settings);
    ProxyServer::new(dispatcher, Arc::new(spec))
}

/// Load the document and build the server.
///
/// A document that cannot be loaded is logged and replaced by an empty one, so the server still
/// starts (with no tools).
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub async fn build_server(config: &ProxyConfig) -> Result<ProxyServer> {
    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProxyError::Http(e.to_string()))?;

    let spec = match load_spec(&config.spec, &client, config.max_response_bytes).await {
        Ok(spec) => spec,
        Err(e) => {
            tracing::error!(error = %e, "failed to load OpenAPI spec; serving no tools");
            Value::Object(Map::new())
        }
    };

    let transport = ReqwestTransport::new(client, config.timeout_secs, config.max_response_bytes);
    Ok(assemble(spec, config, Arc::new(transport)))
}

/// Serve MCP over stdin/stdout until the client disconnects.
///
/// # Errors
///
/// Returns an error if the MCP handshake or the session fails.
pub async fn serve_stdio(server: ProxyServer) -> Result<()> {
    let running = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| ProxyError::Mcp(e.to_string()))?;
    let reason = running
        .waiting()
        .await
        .map_err(|e| ProxyError::Mcp(e.to_string()))?;
    tracing::info!(?reason, "MCP session ended");
    Ok(())
}
