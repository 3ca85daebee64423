//! Error types for the proxy binary.

use openapi_mcp_tools::OpenApiToolsError;
use thiserror::Error;

/// Bootstrap failures. Tool call failures never surface here; they become MCP error results.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Invalid CLI/environment configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client construction errors.
    #[error("HTTP error: {0}")]
    Http(String),

    /// MCP transport errors (stdio handshake, serving).
    #[error("MCP error: {0}")]
    Mcp(String),

    #[error(transparent)]
    Tools(#[from] OpenApiToolsError),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
