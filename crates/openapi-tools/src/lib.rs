//! `OpenAPI` → MCP tooling.
//!
//! - [`registry::register_functions`] walks a document and derives one tool per operation
//! - [`dispatcher::Dispatcher`] turns a tool call into an HTTP request through an injected
//!   [`transport::HttpTransport`]
//!
//! The crate has no stdio/JSON-RPC concerns; `openapi-mcp-proxy` wires it to an MCP server.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod headers;
pub mod loader;
pub mod naming;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod semantics;
pub mod transport;
pub mod whitelist;

pub use config::{AuthConfig, ProxyConfig};
pub use dispatcher::{DispatchSettings, Dispatcher, ToolOutput};
pub use error::{DispatchError, OpenApiToolsError};
pub use registry::{RegistrationOptions, ToolDefinition, ToolRegistry, register_functions};
pub use transport::{HttpTransport, RecordingTransport, ReqwestTransport};
