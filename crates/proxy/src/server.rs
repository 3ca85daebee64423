//! MCP surface: `tools/list`, `tools/call` and the spec resource.

use openapi_mcp_tools::Dispatcher;
use rmcp::model::{
    Annotated, CallToolRequestParams, CallToolResult, ErrorData, Implementation, JsonObject,
    ListResourcesResult, ListToolsResult, PaginatedRequestParams, RawResource,
    ReadResourceRequestParams, ReadResourceResult, Resource, ResourceContents,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// URI under which the loaded `OpenAPI` document is exposed.
pub const SPEC_RESOURCE_URI: &str = "file:///openapi_spec.json";

#[derive(Clone)]
pub struct ProxyServer {
    dispatcher: Dispatcher,
    spec: Arc<Value>,
}

impl ProxyServer {
    #[must_use]
    pub fn new(dispatcher: Dispatcher, spec: Arc<Value>) -> Self {
        Self { dispatcher, spec }
    }

    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.dispatcher.registry().read().list_tools()
    }

    /// Run one tool call. Failures are reported as `isError` results, never as protocol errors.
    pub async fn handle_call(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        let arguments = arguments.map_or(Value::Null, Value::Object);
        self.dispatcher.call_tool(name, arguments).await
    }

    fn spec_resource() -> Resource {
        let mut raw = RawResource::new(SPEC_RESOURCE_URI, "openapi_spec.json");
        raw.description = Some("OpenAPI document the tools were generated from".to_string());
        raw.mime_type = Some("application/json".to_string());
        Annotated::new(raw, None)
    }

    fn read_spec(&self, uri: &str) -> Result<ReadResourceResult, ErrorData> {
        if uri != SPEC_RESOURCE_URI {
            return Err(ErrorData::resource_not_found(
                format!("unknown resource: {uri}"),
                None,
            ));
        }
        let text = serde_json::to_string_pretty(&*self.spec)
            .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, SPEC_RESOURCE_URI)],
        })
    }
}

impl ServerHandler for ProxyServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            instructions: Some(
                "Each tool calls one operation of the proxied HTTP API. The source OpenAPI \
                 document is available as a resource."
                    .to_string(),
            ),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            tools: self.tools(),
            ..Default::default()
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move { Ok(self.handle_call(&request.name, request.arguments).await) }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListResourcesResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListResourcesResult {
            resources: vec![Self::spec_resource()],
            ..Default::default()
        }))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ReadResourceResult, ErrorData>> + Send + '_ {
        std::future::ready(self.read_spec(&request.uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble;
    use openapi_mcp_test_support::asana_spec;
    use openapi_mcp_tools::ProxyConfig;
    use openapi_mcp_tools::transport::{HttpResponse, RecordingTransport};
    use serde_json::json;

    fn server(transport: Arc<RecordingTransport>) -> ProxyServer {
        assemble(asana_spec(None), &ProxyConfig::new("asana.json"), transport)
    }

    #[test]
    fn lists_registered_tools() {
        let transport = Arc::new(RecordingTransport::new(HttpResponse::json(200, &json!({}))));
        let names: Vec<String> = server(transport)
            .tools()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "get_workspaces_custom_fields",
                "getProject",
                "updateProject",
                "deleteProject",
                "createProject",
                "get_users_me",
            ]
        );
    }

    #[tokio::test]
    async fn call_errors_are_is_error_results() {
        let transport = Arc::new(RecordingTransport::new(HttpResponse::json(200, &json!({}))));
        let server = server(transport.clone());

        let result = server.handle_call("getProject", None).await;
        assert_eq!(result.is_error, Some(true));
        let error = &result.structured_content.unwrap()["error"];
        assert_eq!(error["kind"], "missing_path_parameter");
        assert!(!transport.was_called());

        let result = server.handle_call("nope", Some(JsonObject::new())).await;
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn successful_calls_return_the_body_as_text() {
        let transport = Arc::new(RecordingTransport::new(HttpResponse::json(
            200,
            &json!({"data": {"gid": "1"}}),
        )));
        let server = server(transport.clone());
        let mut args = JsonObject::new();
        args.insert("project_gid".to_string(), json!("1"));

        let result = server.handle_call("getProject", Some(args)).await;
        assert_ne!(result.is_error, Some(true));
        let text = result.content[0].as_text().unwrap().text.clone();
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!({"data": {"gid": "1"}}));
        assert_eq!(
            transport.requests()[0].url.as_str(),
            "https://app.asana.com/api/1.0/projects/1"
        );
    }

    #[test]
    fn spec_resource_round_trips_the_document() {
        let transport = Arc::new(RecordingTransport::new(HttpResponse::json(200, &json!({}))));
        let server = server(transport);
        let result = server.read_spec(SPEC_RESOURCE_URI).unwrap();
        let ResourceContents::TextResourceContents { text, .. } = &result.contents[0] else {
            panic!("expected text contents");
        };
        let doc: Value = serde_json::from_str(text).unwrap();
        assert_eq!(doc["info"]["title"], "Asana");

        assert!(server.read_spec("file:///other.json").is_err());
    }
}
