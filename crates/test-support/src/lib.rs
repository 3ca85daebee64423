use anyhow::Context as _;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use serde_json::{Map, Value, json};
use std::io::Write as _;
use std::net::TcpListener;
use std::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
    }
}

/// Pick an unused TCP port on localhost.
///
/// Note: this does not reserve the port; it's still possible for another process to bind it
/// before you do.
///
/// # Errors
///
/// Returns an error if binding an ephemeral localhost port fails.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// 1x1 transparent PNG.
pub const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Local HTTP API used as the downstream target in integration tests.
///
/// - `GET /status/{code}` answers with that status and a JSON error body
/// - `GET /pixel.png` answers with [`PIXEL_PNG`]
/// - every other route echoes the request back as JSON:
///   `{"method", "path", "query", "headers": {lower-case name: value}, "body"}`
pub struct EchoServer {
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl EchoServer {
    /// Bind an ephemeral port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn spawn() -> anyhow::Result<Self> {
        let app = Router::new()
            .route("/status/{code}", get(status_handler))
            .route("/pixel.png", get(pixel_handler))
            .route("/{*path}", any(echo_handler));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind echo server")?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        let handle = tokio::spawn(async move {
            let _ = server.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stop the server and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn echo_handler(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> axum::Json<Value> {
    let headers: Map<String, Value> = headers
        .iter()
        .filter_map(|(k, v)| {
            let v = v.to_str().ok()?;
            Some((k.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| json!(String::from_utf8_lossy(&body)))
    };

    axum::Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query().unwrap_or(""),
        "headers": headers,
        "body": body,
    }))
}

async fn status_handler(Path(code): Path<u16>) -> impl IntoResponse {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (
        status,
        axum::Json(json!({ "errors": [{ "message": format!("status {code}") }] })),
    )
}

async fn pixel_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], PIXEL_PNG)
}

/// Asana-shaped `OpenAPI` document.
///
/// `server_url` replaces the public `servers[0].url` so the spec can point at an [`EchoServer`].
#[must_use]
pub fn asana_spec(server_url: Option<&str>) -> Value {
    json!({
        "openapi": "3.0.0",
        "info": { "title": "Asana", "version": "1.0" },
        "servers": [{ "url": server_url.unwrap_or("https://app.asana.com/api/1.0") }],
        "paths": {
            "/workspaces/{workspace_gid}/custom_fields": {
                "get": {
                    "operationId": "get_workspaces_custom_fields",
                    "summary": "Get a workspace's custom fields",
                    "parameters": [
                        { "$ref": "#/components/parameters/workspace_path_gid" },
                        { "$ref": "#/components/parameters/opt_fields" },
                        { "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": 100 } }
                    ]
                }
            },
            "/projects/{project_gid}": {
                "parameters": [{ "name": "project_gid", "in": "path", "required": true, "schema": { "type": "string" } }],
                "get": { "operationId": "getProject", "parameters": [{ "$ref": "#/components/parameters/opt_fields" }] },
                "put": {
                    "operationId": "updateProject",
                    "requestBody": { "$ref": "#/components/requestBodies/ProjectBody" }
                },
                "delete": { "operationId": "deleteProject" }
            },
            "/projects": {
                "post": {
                    "operationId": "createProject",
                    "summary": "Create a project",
                    "requestBody": { "$ref": "#/components/requestBodies/ProjectBody" }
                }
            },
            "/users/me": {
                "get": {
                    "summary": "Get the current user",
                    "parameters": [{ "name": "Asana-Enable", "in": "header", "schema": { "type": "string" } }]
                }
            }
        },
        "components": {
            "parameters": {
                "workspace_path_gid": {
                    "name": "workspace_gid", "in": "path", "required": true,
                    "description": "Globally unique identifier for the workspace or organization.",
                    "schema": { "type": "string" }
                },
                "opt_fields": {
                    "name": "opt_fields", "in": "query",
                    "description": "Comma-separated list of optional properties to include.",
                    "schema": { "type": "string" }
                }
            },
            "requestBodies": {
                "ProjectBody": {
                    "required": true,
                    "content": { "application/json": { "schema": { "$ref": "#/components/schemas/ProjectRequest" } } }
                }
            },
            "schemas": {
                "ProjectRequest": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": { "type": "string", "description": "Name of the project." },
                        "notes": { "type": "string" },
                        "archived": { "type": "boolean" }
                    }
                }
            }
        }
    })
}

/// Write a document to a temporary `.json` file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_spec_file(spec: &Value) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("openapi-")
        .suffix(".json")
        .tempfile()
        .context("create spec file")?;
    file.write_all(serde_json::to_string_pretty(spec)?.as_bytes())?;
    file.flush()?;
    Ok(file)
}
