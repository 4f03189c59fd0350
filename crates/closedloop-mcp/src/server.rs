// crates/closedloop-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: MCP server implementations for stdio and HTTP transports.
// Purpose: Expose ClosedLoop insight tools via JSON-RPC 2.0.
// Dependencies: axum, serde, serde_json, tokio
// ============================================================================

//! ## Overview
//! The MCP server answers `initialize`, `ping`, `tools/list`, and
//! `tools/call`, and routes every tool call through
//! [`crate::tools::ToolRouter`]. Notifications get no reply.
//!
//! The stdio transport handles one message at a time and accepts both
//! newline-delimited JSON and `Content-Length` framed messages, replying in the
//! framing the request used. End of input ends the loop cleanly. The HTTP
//! transport serves `POST /rpc` and may handle requests concurrently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use closedloop_masking::MaskingEngine;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;

use crate::audit::LifecycleEvent;
use crate::audit::McpAuditSink;
use crate::audit::McpFileAuditSink;
use crate::audit::McpMethod;
use crate::audit::McpNoopAuditSink;
use crate::audit::McpRequestEvent;
use crate::audit::McpRequestEventParams;
use crate::audit::McpStderrAuditSink;
use crate::backend::HttpBackend;
use crate::config::AuditConfig;
use crate::config::ClosedLoopConfig;
use crate::config::ConfigError;
use crate::config::ServerTransport;
use crate::registry::ToolDefinition;
use crate::tools::ToolRouter;
use crate::tools::ToolRouterConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Server name reported by `initialize`.
pub const SERVER_NAME: &str = "closedloop-mcp-server";
/// Server version reported by `initialize`.
pub const SERVER_VERSION: &str = "1.0.0";
/// Server description reported by `initialize`.
pub const SERVER_DESCRIPTION: &str =
    "Provides access to ClosedLoop AI product feedback data and insights.";
/// Protocol version used when the client does not request one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// JSON-RPC parse error.
const PARSE_ERROR: i64 = -32700;
/// JSON-RPC invalid request.
const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC method not found.
const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC invalid params.
const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC internal error.
const INTERNAL_ERROR: i64 = -32603;
/// Request body exceeds the configured limit.
const PAYLOAD_TOO_LARGE: i64 = -32070;

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: ClosedLoopConfig,
    /// Shared request-handling state.
    state: Arc<ServerState>,
}

impl McpServer {
    /// Builds a new MCP server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when validation or initialization fails.
    pub fn from_config(config: ClosedLoopConfig) -> Result<Self, McpServerError> {
        config.validate()?;
        let base_url = config.backend.parsed_base_url()?;
        let api_key = config.api_key.clone().ok_or(ConfigError::MissingApiKey)?;
        let backend = HttpBackend::new(base_url, api_key, config.backend.max_response_bytes)
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let audit = build_audit_sink(&config.audit)?;
        let router = ToolRouter::new(ToolRouterConfig {
            backend: Arc::new(backend),
            search_transport: config.backend.search_transport,
            masking: config.privacy.enabled.then(MaskingEngine::default),
            audit: Arc::clone(&audit),
        });
        Ok(Self::new(config, router, audit))
    }

    /// Builds a server around an existing router and audit sink.
    #[must_use]
    pub fn new(
        config: ClosedLoopConfig,
        router: ToolRouter,
        audit: Arc<dyn McpAuditSink>,
    ) -> Self {
        let state = Arc::new(ServerState {
            router,
            audit,
            max_body_bytes: config.server.max_body_bytes,
        });
        Self {
            config,
            state,
        }
    }

    /// Serves requests using the configured transport.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the transport fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        let transport = self.config.server.transport;
        let backend_host = self
            .config
            .backend
            .parsed_base_url()
            .ok()
            .and_then(|url| url.host_str().map(str::to_string));
        self.state.audit.record_lifecycle(&LifecycleEvent::started(
            transport,
            self.state.router.privacy_mode(),
            self.config.backend.search_transport,
            backend_host,
        ));
        match transport {
            ServerTransport::Stdio => {
                let reader = BufReader::new(tokio::io::stdin());
                serve_stream(&self.state, reader, tokio::io::stdout()).await
            }
            ServerTransport::Http => {
                let addr = self.config.server.bind_addr()?;
                serve_http(self.state, addr).await
            }
        }
    }
}

/// Builds the audit sink selected by configuration.
fn build_audit_sink(config: &AuditConfig) -> Result<Arc<dyn McpAuditSink>, McpServerError> {
    if !config.enabled {
        return Ok(Arc::new(McpNoopAuditSink));
    }
    match &config.path {
        Some(path) => {
            let sink = McpFileAuditSink::new(path)
                .map_err(|err| McpServerError::Init(format!("audit log: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(McpStderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Stdio Transport
// ============================================================================

/// Message framing detected on the stdio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// One JSON document per line.
    Line,
    /// `Content-Length` header block followed by the body.
    ContentLength,
}

/// Serves JSON-RPC messages from `reader`, writing replies to `writer`.
async fn serve_stream<R, W>(
    state: &ServerState,
    mut reader: R,
    mut writer: W,
) -> Result<(), McpServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some((bytes, framing)) = read_message(&mut reader, state.max_body_bytes).await? {
        let Some(response) = state.handle_payload(ServerTransport::Stdio, &bytes).await else {
            continue;
        };
        let payload = serde_json::to_vec(&response)
            .map_err(|_| McpServerError::Transport("json-rpc serialization failed".to_string()))?;
        write_message(&mut writer, &payload, framing).await?;
    }
    Ok(())
}

/// Reads one message. Returns `None` at end of input.
async fn read_message<R>(
    reader: &mut R,
    max_body_bytes: usize,
) -> Result<Option<(Vec<u8>, Framing)>, McpServerError>
where
    R: AsyncBufRead + Unpin,
{
    let line_limit = u64::try_from(max_body_bytes).unwrap_or(u64::MAX).saturating_add(1);
    loop {
        let mut line = String::new();
        let read = (&mut *reader)
            .take(line_limit)
            .read_line(&mut line)
            .await
            .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
        if read == 0 {
            return Ok(None);
        }
        if read > max_body_bytes && !line.ends_with('\n') {
            return Err(McpServerError::Transport("payload too large".to_string()));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(length) = content_length(trimmed) {
            let length = length?;
            return read_framed_body(reader, length, max_body_bytes).await.map(Some);
        }
        return Ok(Some((trimmed.as_bytes().to_vec(), Framing::Line)));
    }
}

/// Parses a `Content-Length` header line, if `line` is one.
fn content_length(line: &str) -> Option<Result<usize, McpServerError>> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    Some(
        value
            .trim()
            .parse::<usize>()
            .map_err(|_| McpServerError::Transport("invalid content length".to_string())),
    )
}

/// Skips the remaining header lines and reads a framed body.
async fn read_framed_body<R>(
    reader: &mut R,
    length: usize,
    max_body_bytes: usize,
) -> Result<(Vec<u8>, Framing), McpServerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
        if read == 0 {
            return Err(McpServerError::Transport("stdio closed".to_string()));
        }
        if line.trim().is_empty() {
            break;
        }
    }
    if length > max_body_bytes {
        return Err(McpServerError::Transport("payload too large".to_string()));
    }
    let mut buf = vec![0u8; length];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
    Ok((buf, Framing::ContentLength))
}

/// Writes one reply in the given framing.
async fn write_message<W>(
    writer: &mut W,
    payload: &[u8],
    framing: Framing,
) -> Result<(), McpServerError>
where
    W: AsyncWrite + Unpin,
{
    let write_failed = |_| McpServerError::Transport("stdio write failed".to_string());
    match framing {
        Framing::Line => {
            writer.write_all(payload).await.map_err(write_failed)?;
            writer.write_all(b"\n").await.map_err(write_failed)?;
        }
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", payload.len());
            writer.write_all(header.as_bytes()).await.map_err(write_failed)?;
            writer.write_all(payload).await.map_err(write_failed)?;
        }
    }
    writer.flush().await.map_err(write_failed)
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Serves JSON-RPC requests over HTTP.
async fn serve_http(state: Arc<ServerState>, addr: SocketAddr) -> Result<(), McpServerError> {
    let app = http_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|_| McpServerError::Transport("http bind failed".to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|_| McpServerError::Transport("http server failed".to_string()))
}

/// Builds the axum router for the HTTP transport.
fn http_router(state: Arc<ServerState>) -> Router {
    let limit = state.max_body_bytes.saturating_add(1);
    Router::new()
        .route("/rpc", post(handle_http))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

/// Handles HTTP JSON-RPC requests.
async fn handle_http(State(state): State<Arc<ServerState>>, bytes: Bytes) -> Response {
    match state.handle_payload(ServerTransport::Http, &bytes).await {
        Some(response) => (http_status(&response), axum::Json(response)).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Maps a JSON-RPC reply to an HTTP status.
fn http_status(response: &JsonRpcResponse) -> StatusCode {
    match response.error.as_ref().map(|error| error.code) {
        None => StatusCode::OK,
        Some(PAYLOAD_TOO_LARGE) => StatusCode::PAYLOAD_TOO_LARGE,
        Some(PARSE_ERROR | INVALID_REQUEST | METHOD_NOT_FOUND | INVALID_PARAMS) => {
            StatusCode::BAD_REQUEST
        }
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Shared state for all transports.
struct ServerState {
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Audit sink for request events.
    audit: Arc<dyn McpAuditSink>,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

impl ServerState {
    /// Handles one raw JSON-RPC message and records an audit event.
    ///
    /// Returns `None` for notifications.
    async fn handle_payload(
        &self,
        transport: ServerTransport,
        bytes: &[u8],
    ) -> Option<JsonRpcResponse> {
        let started = Instant::now();
        let (method, response) = self.dispatch(bytes).await;
        let response_bytes = response
            .as_ref()
            .and_then(|response| serde_json::to_vec(response).ok())
            .map_or(0, |payload| payload.len());
        let error_code = response
            .as_ref()
            .and_then(|response| response.error.as_ref())
            .map(|error| error.code);
        self.audit.record(&McpRequestEvent::new(McpRequestEventParams {
            transport,
            method,
            error_code,
            request_bytes: bytes.len(),
            response_bytes,
            latency_ms: started.elapsed().as_millis(),
        }));
        response
    }

    /// Parses and dispatches one message.
    async fn dispatch(&self, bytes: &[u8]) -> (McpMethod, Option<JsonRpcResponse>) {
        if bytes.len() > self.max_body_bytes {
            let response =
                JsonRpcResponse::failure(Value::Null, PAYLOAD_TOO_LARGE, "request body too large");
            return (McpMethod::Invalid, Some(response));
        }
        let Ok(value) = serde_json::from_slice::<Value>(bytes) else {
            let response = JsonRpcResponse::failure(Value::Null, PARSE_ERROR, "parse error");
            return (McpMethod::Invalid, Some(response));
        };
        if value.is_array() {
            let response = JsonRpcResponse::failure(
                Value::Null,
                INVALID_REQUEST,
                "batch requests are not supported",
            );
            return (McpMethod::Invalid, Some(response));
        }
        let Ok(request) = serde_json::from_value::<JsonRpcRequest>(value) else {
            let response =
                JsonRpcResponse::failure(Value::Null, INVALID_REQUEST, "invalid json-rpc request");
            return (McpMethod::Invalid, Some(response));
        };
        let method = McpMethod::classify(&request.method);
        let Some(id) = request.id else {
            return (method, None);
        };
        if request.jsonrpc != "2.0" {
            let response =
                JsonRpcResponse::failure(id, INVALID_REQUEST, "invalid json-rpc version");
            return (method, Some(response));
        }
        if method == McpMethod::Notification {
            return (method, None);
        }
        let params = request.params.unwrap_or(Value::Null);
        let response = match method {
            McpMethod::Initialize => JsonRpcResponse::success(id, initialize_result(&params)),
            McpMethod::Ping => JsonRpcResponse::success(id, json!({})),
            McpMethod::ToolsList => {
                let tools = ToolListResult {
                    tools: self.router.list_tools(),
                };
                match serde_json::to_value(tools) {
                    Ok(value) => JsonRpcResponse::success(id, value),
                    Err(_) => JsonRpcResponse::failure(id, INTERNAL_ERROR, "serialization failed"),
                }
            }
            McpMethod::ToolsCall => match serde_json::from_value::<ToolCallParams>(params) {
                Ok(call) => {
                    let result = self.router.handle(&call.name, call.arguments).await;
                    match serde_json::to_value(result) {
                        Ok(value) => JsonRpcResponse::success(id, value),
                        Err(_) => {
                            JsonRpcResponse::failure(id, INTERNAL_ERROR, "serialization failed")
                        }
                    }
                }
                Err(_) => JsonRpcResponse::failure(id, INVALID_PARAMS, "invalid tool params"),
            },
            McpMethod::Notification | McpMethod::Invalid | McpMethod::Other => {
                JsonRpcResponse::failure(id, METHOD_NOT_FOUND, "method not found")
            }
        };
        (method, Some(response))
    }
}

/// Builds the `initialize` result, echoing the client's protocol version.
fn initialize_result(params: &Value) -> Value {
    let protocol_version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .filter(|version| !version.is_empty())
        .unwrap_or(DEFAULT_PROTOCOL_VERSION);
    json!({
        "protocolVersion": protocol_version,
        "capabilities": {"tools": {}},
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION,
            "description": SERVER_DESCRIPTION,
        },
    })
}

/// Incoming JSON-RPC request payload.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier; absent for notifications.
    #[serde(default)]
    id: Option<Value>,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success reply.
    const fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error reply.
    fn failure(id: Value, code: i64, message: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
            }),
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// Tool call parameters for JSON-RPC requests.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
