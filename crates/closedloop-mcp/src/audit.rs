// crates/closedloop-mcp/src/audit.rs
// ============================================================================
// Module: MCP Audit Logging
// Description: Structured audit events for server lifecycle, requests, and tool calls.
// Purpose: Emit payload-free JSON-line audit records without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events are plain `serde` structs written as one JSON object per line
//! through an [`McpAuditSink`]. Events carry labels, sizes, and timings only;
//! tool arguments, backend payloads, and the API key are never recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::config::SearchTransport;
use crate::config::ServerTransport;

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Maximum tool-name length recorded for unknown tools.
const MAX_TOOL_LABEL_CHARS: usize = 64;

/// JSON-RPC method classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum McpMethod {
    /// `initialize` handshake.
    #[serde(rename = "initialize")]
    Initialize,
    /// `ping` liveness probe.
    #[serde(rename = "ping")]
    Ping,
    /// `tools/list`.
    #[serde(rename = "tools/list")]
    ToolsList,
    /// `tools/call`.
    #[serde(rename = "tools/call")]
    ToolsCall,
    /// Any `notifications/*` message.
    #[serde(rename = "notification")]
    Notification,
    /// Invalid or malformed JSON-RPC request.
    #[serde(rename = "invalid")]
    Invalid,
    /// Unsupported JSON-RPC method.
    #[serde(rename = "other")]
    Other,
}

impl McpMethod {
    /// Classifies a raw JSON-RPC method name.
    #[must_use]
    pub fn classify(method: &str) -> Self {
        match method {
            "initialize" => Self::Initialize,
            "ping" => Self::Ping,
            "tools/list" => Self::ToolsList,
            "tools/call" => Self::ToolsCall,
            other if other.starts_with("notifications/") => Self::Notification,
            _ => Self::Other,
        }
    }
}

/// Request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum McpOutcome {
    /// Successful request.
    Ok,
    /// Failed request.
    Error,
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Emitted once when the server starts serving.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Transport being served.
    pub transport: ServerTransport,
    /// Whether responses are masked.
    pub privacy_mode: bool,
    /// Search backend convention.
    pub search_transport: SearchTransport,
    /// Backend host (no path, query, or credentials).
    pub backend_host: Option<String>,
}

impl LifecycleEvent {
    /// Builds a `server_started` event.
    #[must_use]
    pub fn started(
        transport: ServerTransport,
        privacy_mode: bool,
        search_transport: SearchTransport,
        backend_host: Option<String>,
    ) -> Self {
        Self {
            event: "server_started",
            timestamp_ms: now_ms(),
            transport,
            privacy_mode,
            search_transport,
            backend_host,
        }
    }
}

/// One JSON-RPC request as seen by a transport.
#[derive(Debug, Clone, Serialize)]
pub struct McpRequestEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Transport that carried the request.
    pub transport: ServerTransport,
    /// Method classification.
    pub method: McpMethod,
    /// Request outcome.
    pub outcome: McpOutcome,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Handling time in milliseconds.
    pub latency_ms: u128,
}

/// Inputs for [`McpRequestEvent::new`].
#[derive(Debug, Clone, Copy)]
pub struct McpRequestEventParams {
    /// Transport that carried the request.
    pub transport: ServerTransport,
    /// Method classification.
    pub method: McpMethod,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
    /// Handling time in milliseconds.
    pub latency_ms: u128,
}

impl McpRequestEvent {
    /// Builds an `mcp_request` event; the outcome follows the error code.
    #[must_use]
    pub fn new(params: McpRequestEventParams) -> Self {
        Self {
            event: "mcp_request",
            timestamp_ms: now_ms(),
            transport: params.transport,
            method: params.method,
            outcome: if params.error_code.is_some() { McpOutcome::Error } else { McpOutcome::Ok },
            error_code: params.error_code,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
            latency_ms: params.latency_ms,
        }
    }
}

/// One tool invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Requested tool name (truncated).
    pub tool: String,
    /// Whether the name matched a registered tool.
    pub known: bool,
    /// Call outcome.
    pub outcome: McpOutcome,
    /// Stable error label when the call failed.
    pub error_kind: Option<&'static str>,
    /// Handling time in milliseconds.
    pub latency_ms: u128,
    /// Whether the response was masked.
    pub masked: bool,
}

impl ToolCallEvent {
    /// Builds a `tool_call` event.
    #[must_use]
    pub fn new(
        tool: &str,
        known: bool,
        error_kind: Option<&'static str>,
        latency_ms: u128,
        masked: bool,
    ) -> Self {
        Self {
            event: "tool_call",
            timestamp_ms: now_ms(),
            tool: tool.chars().take(MAX_TOOL_LABEL_CHARS).collect(),
            known,
            outcome: if error_kind.is_some() { McpOutcome::Error } else { McpOutcome::Ok },
            error_kind,
            latency_ms,
            masked,
        }
    }
}

/// Milliseconds since the Unix epoch (zero if the clock is before it).
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|duration| duration.as_millis()).unwrap_or(0)
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for MCP events.
pub trait McpAuditSink: Send + Sync {
    /// Record a request event.
    fn record(&self, event: &McpRequestEvent);

    /// Record a tool call event.
    fn record_tool_call(&self, _event: &ToolCallEvent) {}

    /// Record a lifecycle event.
    fn record_lifecycle(&self, _event: &LifecycleEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct McpStderrAuditSink;

impl McpStderrAuditSink {
    /// Writes one event line to stderr.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

impl McpAuditSink for McpStderrAuditSink {
    fn record(&self, event: &McpRequestEvent) {
        Self::emit(event);
    }

    fn record_tool_call(&self, event: &ToolCallEvent) {
        Self::emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct McpFileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl McpFileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one event line and flushes.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl McpAuditSink for McpFileAuditSink {
    fn record(&self, event: &McpRequestEvent) {
        self.emit(event);
    }

    fn record_tool_call(&self, event: &ToolCallEvent) {
        self.emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct McpNoopAuditSink;

impl McpAuditSink for McpNoopAuditSink {
    fn record(&self, _event: &McpRequestEvent) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use serde_json::Value;

    use super::McpAuditSink;
    use super::McpFileAuditSink;
    use super::McpMethod;
    use super::McpRequestEvent;
    use super::McpRequestEventParams;
    use super::ToolCallEvent;
    use crate::config::ServerTransport;

    #[test]
    fn methods_are_classified_by_name() {
        assert_eq!(McpMethod::classify("tools/call"), McpMethod::ToolsCall);
        assert_eq!(McpMethod::classify("notifications/initialized"), McpMethod::Notification);
        assert_eq!(McpMethod::classify("resources/list"), McpMethod::Other);
    }

    #[test]
    fn tool_event_truncates_unknown_names() {
        let long = "x".repeat(500);
        let event = ToolCallEvent::new(&long, false, Some("unknown_tool"), 0, false);
        assert_eq!(event.tool.len(), 64);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["outcome"], "error");
        assert_eq!(value["event"], "tool_call");
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = McpFileAuditSink::new(&path).unwrap();
        sink.record(&McpRequestEvent::new(McpRequestEventParams {
            transport: ServerTransport::Stdio,
            method: McpMethod::ToolsList,
            error_code: None,
            request_bytes: 10,
            response_bytes: 20,
            latency_ms: 1,
        }));
        sink.record_tool_call(&ToolCallEvent::new("list_insights", true, None, 3, true));
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> =
            content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["method"], "tools/list");
        assert_eq!(lines[0]["outcome"], "ok");
        assert_eq!(lines[0]["transport"], "stdio");
        assert_eq!(lines[1]["masked"], true);
    }
}
