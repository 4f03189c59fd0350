// crates/closedloop-mcp/src/tools.rs
// ============================================================================
// Module: MCP Tool Router
// Description: Tool dispatch from MCP calls to insight backend requests.
// Purpose: Validate arguments, call the backend, normalize, mask, and render.
// Dependencies: closedloop-masking, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The tool router turns one `tools/call` into at most one backend request.
//! Each [`ToolName`] has a fixed backend convention selected by an exhaustive
//! `match`; arguments are validated against the registry first and only
//! declared arguments are forwarded.
//!
//! ## Invariants
//! - [`ToolRouter::handle`] never fails: every error becomes a text content
//!   block prefixed with `Error: ` and flagged `isError`.
//! - Masking, when enabled, is applied to the normalized backend data before
//!   it is rendered, so no unmasked identifier reaches the client.
//! - Every call emits exactly one `tool_call` audit event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Instant;

use closedloop_masking::MaskingEngine;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::audit::McpAuditSink;
use crate::audit::ToolCallEvent;
use crate::backend::Backend;
use crate::backend::BackendRequest;
use crate::backend::FEEDBACKS_ENDPOINT;
use crate::backend::PLANNING_CONTEXT_ENDPOINT;
use crate::backend::RPC_ENDPOINT;
use crate::backend::SEARCH_ENDPOINT;
use crate::config::SearchTransport;
use crate::registry::ArgumentError;
use crate::registry::ToolDefinition;
use crate::registry::ToolName;
use crate::registry::tool_definitions;
use crate::registry::validate_arguments;

// ============================================================================
// SECTION: Results
// ============================================================================

/// Content block returned to MCP clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Plain text block.
    Text {
        /// Block text.
        text: String,
    },
}

/// `tools/call` result payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallResult {
    /// Content blocks (always exactly one).
    pub content: Vec<ToolContent>,
    /// Set when the call failed.
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Wraps successful text output.
    #[must_use]
    pub fn text(text: String) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text,
            }],
            is_error: false,
        }
    }

    /// Wraps a tool failure as `Error: <message>`.
    #[must_use]
    pub fn failure(error: &ToolError) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: format!("Error: {error}"),
            }],
            is_error: true,
        }
    }

    /// Returns the text of the first content block.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|ToolContent::Text { text }| text.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool call failures. All render into the same error content block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Required argument absent or blank.
    #[error("{0} is required")]
    MissingArgument(String),
    /// Argument present but malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Tool name not recognized.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    /// Backend call or reply failed.
    #[error("{0}")]
    BackendFailure(String),
    /// Result could not be rendered.
    #[error("serialization failure")]
    Serialization,
}

impl ToolError {
    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingArgument(_) => "missing_argument",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::UnknownTool(_) => "unknown_tool",
            Self::BackendFailure(_) => "backend_failure",
            Self::Serialization => "serialization",
        }
    }
}

impl From<ArgumentError> for ToolError {
    fn from(error: ArgumentError) -> Self {
        match error {
            ArgumentError::Missing(name) => Self::MissingArgument(name.to_string()),
            ArgumentError::Invalid {
                name,
                reason,
            } => Self::InvalidArgument(format!("{name} {reason}")),
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Dependencies for [`ToolRouter::new`].
pub struct ToolRouterConfig {
    /// Backend executing requests.
    pub backend: Arc<dyn Backend>,
    /// Convention used by `search_insights`.
    pub search_transport: SearchTransport,
    /// Masking engine; `Some` enables privacy mode.
    pub masking: Option<MaskingEngine>,
    /// Audit sink for tool call events.
    pub audit: Arc<dyn McpAuditSink>,
}

/// Routes MCP tool calls to the insight backend.
#[derive(Clone)]
pub struct ToolRouter {
    /// Backend executing requests.
    backend: Arc<dyn Backend>,
    /// Convention used by `search_insights`.
    search_transport: SearchTransport,
    /// Masking engine when privacy mode is on.
    masking: Option<MaskingEngine>,
    /// Audit sink for tool call events.
    audit: Arc<dyn McpAuditSink>,
    /// Next JSON-RPC envelope id.
    envelope_ids: Arc<AtomicU64>,
}

impl ToolRouter {
    /// Builds a router.
    #[must_use]
    pub fn new(config: ToolRouterConfig) -> Self {
        Self {
            backend: config.backend,
            search_transport: config.search_transport,
            masking: config.masking,
            audit: config.audit,
            envelope_ids: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Returns the tool definitions advertised by `tools/list`.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Returns true when responses are masked.
    #[must_use]
    pub const fn privacy_mode(&self) -> bool {
        self.masking.is_some()
    }

    /// Handles a tool call and renders the MCP result. Never fails.
    pub async fn handle(&self, name: &str, arguments: Value) -> ToolCallResult {
        let started = Instant::now();
        let outcome = self.handle_tool_call(name, arguments).await.and_then(|data| {
            serde_json::to_string_pretty(&data).map_err(|_| ToolError::Serialization)
        });
        let known = ToolName::parse(name).is_some();
        let error_kind = outcome.as_ref().err().map(ToolError::kind);
        self.audit.record_tool_call(&ToolCallEvent::new(
            name,
            known,
            error_kind,
            started.elapsed().as_millis(),
            self.privacy_mode(),
        ));
        match outcome {
            Ok(text) => ToolCallResult::text(text),
            Err(error) => ToolCallResult::failure(&error),
        }
    }

    /// Handles a tool call and returns the normalized (and masked) data.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for unknown tools, bad arguments, or backend failures.
    pub async fn handle_tool_call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let tool = ToolName::parse(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let arguments = validate_arguments(tool, &arguments)?;
        let enveloped = matches!(tool, ToolName::SearchInsights)
            && self.search_transport == SearchTransport::JsonRpc;
        let request = self.build_request(tool, arguments)?;
        let reply = self
            .backend
            .send(&request)
            .await
            .map_err(|err| ToolError::BackendFailure(err.to_string()))?;
        let data = normalize_reply(reply, enveloped)?;
        Ok(match &self.masking {
            Some(engine) => engine.mask_document(&data),
            None => data,
        })
    }

    /// Maps a validated call to its backend request.
    fn build_request(
        &self,
        tool: ToolName,
        arguments: Map<String, Value>,
    ) -> Result<BackendRequest, ToolError> {
        let request = match tool {
            ToolName::ListInsights => BackendRequest::Get {
                endpoint: FEEDBACKS_ENDPOINT,
                query: query_pairs(&arguments),
            },
            ToolName::GetInsightDetail => {
                let id = arguments
                    .get("insight_id")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| ToolError::MissingArgument("insight_id".to_string()))?;
                BackendRequest::GetResource {
                    endpoint: FEEDBACKS_ENDPOINT,
                    id: id.to_string(),
                }
            }
            ToolName::SearchInsights => match self.search_transport {
                SearchTransport::Rest => BackendRequest::Post {
                    endpoint: SEARCH_ENDPOINT,
                    body: Value::Object(arguments),
                },
                SearchTransport::JsonRpc => BackendRequest::Post {
                    endpoint: RPC_ENDPOINT,
                    body: json!({
                        "jsonrpc": "2.0",
                        "id": self.envelope_ids.fetch_add(1, Ordering::Relaxed),
                        "method": "tools/call",
                        "params": {
                            "name": tool.as_str(),
                            "arguments": Value::Object(arguments),
                        },
                    }),
                },
            },
            ToolName::GetPlanningContext => BackendRequest::Get {
                endpoint: PLANNING_CONTEXT_ENDPOINT,
                query: query_pairs(&arguments),
            },
        };
        Ok(request)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders arguments as query pairs; arrays become repeated keys.
fn query_pairs(arguments: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in arguments {
        match value {
            Value::Array(items) => {
                pairs.extend(items.iter().filter_map(query_text).map(|text| (key.clone(), text)));
            }
            other => {
                if let Some(text) = query_text(other) {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    pairs
}

/// Renders a scalar query value; `null` is dropped.
fn query_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Unwraps JSON-RPC reply envelopes.
///
/// With `enveloped` set the reply must carry `result` or `error`. Otherwise
/// only objects carrying both `jsonrpc` and `result` are unwrapped.
fn normalize_reply(reply: Value, enveloped: bool) -> Result<Value, ToolError> {
    let Value::Object(mut map) = reply else {
        if enveloped {
            return Err(ToolError::BackendFailure("backend returned no result".to_string()));
        }
        return Ok(reply);
    };
    if enveloped {
        if let Some(error) = map.remove("error")
            && !error.is_null()
        {
            return Err(ToolError::BackendFailure(rpc_error_message(&error)));
        }
        return map
            .remove("result")
            .ok_or_else(|| ToolError::BackendFailure("backend returned no result".to_string()));
    }
    if map.contains_key("jsonrpc")
        && let Some(result) = map.remove("result")
    {
        return Ok(result);
    }
    Ok(Value::Object(map))
}

/// Extracts the message from a JSON-RPC error member.
fn rpc_error_message(error: &Value) -> String {
    match error {
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string),
        other => other.to_string(),
    }
}
