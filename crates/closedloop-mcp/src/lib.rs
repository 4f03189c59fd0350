// crates/closedloop-mcp/src/lib.rs
// ============================================================================
// Module: ClosedLoop MCP
// Description: MCP server exposing ClosedLoop product-feedback insights.
// Purpose: Bridge MCP tool calls to the ClosedLoop insight backend.
// Dependencies: closedloop-masking, axum, reqwest, tokio
// ============================================================================

//! ## Overview
//! ClosedLoop MCP answers MCP tool calls by issuing one authenticated request
//! to the ClosedLoop backend per call and returning the reply as pretty JSON
//! text. With privacy mode enabled, customer identifiers in the reply are
//! replaced with deterministic pseudonyms before the text is rendered.
//!
//! ## Layers
//! - [`config`]: defaults, optional TOML file, and environment overrides.
//! - [`registry`]: tool names, argument constraints, and input schemas.
//! - [`backend`]: the HTTP client behind the [`backend::Backend`] seam.
//! - [`tools`]: per-tool routing, reply normalization, and masking.
//! - [`server`]: JSON-RPC handling over stdio or HTTP.
//! - [`audit`]: payload-free JSON-line audit events.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod backend;
pub mod config;
pub mod registry;
pub mod server;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::McpAuditSink;
pub use audit::McpFileAuditSink;
pub use audit::McpMethod;
pub use audit::McpNoopAuditSink;
pub use audit::McpOutcome;
pub use audit::McpStderrAuditSink;
pub use backend::Backend;
pub use backend::BackendError;
pub use backend::BackendRequest;
pub use backend::HttpBackend;
pub use config::ClosedLoopConfig;
pub use config::ConfigError;
pub use config::SearchTransport;
pub use config::ServerOverrides;
pub use config::ServerTransport;
pub use registry::ToolDefinition;
pub use registry::ToolName;
pub use server::McpServer;
pub use server::McpServerError;
pub use tools::ToolCallResult;
pub use tools::ToolError;
pub use tools::ToolRouter;
pub use tools::ToolRouterConfig;
