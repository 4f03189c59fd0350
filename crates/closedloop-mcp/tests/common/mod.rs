// crates/closedloop-mcp/tests/common/mod.rs
// ============================================================================
// Module: Integration Test Helpers
// Description: Stand-in ClosedLoop backend built on tiny_http.
// Purpose: Capture outbound requests and serve canned replies.
// Dependencies: closedloop-mcp, tiny_http, url
// ============================================================================

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Shared helpers are not used by every integration test binary."
)]

use std::sync::Arc;
use std::thread;

use closedloop_mcp::HttpBackend;
use closedloop_mcp::McpNoopAuditSink;
use closedloop_mcp::SearchTransport;
use closedloop_mcp::ToolRouter;
use closedloop_mcp::ToolRouterConfig;
use closedloop_mcp::config::ApiKey;
use closedloop_masking::MaskingEngine;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use url::Url;

/// API key the stand-in backend expects.
pub const TEST_API_KEY: &str = "cl_test_key";

/// One request observed by the stand-in backend.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// HTTP method.
    pub method: String,
    /// Path and query as received.
    pub url: String,
    /// `Authorization` header value.
    pub authorization: Option<String>,
    /// `Content-Type` header value.
    pub content_type: Option<String>,
    /// Raw request body.
    pub body: String,
}

/// Serves exactly one request with `status` and `body`, returning the base
/// URL and a handle yielding the captured request.
pub fn spawn_backend(
    status: u16,
    body: &str,
) -> (String, thread::JoinHandle<Option<CapturedRequest>>) {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let addr = server.server_addr();
    let body = body.to_string();
    let handle = thread::spawn(move || {
        let mut request = server.recv().ok()?;
        let header = |name: &str| {
            request
                .headers()
                .iter()
                .find(|header| header.field.as_str().as_str().eq_ignore_ascii_case(name))
                .map(|header| header.value.as_str().to_string())
        };
        let authorization = header("Authorization");
        let content_type = header("Content-Type");
        let mut received = String::new();
        request.as_reader().read_to_string(&mut received).ok()?;
        let captured = CapturedRequest {
            method: request.method().as_str().to_string(),
            url: request.url().to_string(),
            authorization,
            content_type,
            body: received,
        };
        let response = Response::from_string(body)
            .with_status_code(status)
            .with_header(Header::from_bytes("Content-Type", "application/json").unwrap());
        request.respond(response).ok()?;
        Some(captured)
    });
    (format!("http://{addr}"), handle)
}

/// Builds a router backed by a real HTTP client pointed at `base_url`.
pub fn router_for(base_url: &str, transport: SearchTransport, privacy: bool) -> ToolRouter {
    router_with_limit(base_url, transport, privacy, 1024 * 1024)
}

/// Builds a router with a custom response size limit.
pub fn router_with_limit(
    base_url: &str,
    transport: SearchTransport,
    privacy: bool,
    max_response_bytes: usize,
) -> ToolRouter {
    let backend = HttpBackend::new(
        Url::parse(base_url).unwrap(),
        ApiKey::new(TEST_API_KEY).unwrap(),
        max_response_bytes,
    )
    .unwrap();
    ToolRouter::new(ToolRouterConfig {
        backend: Arc::new(backend),
        search_transport: transport,
        masking: privacy.then(MaskingEngine::default),
        audit: Arc::new(McpNoopAuditSink),
    })
}
