// crates/closedloop-mcp/src/backend.rs
// ============================================================================
// Module: Insight Backend Client
// Description: Authenticated HTTP client for the ClosedLoop insight backend.
// Purpose: Issue one bounded request per tool call and decode the reply body.
// Dependencies: async-trait, reqwest, serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! [`Backend`] is the seam between tool routing and the network. The
//! production [`HttpBackend`] attaches `Authorization: Bearer <key>` and
//! `Content-Type: application/json` to every call, enforces a response size
//! limit, and decodes bodies leniently: empty bodies become `null` and
//! non-JSON bodies become a JSON string. Non-success statuses fail with the
//! status code and any `detail`/`error`/`message` text the backend returned.
//!
//! There is no client-side timeout, retry, or cancellation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use reqwest::Response;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::ApiKey;

// ============================================================================
// SECTION: Endpoints
// ============================================================================

/// Insight listing and detail collection.
pub const FEEDBACKS_ENDPOINT: &str = "feedbacks";
/// REST search endpoint.
pub const SEARCH_ENDPOINT: &str = "feedbacks/search";
/// JSON-RPC endpoint accepting `tools/call` envelopes.
pub const RPC_ENDPOINT: &str = "mcp";
/// Planning context endpoint.
pub const PLANNING_CONTEXT_ENDPOINT: &str = "planning/context";

// ============================================================================
// SECTION: Requests
// ============================================================================

/// One outbound backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendRequest {
    /// GET `endpoint` with query parameters.
    Get {
        /// Endpoint path relative to the base URL.
        endpoint: &'static str,
        /// Query pairs in order; repeated keys are allowed.
        query: Vec<(String, String)>,
    },
    /// GET `endpoint/{id}` with the identifier as one encoded path segment.
    GetResource {
        /// Collection path relative to the base URL.
        endpoint: &'static str,
        /// Resource identifier.
        id: String,
    },
    /// POST a JSON body to `endpoint`.
    Post {
        /// Endpoint path relative to the base URL.
        endpoint: &'static str,
        /// JSON request body.
        body: Value,
    },
}

impl BackendRequest {
    /// Returns the HTTP method label.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Get { .. } | Self::GetResource { .. } => "GET",
            Self::Post { .. } => "POST",
        }
    }

    /// Resolves the full request URL against `base`.
    ///
    /// Any path already present on `base` is kept as a prefix.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidUrl`] when `base` cannot carry a path.
    pub fn url(&self, base: &Url) -> Result<Url, BackendError> {
        let mut url = base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                BackendError::InvalidUrl("base url cannot carry a path".to_string())
            })?;
            segments.pop_if_empty();
            let endpoint = match self {
                Self::Get { endpoint, .. }
                | Self::GetResource { endpoint, .. }
                | Self::Post { endpoint, .. } => endpoint,
            };
            segments.extend(endpoint.split('/'));
            if let Self::GetResource { id, .. } = self {
                segments.push(id);
            }
        }
        if let Self::Get { query, .. } = self
            && !query.is_empty()
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Backend call failures.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request URL could not be formed.
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
    /// HTTP client could not be constructed.
    #[error("http client init failed: {0}")]
    Client(String),
    /// Network or protocol failure before a status was received.
    #[error("request failed: {0}")]
    Transport(String),
    /// Backend answered with a non-success status.
    #[error("request failed with status code {status}{}", detail_suffix(.detail.as_deref()))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error text extracted from the reply body.
        detail: Option<String>,
    },
    /// Reply body exceeded the configured limit.
    #[error("response exceeds {0} bytes")]
    TooLarge(usize),
    /// Request body could not be encoded.
    #[error("request encoding failed: {0}")]
    Encode(String),
}

/// Formats an optional status detail as a `: detail` suffix.
fn detail_suffix(detail: Option<&str>) -> String {
    detail.map(|text| format!(": {text}")).unwrap_or_default()
}

// ============================================================================
// SECTION: Backend Trait
// ============================================================================

/// Executes backend requests.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Sends one request and returns the decoded reply body.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] for transport, status, or size failures.
    async fn send(&self, request: &BackendRequest) -> Result<Value, BackendError>;
}

// ============================================================================
// SECTION: HTTP Backend
// ============================================================================

/// reqwest-backed [`Backend`].
pub struct HttpBackend {
    /// Shared HTTP client.
    client: Client,
    /// Base URL all endpoints resolve against.
    base_url: Url,
    /// Bearer credential.
    api_key: ApiKey,
    /// Maximum accepted reply size in bytes.
    max_response_bytes: usize,
}

impl HttpBackend {
    /// Builds a backend client.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Client`] when the HTTP client cannot be built.
    pub fn new(
        base_url: Url,
        api_key: ApiKey,
        max_response_bytes: usize,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .user_agent(concat!("closedloop-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| BackendError::Client(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_key,
            max_response_bytes,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send(&self, request: &BackendRequest) -> Result<Value, BackendError> {
        let url = request.url(&self.base_url)?;
        let builder = match request {
            BackendRequest::Get { .. } | BackendRequest::GetResource { .. } => {
                self.client.get(url)
            }
            BackendRequest::Post { body, .. } => {
                let bytes =
                    serde_json::to_vec(body).map_err(|err| BackendError::Encode(err.to_string()))?;
                self.client.post(url).body(bytes)
            }
        };
        let response = builder
            .bearer_auth(self.api_key.expose())
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.without_url().to_string()))?;
        let status = response.status();
        let body = read_limited(response, self.max_response_bytes).await?;
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        Ok(decode_body(&body))
    }
}

// ============================================================================
// SECTION: Body Handling
// ============================================================================

/// Reads the response body while enforcing a byte limit.
async fn read_limited(mut response: Response, max_bytes: usize) -> Result<Vec<u8>, BackendError> {
    let max_bytes_u64 = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(BackendError::TooLarge(max_bytes));
    }
    let mut buf = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| BackendError::Transport(err.without_url().to_string()))?
    {
        if buf.len().saturating_add(chunk.len()) > max_bytes {
            return Err(BackendError::TooLarge(max_bytes));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Decodes a reply body: JSON when possible, else text; empty is `null`.
#[must_use]
pub fn decode_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

/// Extracts a human-readable error message from an error reply body.
fn error_detail(body: &[u8]) -> Option<String> {
    match decode_body(body) {
        Value::Object(map) => ["detail", "error", "message"].iter().find_map(|key| {
            match map.get(*key) {
                Some(Value::String(text)) if !text.is_empty() => Some(text.clone()),
                Some(Value::Object(inner)) => {
                    inner.get("message").and_then(Value::as_str).map(str::to_string)
                }
                _ => None,
            }
        }),
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.chars().take(200).collect())
        }
        _ => None,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
