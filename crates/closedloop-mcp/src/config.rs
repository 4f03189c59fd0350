// crates/closedloop-mcp/src/config.rs
// ============================================================================
// Module: ClosedLoop MCP Configuration
// Description: Configuration loading and validation for the MCP server.
// Purpose: Merge defaults, an optional TOML file, and environment overrides.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is resolved in three layers: built-in defaults, an optional
//! TOML file (`--config` or `CLOSEDLOOP_CONFIG`), then environment variables.
//! The backend credential is only read from the environment and is never
//! serialized or printed. Missing or invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the backend API key.
pub const API_KEY_ENV: &str = "CLOSEDLOOP_API_KEY";
/// Environment variable overriding the backend base URL.
pub const SERVER_URL_ENV: &str = "CLOSEDLOOP_SERVER_URL";
/// Environment variable enabling privacy mode (`true` enables).
pub const PRIVACY_MODE_ENV: &str = "CLOSEDLOOP_PRIVACY_MODE";
/// Environment variable selecting the search transport.
pub const SEARCH_TRANSPORT_ENV: &str = "CLOSEDLOOP_SEARCH_TRANSPORT";
/// Environment variable pointing at an optional TOML config file.
pub const CONFIG_ENV_VAR: &str = "CLOSEDLOOP_CONFIG";
/// Default backend base URL.
pub const DEFAULT_SERVER_URL: &str = "https://mcp.closedloop.sh";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 256 * 1024;
/// Maximum total config path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default maximum backend response size in bytes.
pub(crate) const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;
/// Default maximum JSON-RPC request size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// ClosedLoop MCP server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClosedLoopConfig {
    /// Backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Privacy masking settings.
    #[serde(default)]
    pub privacy: PrivacyConfig,
    /// MCP transport settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Audit logging settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Backend credential, sourced from the environment only.
    #[serde(skip)]
    pub api_key: Option<ApiKey>,
}

/// Backend connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the ClosedLoop backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Transport used by `search_insights`.
    #[serde(default)]
    pub search_transport: SearchTransport,
    /// Maximum accepted backend response size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_transport: SearchTransport::default(),
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

/// Backend convention for full-text search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchTransport {
    /// POST the arguments as the request body.
    #[default]
    Rest,
    /// POST a JSON-RPC envelope and unwrap `result` from the reply.
    JsonRpc,
}

impl FromStr for SearchTransport {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "json_rpc" | "jsonrpc" => Ok(Self::JsonRpc),
            other => Err(ConfigError::Invalid(format!("unknown search transport: {other}"))),
        }
    }
}

/// Privacy masking settings.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrivacyConfig {
    /// Mask customer identifiers in tool responses.
    #[serde(default)]
    pub enabled: bool,
}

/// MCP transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Transport used to talk to the agent.
    #[serde(default)]
    pub transport: ServerTransport,
    /// Bind address for the HTTP transport.
    #[serde(default)]
    pub bind: Option<String>,
    /// Maximum accepted JSON-RPC request size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: ServerTransport::default(),
            bind: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Agent-facing transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// JSON-RPC over stdin/stdout.
    #[default]
    Stdio,
    /// JSON-RPC over HTTP POST.
    Http,
}

/// Audit logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Emit audit events.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Append events to this file instead of stderr.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

/// Transport settings supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ServerOverrides {
    /// Replaces `server.transport` when set.
    pub transport: Option<ServerTransport>,
    /// Replaces `server.bind` when set.
    pub bind: Option<String>,
}

impl ServerOverrides {
    /// Writes the set overrides into `server`.
    fn apply(&self, server: &mut ServerConfig) {
        if let Some(transport) = self.transport {
            server.transport = transport;
        }
        if let Some(bind) = &self.bind {
            server.bind = Some(bind.clone());
        }
    }
}

/// Backend bearer credential.
///
/// # Invariants
/// - The value is never rendered by `Debug` or `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a credential, rejecting blank values.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() { None } else { Some(Self(value)) }
    }

    /// Returns the raw credential for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl ClosedLoopConfig {
    /// Loads configuration from an optional file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| env::var(key).ok())
    }

    /// Loads configuration using `lookup` in place of the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::load_layers(path, &lookup, &ServerOverrides::default())
    }

    /// Loads configuration and applies command-line transport overrides last.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_with_overrides(
        path: Option<&Path>,
        overrides: &ServerOverrides,
    ) -> Result<Self, ConfigError> {
        Self::load_layers(path, &|key: &str| env::var(key).ok(), overrides)
    }

    /// Resolves every layer in order, then validates the merged result.
    fn load_layers<F>(
        path: Option<&Path>,
        lookup: &F,
        overrides: &ServerOverrides,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file =
            path.map(Path::to_path_buf).or_else(|| lookup(CONFIG_ENV_VAR).map(PathBuf::from));
        let mut config = match file {
            Some(file) => Self::from_file(&file)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        overrides.apply(&mut config.server);
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML config file without applying environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses TOML config text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies environment overrides.
    ///
    /// An empty `CLOSEDLOOP_SERVER_URL` keeps the configured base URL. Privacy
    /// mode is enabled only by the exact value `true`.
    fn apply_env<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key = lookup(API_KEY_ENV).and_then(ApiKey::new);
        if let Some(url) = lookup(SERVER_URL_ENV)
            && !url.trim().is_empty()
        {
            self.backend.base_url = url.trim().to_string();
        }
        if let Some(flag) = lookup(PRIVACY_MODE_ENV) {
            self.privacy.enabled = flag == "true";
        }
        if let Some(transport) = lookup(SEARCH_TRANSPORT_ENV) {
            self.backend.search_transport = transport.parse()?;
        }
        Ok(())
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        self.backend.validate()?;
        self.server.validate()
    }
}

impl BackendConfig {
    /// Parses and validates the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for unsupported or credential-bearing URLs.
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|err| ConfigError::Invalid(format!("backend.base_url: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(
                "backend.base_url must use http:// or https://".to_string(),
            ));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(ConfigError::Invalid(
                "backend.base_url must not embed credentials".to_string(),
            ));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(ConfigError::Invalid(
                "backend.base_url must not carry a query or fragment".to_string(),
            ));
        }
        Ok(url)
    }

    /// Validates backend settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url()?;
        if self.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(
                "backend.max_response_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl ServerConfig {
    /// Returns the parsed HTTP bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address is missing or malformed.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self
            .bind
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("server.bind required for http".to_string()))?;
        bind.parse().map_err(|_| ConfigError::Invalid(format!("invalid bind address: {bind}")))
    }

    /// Validates transport settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.transport == ServerTransport::Http {
            self.bind_addr()?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default backend base URL.
fn default_base_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

/// Default backend response limit.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Default JSON-RPC request limit.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Serde default helper.
const fn default_true() -> bool {
    true
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The backend credential is not set.
    #[error("CLOSEDLOOP_API_KEY environment variable is required")]
    MissingApiKey,
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::use_debug,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use std::collections::BTreeMap;
    use std::io::Write;

    use super::ClosedLoopConfig;
    use super::ConfigError;
    use super::DEFAULT_SERVER_URL;
    use super::SearchTransport;
    use super::ServerTransport;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> =
            pairs.iter().map(|(key, value)| ((*key).to_string(), (*value).to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = ClosedLoopConfig::load_with(None, env_of(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
        let err =
            ClosedLoopConfig::load_with(None, env_of(&[("CLOSEDLOOP_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn defaults_apply_without_file() {
        let config =
            ClosedLoopConfig::load_with(None, env_of(&[("CLOSEDLOOP_API_KEY", "k")])).unwrap();
        assert_eq!(config.backend.base_url, DEFAULT_SERVER_URL);
        assert!(!config.privacy.enabled);
        assert_eq!(config.backend.search_transport, SearchTransport::Rest);
        assert_eq!(config.server.transport, ServerTransport::Stdio);
        assert_eq!(config.api_key.unwrap().expose(), "k");
    }

    #[test]
    fn environment_overrides_apply() {
        let config = ClosedLoopConfig::load_with(
            None,
            env_of(&[
                ("CLOSEDLOOP_API_KEY", "k"),
                ("CLOSEDLOOP_SERVER_URL", "http://127.0.0.1:9000/api"),
                ("CLOSEDLOOP_PRIVACY_MODE", "true"),
                ("CLOSEDLOOP_SEARCH_TRANSPORT", "json_rpc"),
            ]),
        )
        .unwrap();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:9000/api");
        assert!(config.privacy.enabled);
        assert_eq!(config.backend.search_transport, SearchTransport::JsonRpc);
    }

    #[test]
    fn privacy_mode_requires_exact_true() {
        for value in ["TRUE", "1", "yes", ""] {
            let config = ClosedLoopConfig::load_with(
                None,
                env_of(&[("CLOSEDLOOP_API_KEY", "k"), ("CLOSEDLOOP_PRIVACY_MODE", value)]),
            )
            .unwrap();
            assert!(!config.privacy.enabled, "{value} should not enable privacy mode");
        }
    }

    #[test]
    fn empty_server_url_keeps_default() {
        let config = ClosedLoopConfig::load_with(
            None,
            env_of(&[("CLOSEDLOOP_API_KEY", "k"), ("CLOSEDLOOP_SERVER_URL", "")]),
        )
        .unwrap();
        assert_eq!(config.backend.base_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn file_layer_is_overridden_by_environment() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[backend]\nbase_url = \"https://staging.closedloop.sh\"\nsearch_transport = \
             \"json_rpc\"\n\n[privacy]\nenabled = true\n\n[server]\ntransport = \"http\"\nbind = \
             \"127.0.0.1:8080\"\n"
        )
        .unwrap();
        let config = ClosedLoopConfig::load_with(
            Some(file.path()),
            env_of(&[("CLOSEDLOOP_API_KEY", "k"), ("CLOSEDLOOP_PRIVACY_MODE", "false")]),
        )
        .unwrap();
        assert_eq!(config.backend.base_url, "https://staging.closedloop.sh");
        assert_eq!(config.backend.search_transport, SearchTransport::JsonRpc);
        assert!(!config.privacy.enabled);
        assert_eq!(config.server.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ClosedLoopConfig::from_toml_str("[backend]\nretries = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_base_urls_fail_closed() {
        for url in ["ftp://closedloop.sh", "https://user:pw@closedloop.sh", "not a url"] {
            let err = ClosedLoopConfig::load_with(
                None,
                env_of(&[("CLOSEDLOOP_API_KEY", "k"), ("CLOSEDLOOP_SERVER_URL", url)]),
            )
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{url}");
        }
    }

    #[test]
    fn http_transport_requires_bind() {
        let mut config =
            ClosedLoopConfig::from_toml_str("[server]\ntransport = \"http\"\n").unwrap();
        config.api_key = super::ApiKey::new("k");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn command_line_overrides_apply_before_validation() {
        let overrides = super::ServerOverrides {
            transport: Some(ServerTransport::Http),
            bind: Some("127.0.0.1:9090".to_string()),
        };
        let config = ClosedLoopConfig::load_layers(
            None,
            &env_of(&[("CLOSEDLOOP_API_KEY", "k")]),
            &overrides,
        )
        .unwrap();
        assert_eq!(config.server.transport, ServerTransport::Http);
        assert_eq!(config.server.bind_addr().unwrap().port(), 9090);

        let missing_bind = super::ServerOverrides {
            transport: Some(ServerTransport::Http),
            bind: None,
        };
        let err = ClosedLoopConfig::load_layers(
            None,
            &env_of(&[("CLOSEDLOOP_API_KEY", "k")]),
            &missing_bind,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_search_transport_is_rejected() {
        let err = ClosedLoopConfig::load_with(
            None,
            env_of(&[("CLOSEDLOOP_API_KEY", "k"), ("CLOSEDLOOP_SEARCH_TRANSPORT", "grpc")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = super::ApiKey::new("secret-value").unwrap();
        assert!(!format!("{key:?}").contains("secret"));
    }
}
