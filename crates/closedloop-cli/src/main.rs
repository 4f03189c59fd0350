// crates/closedloop-cli/src/main.rs
// ============================================================================
// Module: ClosedLoop CLI Entry Point
// Description: Process entry point for the ClosedLoop MCP server.
// Purpose: Resolve configuration and run the server on the chosen transport.
// Dependencies: clap, closedloop-mcp, thiserror, tokio
// ============================================================================

//! ## Overview
//! `closedloop-mcp` loads configuration (optional TOML file, environment,
//! then command-line transport overrides), builds the MCP server, and serves
//! until the transport closes. Startup failures, including a missing
//! `CLOSEDLOOP_API_KEY`, are written to stderr and exit non-zero. Stdout is
//! reserved for protocol traffic.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::ValueEnum;
use closedloop_mcp::ClosedLoopConfig;
use closedloop_mcp::McpServer;
use closedloop_mcp::ServerOverrides;
use closedloop_mcp::ServerTransport;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "closedloop-mcp", version, about = "ClosedLoop AI insights MCP server")]
struct Cli {
    /// Optional TOML config file (overrides `CLOSEDLOOP_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Agent-facing transport.
    #[arg(long, value_enum, value_name = "TRANSPORT")]
    transport: Option<TransportArg>,
    /// Bind address for the HTTP transport.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

/// Transport selection for the server.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum TransportArg {
    /// JSON-RPC over stdin/stdout.
    Stdio,
    /// JSON-RPC over HTTP POST.
    Http,
}

impl From<TransportArg> for ServerTransport {
    fn from(value: TransportArg) -> Self {
        match value {
            TransportArg::Stdio => Self::Stdio,
            TransportArg::Http => Self::Http,
        }
    }
}

impl Cli {
    /// Returns the transport overrides carried by the command line.
    fn overrides(&self) -> ServerOverrides {
        ServerOverrides {
            transport: self.transport.map(ServerTransport::from),
            bind: self.bind.clone(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for startup and serve failures.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Loads configuration and serves until the transport closes.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let server = McpServer::from_config(config)
        .map_err(|err| CliError::new(format!("failed to start server: {err}")))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves the layered configuration for `cli`.
fn load_config(cli: &Cli) -> CliResult<ClosedLoopConfig> {
    ClosedLoopConfig::load_with_overrides(cli.config.as_deref(), &cli.overrides())
        .map_err(|err| CliError::new(err.to_string()))
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
