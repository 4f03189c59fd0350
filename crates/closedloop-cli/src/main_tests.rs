// crates/closedloop-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing in the CLI entry point.
// Purpose: Ensure transport flags map onto configuration overrides.
// Dependencies: closedloop-cli main helpers
// ============================================================================

//! ## Overview
//! Validates flag parsing and the override layer handed to configuration.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use clap::Parser;
use closedloop_mcp::ServerTransport;

use super::Cli;
use super::CliError;
use super::TransportArg;
use super::emit_error;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn no_flags_leave_configuration_untouched() {
    let cli = Cli::try_parse_from(["closedloop-mcp"]).unwrap();
    assert!(cli.config.is_none());
    let overrides = cli.overrides();
    assert!(overrides.transport.is_none());
    assert!(overrides.bind.is_none());
}

#[test]
fn http_flags_become_overrides() {
    let cli = Cli::try_parse_from([
        "closedloop-mcp",
        "--config",
        "closedloop.toml",
        "--transport",
        "http",
        "--bind",
        "127.0.0.1:8080",
    ])
    .unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("closedloop.toml")));
    assert_eq!(cli.transport, Some(TransportArg::Http));
    let overrides = cli.overrides();
    assert_eq!(overrides.transport, Some(ServerTransport::Http));
    assert_eq!(overrides.bind.as_deref(), Some("127.0.0.1:8080"));
}

#[test]
fn unknown_transport_is_rejected() {
    assert!(Cli::try_parse_from(["closedloop-mcp", "--transport", "grpc"]).is_err());
}

#[test]
fn cli_error_renders_message_only() {
    let err = CliError::new("CLOSEDLOOP_API_KEY environment variable is required".to_string());
    assert_eq!(err.to_string(), "CLOSEDLOOP_API_KEY environment variable is required");
}

#[test]
fn emit_error_reports_failure() {
    assert_eq!(emit_error("boom"), std::process::ExitCode::FAILURE);
}
