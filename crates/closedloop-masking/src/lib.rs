// crates/closedloop-masking/src/lib.rs
// ============================================================================
// Module: ClosedLoop Masking
// Description: Deterministic PII masking for ClosedLoop backend responses.
// Purpose: Pseudonymize customer identifiers before they reach an agent.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate replaces customer names, emails, and CRM deal names in backend
//! documents with fake identities drawn from a static catalog. Selection is a
//! pure function of the input string, so the same customer always receives the
//! same pseudonym across calls and process restarts, and no mapping table is
//! ever stored.
//!
//! Masking is one-way: there is no reverse lookup.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
pub mod engine;
pub mod hash;
pub mod rules;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::IdentityCatalog;
pub use engine::COMPANY_PLACEHOLDER;
pub use engine::EMAIL_PLACEHOLDER;
pub use engine::MaskingEngine;
pub use engine::NAME_PLACEHOLDER;
pub use engine::is_email;
pub use hash::fingerprint;
pub use rules::DEFAULT_RULES;
pub use rules::MaskKind;
pub use rules::MaskRule;
pub use rules::Segment;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Masking configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MaskingError {
    /// A catalog pool has no entries.
    #[error("catalog pool {0} must not be empty")]
    EmptyPool(&'static str),
}
