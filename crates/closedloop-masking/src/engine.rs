// crates/closedloop-masking/src/engine.rs
// ============================================================================
// Module: Masking Engine
// Description: Deterministic pseudonymization of identifiers and documents.
// Purpose: Replace PII in backend responses with stable fake identities.
// Dependencies: serde_json, closedloop-masking::{catalog, hash, rules}
// ============================================================================

//! ## Overview
//! [`MaskingEngine`] combines an [`IdentityCatalog`] with the fingerprint to
//! turn identifiers into pseudonyms, and applies a [`MaskRule`] table to whole
//! JSON documents.
//!
//! ## Invariants
//! - Masking is a pure function of the input and the catalog.
//! - [`MaskingEngine::mask_document`] never mutates its input.
//! - Masking is not idempotent: a pseudonym fed back in is treated as a new
//!   identifier and usually maps to a different pseudonym.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::catalog::IdentityCatalog;
use crate::hash::fingerprint;
use crate::rules::DEFAULT_RULES;
use crate::rules::MaskKind;
use crate::rules::MaskRule;
use crate::rules::walk;

// ============================================================================
// SECTION: Placeholders
// ============================================================================

/// Pseudonym returned for an empty name.
pub const NAME_PLACEHOLDER: &str = "Anonymous User";
/// Pseudonym returned for an empty email.
pub const EMAIL_PLACEHOLDER: &str = "user@example.com";
/// Pseudonym returned for an empty company.
pub const COMPANY_PLACEHOLDER: &str = "Unknown Company";
/// Domain used for fake email addresses.
pub const FAKE_EMAIL_DOMAIN: &str = "example.com";

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Deterministic masking engine.
#[derive(Debug, Clone, Copy)]
pub struct MaskingEngine {
    /// Pseudonym pools.
    catalog: IdentityCatalog,
    /// Field paths masked inside documents.
    rules: &'static [MaskRule],
}

impl MaskingEngine {
    /// Creates an engine over `catalog` using [`DEFAULT_RULES`].
    #[must_use]
    pub const fn new(catalog: IdentityCatalog) -> Self {
        Self {
            catalog,
            rules: DEFAULT_RULES,
        }
    }

    /// Creates an engine with a custom rule table.
    #[must_use]
    pub const fn with_rules(catalog: IdentityCatalog, rules: &'static [MaskRule]) -> Self {
        Self {
            catalog,
            rules,
        }
    }

    /// Masks a person name as `"First Last"`.
    #[must_use]
    pub fn mask_name(&self, value: &str) -> String {
        if value.is_empty() {
            return NAME_PLACEHOLDER.to_string();
        }
        let (first, last) = self.catalog.person(fingerprint(value));
        format!("{first} {last}")
    }

    /// Masks an email address as `first.last@example.com`.
    #[must_use]
    pub fn mask_email(&self, value: &str) -> String {
        if value.is_empty() {
            return EMAIL_PLACEHOLDER.to_string();
        }
        let (first, last) = self.catalog.person(fingerprint(value));
        format!("{}.{}@{FAKE_EMAIL_DOMAIN}", first.to_lowercase(), last.to_lowercase())
    }

    /// Masks a company name.
    #[must_use]
    pub fn mask_company(&self, value: &str) -> String {
        if value.is_empty() {
            return COMPANY_PLACEHOLDER.to_string();
        }
        self.catalog.company(fingerprint(value)).to_string()
    }

    /// Masks a customer identifier, choosing the email path when it contains `@`.
    #[must_use]
    pub fn mask_customer(&self, value: &str) -> String {
        if is_email(value) { self.mask_email(value) } else { self.mask_name(value) }
    }

    /// Returns a masked copy of `document`.
    #[must_use]
    pub fn mask_document(&self, document: &Value) -> Value {
        let mut copy = document.clone();
        self.mask_in_place(&mut copy);
        copy
    }

    /// Masks an owned document in place.
    pub fn mask_in_place(&self, document: &mut Value) {
        for rule in self.rules {
            walk(document, rule.path, &mut |leaf: &mut Value| self.mask_leaf(rule.kind, leaf));
        }
    }

    /// Applies `kind` to a single resolved leaf.
    ///
    /// Customer leaves are only replaced when they are non-empty strings. Deal
    /// leaves also replace `null` and empty strings with the placeholder.
    fn mask_leaf(&self, kind: MaskKind, leaf: &mut Value) {
        match kind {
            MaskKind::Customer => {
                if let Value::String(text) = leaf
                    && !text.is_empty()
                {
                    *text = self.mask_customer(text);
                }
            }
            MaskKind::Company => match leaf {
                Value::String(text) => *text = self.mask_company(text),
                Value::Null => *leaf = Value::String(COMPANY_PLACEHOLDER.to_string()),
                _ => {}
            },
        }
    }
}

impl Default for MaskingEngine {
    fn default() -> Self {
        Self::new(IdentityCatalog::builtin())
    }
}

/// Returns true when `value` is classified as an email address.
#[must_use]
pub fn is_email(value: &str) -> bool {
    value.contains('@')
}
