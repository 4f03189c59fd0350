// crates/closedloop-masking/src/catalog.rs
// ============================================================================
// Module: Fake Identity Catalog
// Description: Static pseudonym pools for deterministic masking.
// Purpose: Provide read-only first name, last name, and company candidates.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The catalog is the only state the masking engine consults. The built-in
//! pools are `static` slices that are never written after compilation, so a
//! catalog value can be copied freely across threads without synchronization.
//!
//! ## Invariants
//! - Pool order is part of the pseudonym contract: reordering an entry changes
//!   every pseudonym derived from it.
//! - Person names and company names live in separate pools.
//! - Every pool is non-empty.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::MaskingError;

// ============================================================================
// SECTION: Built-in Pools
// ============================================================================

/// Built-in first name pool.
pub static FIRST_NAMES: &[&str] = &[
    "Alex", "Jordan", "Taylor", "Morgan", "Casey", "Riley", "Quinn", "Avery", "Cameron", "Drew",
    "Jamie", "Reese", "Skyler", "Parker", "Hayden", "Emerson", "Rowan", "Finley", "Sage", "Blake",
    "Emma", "Liam", "Olivia", "Noah", "Ava", "Ethan", "Sophia", "Mason", "Isabella", "William",
    "Mia", "James", "Charlotte", "Benjamin", "Amelia", "Lucas", "Harper", "Henry", "Evelyn",
    "Alexander", "Luna", "Michael", "Ella", "Daniel", "Elizabeth", "Matthew", "Sofia", "David",
    "Emily", "Joseph", "Aria", "Samuel", "Scarlett", "Sebastian", "Grace", "Jack", "Chloe", "Owen",
    "Victoria", "Gabriel", "Penelope", "Carter", "Layla", "Jayden", "Riley", "John", "Zoey",
    "Luke", "Nora", "Dylan", "Lily", "Grayson", "Eleanor", "Isaac", "Hannah", "Anthony", "Lillian",
    "Thomas", "Addison", "Charles", "Aubrey", "Christopher", "Ellie", "Joshua", "Stella", "Andrew",
    "Natalie", "Lincoln", "Zoe", "Nathan", "Leah", "Ryan", "Hazel", "Adrian", "Violet", "Eli",
    "Aurora", "Nolan", "Savannah", "Aaron",
];

/// Built-in last name pool.
pub static LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Anderson", "Taylor", "Thomas", "Moore", "Jackson", "Martin", "Lee", "Thompson",
    "White", "Harris", "Sanchez", "Clark", "Lewis", "Robinson", "Walker", "Young", "Allen", "King",
    "Wright", "Scott", "Torres", "Nguyen", "Hill", "Flores", "Green", "Adams", "Nelson", "Baker",
    "Hall", "Rivera", "Campbell", "Mitchell", "Carter", "Roberts", "Turner", "Phillips", "Evans",
    "Parker", "Edwards", "Collins", "Stewart", "Morris", "Murphy", "Cook", "Rogers", "Morgan",
    "Peterson", "Cooper", "Reed", "Bailey", "Bell", "Gomez", "Kelly", "Howard", "Ward", "Cox",
    "Diaz", "Richardson", "Wood", "Watson", "Brooks", "Bennett", "Gray", "James", "Reyes", "Cruz",
    "Hughes", "Price", "Myers", "Long", "Foster", "Sanders", "Ross", "Morales", "Powell",
    "Sullivan", "Russell", "Ortiz", "Jenkins", "Gutierrez", "Perry", "Butler", "Barnes", "Fisher",
    "Henderson", "Coleman", "Simmons", "Patterson", "Jordan", "Reynolds",
];

/// Built-in company name pool.
pub static COMPANIES: &[&str] = &[
    "Stackflow", "Builderly", "Teamspace", "Docuwise", "Chartly", "Formstack", "Taskbird",
    "Codebase", "Metricly", "Trackify", "Insightly", "Launchpad", "Scalebase", "Cloudly",
    "Deployify", "Hostbase", "Meetly", "Recordly", "Boardify", "Designly", "Workstream",
    "Projectly", "Taskflow", "Notewise", "Chatly", "Supportly", "Helpwise", "Ticketly", "Dealflow",
    "Pipebase", "Leadify", "Closely", "Paybase", "Finwise", "Expensely", "Bankify", "Fundly",
    "Equitybase", "Payrolly", "Peoplewise", "Monitorly", "Alertify", "Logwise", "Dashbase",
    "Oncallify", "Incidently", "Debugly", "Tracewise", "Messagely", "Mailwise", "Campaignly",
    "Sendbase", "Engagely", "Pushify", "Automately", "Flowbase", "Authly", "Securify", "Loginwise",
    "Accessly", "Identifybase", "Shieldly", "Protectify", "Scanwise", "Repobase", "Codewise",
    "Branchly", "Buildify", "Testbase", "Pipelinewise", "Shiply", "Deploybase", "Datawise",
    "Warehously", "Syncify", "Streambase", "Transformly", "Qualitywise", "Catalogly", "Governbase",
    "Contentwise", "Headlessly", "Schemabase", "Mediafly", "Componentwise", "Blockify",
    "Modelbase", "Fieldly", "Edgewise", "Cachely", "Speedbase", "Sitewise", "Infrabase",
    "Computewise", "Containerfly", "Serverbase", "Feedbackly", "Analytify", "Sessionbase",
    "Replaywise", "Heatmaply", "Researchify", "Prototypewise", "Insightbase",
];

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Read-only set of pseudonym pools.
///
/// # Invariants
/// - All three pools are non-empty (enforced by [`IdentityCatalog::new`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityCatalog {
    /// Candidate first names.
    first_names: &'static [&'static str],
    /// Candidate last names.
    last_names: &'static [&'static str],
    /// Candidate company names.
    companies: &'static [&'static str],
}

impl IdentityCatalog {
    /// Returns the built-in catalog.
    #[must_use]
    pub const fn builtin() -> Self {
        Self {
            first_names: FIRST_NAMES,
            last_names: LAST_NAMES,
            companies: COMPANIES,
        }
    }

    /// Builds a catalog from caller-supplied pools.
    ///
    /// # Errors
    ///
    /// Returns [`MaskingError::EmptyPool`] when any pool is empty.
    pub const fn new(
        first_names: &'static [&'static str],
        last_names: &'static [&'static str],
        companies: &'static [&'static str],
    ) -> Result<Self, MaskingError> {
        if first_names.is_empty() {
            return Err(MaskingError::EmptyPool("first_names"));
        }
        if last_names.is_empty() {
            return Err(MaskingError::EmptyPool("last_names"));
        }
        if companies.is_empty() {
            return Err(MaskingError::EmptyPool("companies"));
        }
        Ok(Self {
            first_names,
            last_names,
            companies,
        })
    }

    /// Derives the `(first, last)` pair for a fingerprint.
    ///
    /// The first name uses the fingerprint modulo the first-name pool size; the
    /// last name uses the quotient of that division, modulo the last-name pool.
    #[must_use]
    pub fn person(&self, key: u32) -> (&'static str, &'static str) {
        let stride = u32::try_from(self.first_names.len()).unwrap_or(u32::MAX);
        let first = pick(self.first_names, key);
        let last = pick(self.last_names, key / stride.max(1));
        (first, last)
    }

    /// Selects the company for a fingerprint.
    #[must_use]
    pub fn company(&self, key: u32) -> &'static str {
        pick(self.companies, key)
    }
}

impl Default for IdentityCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Selects `pool[key % pool.len()]`.
fn pick(pool: &'static [&'static str], key: u32) -> &'static str {
    let key = usize::try_from(key).unwrap_or(usize::MAX);
    pool.get(key % pool.len().max(1)).copied().unwrap_or_default()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
