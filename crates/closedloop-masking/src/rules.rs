// crates/closedloop-masking/src/rules.rs
// ============================================================================
// Module: Masking Rules
// Description: Declarative field paths for PII inside backend documents.
// Purpose: Describe where identifiers live without per-shape branching.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! A [`MaskRule`] pairs a field path with the kind of masking applied at the
//! leaf. One generic walker ([`walk`]) resolves paths against a document; a
//! path that does not match the document shape is simply skipped, so the rule
//! table doubles as the shape detector.
//!
//! The table is an allow-list. Fields outside it pass through unchanged, in
//! particular the `integrations` / `entities_integrations` fields of insight
//! records, which carry vendor names rather than personal data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// SECTION: Rule Types
// ============================================================================

/// A single step in a rule path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Descend into the named object member when present.
    Field(&'static str),
    /// Visit every element of an array.
    Each,
}

/// Masking applied to the value a rule path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskKind {
    /// Customer identifier: email when it contains `@`, otherwise a name.
    Customer,
    /// Company or CRM deal name.
    Company,
}

/// Declarative masking rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskRule {
    /// Stable label used in tests and diagnostics.
    pub label: &'static str,
    /// Path from the document root to the masked leaf.
    pub path: &'static [Segment],
    /// Masking applied at the leaf.
    pub kind: MaskKind,
}

// ============================================================================
// SECTION: Default Rule Set
// ============================================================================

/// Rules covering every known backend response shape.
///
/// - `detail.customer_name`: single insight at the root (`get_insight_detail`).
/// - `items.customer_name`: insight listings (`list_insights`, `search_insights`).
/// - `context.*`: planning context documents (`get_planning_context`).
pub const DEFAULT_RULES: &[MaskRule] = &[
    MaskRule {
        label: "detail.customer_name",
        path: &[Segment::Field("customer_name")],
        kind: MaskKind::Customer,
    },
    MaskRule {
        label: "items.customer_name",
        path: &[Segment::Field("items"), Segment::Each, Segment::Field("customer_name")],
        kind: MaskKind::Customer,
    },
    MaskRule {
        label: "context.insights.customer_name",
        path: &[
            Segment::Field("data"),
            Segment::Field("insights"),
            Segment::Each,
            Segment::Field("customer_name"),
        ],
        kind: MaskKind::Customer,
    },
    MaskRule {
        label: "context.patterns.customers",
        path: &[
            Segment::Field("data"),
            Segment::Field("patterns"),
            Segment::Each,
            Segment::Field("customers"),
            Segment::Each,
        ],
        kind: MaskKind::Customer,
    },
    MaskRule {
        label: "context.patterns.crm_deals",
        path: &[
            Segment::Field("data"),
            Segment::Field("patterns"),
            Segment::Each,
            Segment::Field("crm_deals"),
            Segment::Each,
        ],
        kind: MaskKind::Company,
    },
    MaskRule {
        label: "context.summary.testing_candidates",
        path: &[
            Segment::Field("data"),
            Segment::Field("summary"),
            Segment::Field("testing_candidates"),
            Segment::Each,
        ],
        kind: MaskKind::Customer,
    },
];

// ============================================================================
// SECTION: Walker
// ============================================================================

/// Resolves `path` against `node` and calls `visit` on every matching leaf.
///
/// Missing members and type mismatches end the walk for that branch.
pub fn walk<F>(node: &mut Value, path: &[Segment], visit: &mut F)
where
    F: FnMut(&mut Value),
{
    match path.split_first() {
        None => visit(node),
        Some((Segment::Field(name), rest)) => {
            if let Some(child) = node.as_object_mut().and_then(|map| map.get_mut(*name)) {
                walk(child, rest, visit);
            }
        }
        Some((Segment::Each, rest)) => {
            if let Some(items) = node.as_array_mut() {
                for item in items {
                    walk(item, rest, visit);
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use serde_json::json;

    use super::DEFAULT_RULES;
    use super::Segment;
    use super::walk;

    fn collect(document: &mut Value, path: &[Segment]) -> Vec<Value> {
        let mut seen = Vec::new();
        walk(document, path, &mut |leaf: &mut Value| seen.push(leaf.clone()));
        seen
    }

    #[test]
    fn walk_visits_nested_array_leaves() {
        let mut document = json!({
            "data": {"patterns": [{"customers": ["a", "b"]}, {"customers": ["c"]}]}
        });
        let path = [
            Segment::Field("data"),
            Segment::Field("patterns"),
            Segment::Each,
            Segment::Field("customers"),
            Segment::Each,
        ];
        assert_eq!(collect(&mut document, &path), vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn walk_skips_mismatched_shapes() {
        let mut document = json!({"items": {"customer_name": "not an array"}});
        let path = [Segment::Field("items"), Segment::Each, Segment::Field("customer_name")];
        assert!(collect(&mut document, &path).is_empty());
    }

    #[test]
    fn no_rule_targets_integrations() {
        for rule in DEFAULT_RULES {
            for segment in rule.path {
                if let Segment::Field(name) = segment {
                    assert!(!name.contains("integrations"), "rule {} touches {name}", rule.label);
                }
            }
        }
    }

    #[test]
    fn rule_labels_are_unique() {
        let mut labels: Vec<&str> = DEFAULT_RULES.iter().map(|rule| rule.label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), DEFAULT_RULES.len());
    }
}
