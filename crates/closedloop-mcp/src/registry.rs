// crates/closedloop-mcp/src/registry.rs
// ============================================================================
// Module: Tool Registry
// Description: Canonical tool names, argument constraints, and MCP schemas.
// Purpose: Declare the tool surface and validate untyped tool arguments.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The registry is a closed set of [`ToolName`] variants, each with a fixed
//! list of [`ArgSpec`] constraints. JSON input schemas are generated from the
//! same constraints that drive validation, so the advertised schema and the
//! enforced rules cannot drift apart.
//!
//! ## Invariants
//! - Tool order, descriptions, and schemas are stable for the process lifetime.
//! - Validation checks presence, JSON type, and integer ranges
//!   only; there is no cross-field validation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Canonical tool names exposed to agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Paginated, filterable insight listing.
    ListInsights,
    /// Single insight lookup by identifier.
    GetInsightDetail,
    /// Full-text insight search.
    SearchInsights,
    /// Aggregated planning context for a topic.
    GetPlanningContext,
}

impl ToolName {
    /// Returns the canonical string name for the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListInsights => "list_insights",
            Self::GetInsightDetail => "get_insight_detail",
            Self::SearchInsights => "search_insights",
            Self::GetPlanningContext => "get_planning_context",
        }
    }

    /// Returns all tool names in canonical order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ListInsights,
            Self::GetInsightDetail,
            Self::SearchInsights,
            Self::GetPlanningContext,
        ]
    }

    /// Parses a tool name from its string representation.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "list_insights" => Some(Self::ListInsights),
            "get_insight_detail" => Some(Self::GetInsightDetail),
            "search_insights" => Some(Self::SearchInsights),
            "get_planning_context" => Some(Self::GetPlanningContext),
            _ => None,
        }
    }

    /// Returns the human-readable tool description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ListInsights => {
                "Retrieve customer insights with optional filtering, sorting, and pagination"
            }
            Self::GetInsightDetail => "Get detailed information about a specific insight item",
            Self::SearchInsights => {
                "Full-text search across customer insights with optional filters"
            }
            Self::GetPlanningContext => {
                "Retrieve recurring patterns, related insights, and business impact signals \
                 (affected deals, churn risk) for a product planning topic"
            }
        }
    }

    /// Returns the declared argument constraints.
    #[must_use]
    pub const fn arg_specs(self) -> &'static [ArgSpec] {
        match self {
            Self::ListInsights => LIST_INSIGHTS_ARGS,
            Self::GetInsightDetail => GET_INSIGHT_DETAIL_ARGS,
            Self::SearchInsights => SEARCH_INSIGHTS_ARGS,
            Self::GetPlanningContext => GET_PLANNING_CONTEXT_ARGS,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Argument Constraints
// ============================================================================

/// JSON type accepted for an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// JSON string.
    String,
    /// JSON integer.
    Integer,
    /// JSON array of strings.
    StringArray,
}

/// Default value advertised in the input schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgDefault {
    /// Integer default.
    Integer(i64),
    /// String default.
    Text(&'static str),
}

/// Constraint set for a single tool argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    /// Argument name.
    pub name: &'static str,
    /// Accepted JSON type.
    pub kind: ArgKind,
    /// Description shown to agents.
    pub description: &'static str,
    /// Whether the argument must be present.
    pub required: bool,
    /// Inclusive integer lower bound.
    pub minimum: Option<i64>,
    /// Inclusive integer upper bound.
    pub maximum: Option<i64>,
    /// Advertised default.
    pub default: Option<ArgDefault>,
    /// JSON schema `format` hint.
    pub format: Option<&'static str>,
}

impl ArgSpec {
    /// Declares an optional argument of `kind`.
    const fn new(name: &'static str, kind: ArgKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
            minimum: None,
            maximum: None,
            default: None,
            format: None,
        }
    }

    /// Declares an optional string argument.
    const fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ArgKind::String, description)
    }

    /// Declares an optional integer argument.
    const fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ArgKind::Integer, description)
    }

    /// Declares an optional string-array argument.
    const fn strings(name: &'static str, description: &'static str) -> Self {
        Self::new(name, ArgKind::StringArray, description)
    }

    /// Marks the argument as required.
    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets inclusive integer bounds.
    const fn range(mut self, minimum: Option<i64>, maximum: Option<i64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    /// Sets the advertised default.
    const fn default_value(mut self, value: ArgDefault) -> Self {
        self.default = Some(value);
        self
    }

    /// Marks the argument as a `YYYY-MM-DD` date.
    const fn date(mut self) -> Self {
        self.format = Some("date");
        self
    }

    /// Renders the JSON schema for this argument.
    fn schema(&self) -> Value {
        let mut schema = Map::new();
        match self.kind {
            ArgKind::String => {
                schema.insert("type".to_string(), json!("string"));
            }
            ArgKind::Integer => {
                schema.insert("type".to_string(), json!("integer"));
            }
            ArgKind::StringArray => {
                schema.insert("type".to_string(), json!("array"));
                schema.insert("items".to_string(), json!({"type": "string"}));
            }
        }
        schema.insert("description".to_string(), json!(self.description));
        if let Some(format) = self.format {
            schema.insert("format".to_string(), json!(format));
        }
        if let Some(minimum) = self.minimum {
            schema.insert("minimum".to_string(), json!(minimum));
        }
        if let Some(maximum) = self.maximum {
            schema.insert("maximum".to_string(), json!(maximum));
        }
        match self.default {
            Some(ArgDefault::Integer(value)) => {
                schema.insert("default".to_string(), json!(value));
            }
            Some(ArgDefault::Text(value)) => {
                schema.insert("default".to_string(), json!(value));
            }
            None => {}
        }
        Value::Object(schema)
    }
}

/// Arguments for `list_insights`.
const LIST_INSIGHTS_ARGS: &[ArgSpec] = &[
    ArgSpec::string("date_from", "Start date for insights (YYYY-MM-DD)").date(),
    ArgSpec::string("date_to", "End date for insights (YYYY-MM-DD)").date(),
    ArgSpec::string("severity", "Only return insights with this severity"),
    ArgSpec::string("status", "Only return insights with this workflow status"),
    ArgSpec::string("source_id", "Only return insights from this feedback source"),
    ArgSpec::string("tag", "Only return insights carrying this tag"),
    ArgSpec::string("sort_by", "Field to sort by")
        .default_value(ArgDefault::Text("created_at")),
    ArgSpec::string("sort_order", "Sort direction (asc or desc)")
        .default_value(ArgDefault::Text("desc")),
    ArgSpec::integer("page", "Page number (default: 1)")
        .range(Some(1), None)
        .default_value(ArgDefault::Integer(1)),
    ArgSpec::integer("limit", "Insight items per page (default: 20, max: 100)")
        .range(Some(1), Some(100))
        .default_value(ArgDefault::Integer(20)),
];

/// Arguments for `get_insight_detail`.
const GET_INSIGHT_DETAIL_ARGS: &[ArgSpec] =
    &[ArgSpec::string("insight_id", "UUID of the insight item").required()];

/// Arguments for `search_insights`.
const SEARCH_INSIGHTS_ARGS: &[ArgSpec] = &[
    ArgSpec::string("query", "Search text").required(),
    ArgSpec::strings("fields", "Insight fields to search (default: all)"),
    ArgSpec::string("date_from", "Start date for insights (YYYY-MM-DD)").date(),
    ArgSpec::string("date_to", "End date for insights (YYYY-MM-DD)").date(),
    ArgSpec::string("severity", "Only return insights with this severity"),
    ArgSpec::string("category", "Only return insights in this category"),
    ArgSpec::string("source", "Only return insights from this source"),
    ArgSpec::integer("page", "Page number (default: 1)")
        .range(Some(1), None)
        .default_value(ArgDefault::Integer(1)),
    ArgSpec::integer("limit", "Results per page (default: 20, max: 100)")
        .range(Some(1), Some(100))
        .default_value(ArgDefault::Integer(20)),
];

/// Arguments for `get_planning_context`.
const GET_PLANNING_CONTEXT_ARGS: &[ArgSpec] = &[
    ArgSpec::string("query", "Product area or feature to plan around").required(),
    ArgSpec::integer("limit_patterns", "Maximum patterns to return (default: 10, max: 50)")
        .range(Some(1), Some(50))
        .default_value(ArgDefault::Integer(10)),
    ArgSpec::integer("limit_insights", "Maximum insights to return (default: 20, max: 100)")
        .range(Some(1), Some(100))
        .default_value(ArgDefault::Integer(20)),
];

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Tool definition shape used by MCP tool listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDefinition {
    /// MCP tool name.
    pub name: ToolName,
    /// Tool description for clients.
    pub description: String,
    /// JSON schema for tool input.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Builds the definition for `tool`.
    #[must_use]
    pub fn for_tool(tool: ToolName) -> Self {
        Self {
            name: tool,
            description: tool.description().to_string(),
            input_schema: input_schema(tool),
        }
    }
}

/// Returns the canonical tool definitions in registry order.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    ToolName::all().iter().copied().map(ToolDefinition::for_tool).collect()
}

/// Builds the JSON input schema for `tool`.
#[must_use]
pub fn input_schema(tool: ToolName) -> Value {
    let specs = tool.arg_specs();
    let properties: Map<String, Value> =
        specs.iter().map(|spec| (spec.name.to_string(), spec.schema())).collect();
    let required: Vec<&str> =
        specs.iter().filter(|spec| spec.required).map(|spec| spec.name).collect();
    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    Value::Object(schema)
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Argument validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// A required argument is absent.
    Missing(&'static str),
    /// An argument is present but violates its constraints.
    Invalid {
        /// Argument name (or `arguments` for the whole map).
        name: &'static str,
        /// Violation description.
        reason: String,
    },
}

/// Validates `arguments` against the constraints of `tool`.
///
/// Returns only declared arguments that are present and non-null, in
/// declaration order. Undeclared arguments are dropped. A `null` argument map
/// is treated as empty. Required string arguments must be non-blank.
///
/// # Errors
///
/// Returns [`ArgumentError`] for missing or malformed arguments.
pub fn validate_arguments(
    tool: ToolName,
    arguments: &Value,
) -> Result<Map<String, Value>, ArgumentError> {
    let empty = Map::new();
    let provided = match arguments {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => {
            return Err(ArgumentError::Invalid {
                name: "arguments",
                reason: "must be an object".to_string(),
            });
        }
    };
    let mut accepted = Map::new();
    for spec in tool.arg_specs() {
        match provided.get(spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    return Err(ArgumentError::Missing(spec.name));
                }
            }
            Some(value) => {
                let normalized = check_value(spec, value)?;
                accepted.insert(spec.name.to_string(), normalized);
            }
        }
    }
    Ok(accepted)
}

/// Checks a present argument value against its `ArgSpec` and returns the value to
/// forward. Integral floats are normalized to integers.
fn check_value(spec: &ArgSpec, value: &Value) -> Result<Value, ArgumentError> {
    let invalid = |reason: String| ArgumentError::Invalid {
        name: spec.name,
        reason,
    };
    match spec.kind {
        ArgKind::String => {
            let Some(text) = value.as_str() else {
                return Err(invalid("must be a string".to_string()));
            };
            if spec.required && text.trim().is_empty() {
                return Err(ArgumentError::Missing(spec.name));
            }
            Ok(value.clone())
        }
        ArgKind::Integer => {
            let Some(number) = as_integer(value) else {
                return Err(invalid("must be an integer".to_string()));
            };
            if let Some(minimum) = spec.minimum
                && number < minimum
            {
                return Err(invalid(format!("must be >= {minimum}")));
            }
            if let Some(maximum) = spec.maximum
                && number > maximum
            {
                return Err(invalid(format!("must be <= {maximum}")));
            }
            Ok(Value::from(number))
        }
        ArgKind::StringArray => {
            let Some(items) = value.as_array() else {
                return Err(invalid("must be an array of strings".to_string()));
            };
            if !items.iter().all(Value::is_string) {
                return Err(invalid("must be an array of strings".to_string()));
            }
            Ok(value.clone())
        }
    }
}

/// Reads a JSON number as an integer, accepting integral floats such as `2.0`.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(number) = value.as_i64() {
        return Some(number);
    }
    let float = value.as_f64()?;
    if float.fract() != 0.0 || !float.is_finite() {
        return None;
    }
    format!("{float:.0}").parse().ok()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use serde_json::json;

    use super::ArgumentError;
    use super::ToolName;
    use super::input_schema;
    use super::tool_definitions;
    use super::validate_arguments;

    #[test]
    fn names_round_trip_through_parse() {
        for tool in ToolName::all() {
            assert_eq!(ToolName::parse(tool.as_str()), Some(*tool));
        }
        assert_eq!(ToolName::parse("delete_insight"), None);
        assert_eq!(ToolName::parse("LIST_INSIGHTS"), None);
    }

    #[test]
    fn definitions_serialize_with_mcp_field_names() {
        let definitions = tool_definitions();
        let names: Vec<&str> = definitions.iter().map(|tool| tool.name.as_str()).collect();
        assert_eq!(
            names,
            ["list_insights", "get_insight_detail", "search_insights", "get_planning_context"]
        );
        let value = serde_json::to_value(&definitions[1]).unwrap();
        assert_eq!(value["name"], json!("get_insight_detail"));
        assert_eq!(value["inputSchema"]["required"], json!(["insight_id"]));
        assert_eq!(value["inputSchema"]["properties"]["insight_id"]["type"], json!("string"));
    }

    #[test]
    fn listing_schema_carries_bounds_and_defaults() {
        let schema = input_schema(ToolName::ListInsights);
        let limit = &schema["properties"]["limit"];
        assert_eq!(limit["minimum"], json!(1));
        assert_eq!(limit["maximum"], json!(100));
        assert_eq!(limit["default"], json!(20));
        assert_eq!(schema["properties"]["date_from"]["format"], json!("date"));
        assert_eq!(schema["properties"]["sort_order"]["default"], json!("desc"));
        assert!(schema["properties"]["sort_order"].get("enum").is_none());
        assert!(schema["properties"]["severity"].get("enum").is_none());
        assert!(schema.get("required").is_none());
    }

    #[test]
    fn missing_required_arguments_are_reported() {
        assert_eq!(
            validate_arguments(ToolName::GetInsightDetail, &json!({})),
            Err(ArgumentError::Missing("insight_id"))
        );
        assert_eq!(
            validate_arguments(ToolName::GetInsightDetail, &json!({"insight_id": null})),
            Err(ArgumentError::Missing("insight_id"))
        );
        assert_eq!(
            validate_arguments(ToolName::SearchInsights, &json!({"query": "  "})),
            Err(ArgumentError::Missing("query"))
        );
        assert_eq!(
            validate_arguments(ToolName::GetPlanningContext, &json!(null)),
            Err(ArgumentError::Missing("query"))
        );
    }

    #[test]
    fn type_and_range_violations_are_invalid() {
        let cases = [
            (ToolName::ListInsights, json!({"limit": 0})),
            (ToolName::ListInsights, json!({"limit": 101})),
            (ToolName::ListInsights, json!({"page": "two"})),
            (ToolName::ListInsights, json!({"severity": 3})),
            (ToolName::SearchInsights, json!({"query": "x", "fields": ["title", 2]})),
            (ToolName::SearchInsights, json!({"query": "x", "fields": "title"})),
            (ToolName::SearchInsights, json!({"query": 7})),
            (ToolName::GetPlanningContext, json!({"query": "x", "limit_patterns": 1.5})),
            (ToolName::ListInsights, json!(["not", "an", "object"])),
        ];
        for (tool, arguments) in cases {
            let result = validate_arguments(tool, &arguments);
            assert!(matches!(result, Err(ArgumentError::Invalid { .. })), "{tool}: {arguments}");
        }
    }

    #[test]
    fn free_form_strings_pass_through_unchanged() {
        let accepted = validate_arguments(
            ToolName::ListInsights,
            &json!({"severity": "urgent", "sort_by": "priority", "sort_order": "newest"}),
        )
        .unwrap();
        assert_eq!(accepted["severity"], json!("urgent"));
        assert_eq!(accepted["sort_by"], json!("priority"));
        assert_eq!(accepted["sort_order"], json!("newest"));

        let accepted = validate_arguments(
            ToolName::SearchInsights,
            &json!({"query": "x", "fields": ["customer_name"]}),
        )
        .unwrap();
        assert_eq!(accepted["fields"], json!(["customer_name"]));
    }

    #[test]
    fn undeclared_arguments_are_dropped() {
        let accepted = validate_arguments(
            ToolName::ListInsights,
            &json!({"limit": 10.0, "severity": "high", "debug": true, "tag": null}),
        )
        .unwrap();
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted["limit"], json!(10));
        assert_eq!(accepted["severity"], json!("high"));
        assert!(accepted.get("debug").is_none());
        assert!(accepted.get("tag").is_none());
    }
}
