//! The semantic-search filter expression algebra (spec §4.3/§4.7).
//!
//! A small nested-JSON-shaped algebra over sanitized vector-store
//! metadata: `$in`, `$contains`, `$and`, `$or`. Grounded on the teacher's
//! `SearchFilter` (struct describing match criteria + a `matches()`
//! evaluator), generalized from a fixed struct-of-`Option`s into a
//! composable tree so callers can build exactly the expressions spec
//! §4.7 describes (`item_types`, `custom_data_categories`, `tags_all`,
//! `tags_any`) without the search layer inferring anything beyond what
//! was explicitly composed.

use crate::types::JsonMap;

/// A filter expression evaluated against one vector-store metadata map.
///
/// Composition is always explicit: [`FilterExpr::all`]/[`FilterExpr::any`]
/// build `$and`/`$or` nodes from whatever the caller passes; nothing is
/// implicitly conjoined beyond what a single [`crate::search::semantic::build_filter`]
/// call assembles (spec §4.7 "composition is explicit").
#[derive(Clone, Debug, PartialEq)]
pub enum FilterExpr {
    /// `{"$in": [...]}` — the metadata value at `key` (string) must equal
    /// one of `values`.
    In { key: String, values: Vec<String> },
    /// `{"$contains": value}` — the metadata value at `key` is a string
    /// (or array of strings, covering tag lists stored as JSON arrays)
    /// containing `value`.
    Contains { key: String, value: String },
    /// All sub-expressions must hold.
    And(Vec<FilterExpr>),
    /// At least one sub-expression must hold.
    Or(Vec<FilterExpr>),
}

impl FilterExpr {
    pub fn in_list(key: impl Into<String>, values: Vec<String>) -> Self {
        FilterExpr::In { key: key.into(), values }
    }

    pub fn contains(key: impl Into<String>, value: impl Into<String>) -> Self {
        FilterExpr::Contains { key: key.into(), value: value.into() }
    }

    /// Builds an `$and` of `exprs`, or `None` if `exprs` is empty — per
    /// spec §4.7, "if no conditions exist, pass a null filter."
    pub fn all(exprs: Vec<FilterExpr>) -> Option<FilterExpr> {
        match exprs.len() {
            0 => None,
            1 => exprs.into_iter().next(),
            _ => Some(FilterExpr::And(exprs)),
        }
    }

    /// Builds an `$or` of `exprs`, or `None` if empty.
    pub fn any(exprs: Vec<FilterExpr>) -> Option<FilterExpr> {
        match exprs.len() {
            0 => None,
            1 => exprs.into_iter().next(),
            _ => Some(FilterExpr::Or(exprs)),
        }
    }

    /// Evaluates this expression against a sanitized metadata map.
    pub fn matches(&self, metadata: &JsonMap) -> bool {
        match self {
            FilterExpr::In { key, values } => metadata
                .get(key)
                .and_then(|v| v.as_str())
                .is_some_and(|s| values.iter().any(|v| v == s)),
            FilterExpr::Contains { key, value } => match metadata.get(key) {
                Some(serde_json::Value::String(s)) => s.contains(value.as_str()),
                Some(serde_json::Value::Array(items)) => {
                    items.iter().any(|v| v.as_str() == Some(value.as_str()))
                }
                _ => false,
            },
            FilterExpr::And(exprs) => exprs.iter().all(|e| e.matches(metadata)),
            FilterExpr::Or(exprs) => exprs.iter().any(|e| e.matches(metadata)),
        }
    }
}
