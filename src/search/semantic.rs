//! Semantic-search filter composition (spec §4.7).
//!
//! Translates the public `semantic_search_conport` tool parameters into a
//! [`FilterExpr`] tree, then hands it to [`crate::vector::HnswIndex::search_filtered_meta`].
//! Grounded on `original_source/.../services/vector_service.py`'s
//! `search(query, top_k, filters)`, which builds the same `$and`-of-conditions
//! shape from the same parameter set.

use crate::error::Result;
use crate::search::filter::FilterExpr;
use crate::vector::VectorHit;
use crate::workspace::WorkspaceHandle;

/// `semantic_search_conport`'s default `top_k` when the caller omits it
/// (spec §4.5 default limits table).
pub const DEFAULT_TOP_K: usize = 5;

/// `semantic_search_conport`'s `top_k` bounds; out-of-range values are
/// clamped rather than rejected (spec §4.7).
pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 25;

/// Parameters accepted by `semantic_search_conport`, pre-validation.
#[derive(Clone, Debug, Default)]
pub struct SemanticSearchParams {
    pub query_text: String,
    pub top_k: usize,
    pub item_types: Option<Vec<String>>,
    pub custom_data_categories: Option<Vec<String>>,
    pub tags_all: Option<Vec<String>>,
    pub tags_any: Option<Vec<String>>,
}

/// Embeds `params.query_text`, builds the composed filter, and runs the
/// nearest-neighbor search against `workspace`'s vector collection.
/// `top_k` is clamped into `[MIN_TOP_K, MAX_TOP_K]`; an empty collection
/// returns `[]`, never an error (spec §4.7 / §8 boundary behavior).
pub fn execute(workspace: &WorkspaceHandle, params: &SemanticSearchParams) -> Result<Vec<VectorHit>> {
    let top_k = params.top_k.clamp(MIN_TOP_K, MAX_TOP_K);
    let filter = build_filter(params);
    let query_embedding = workspace.embedding().embed(&params.query_text)?;
    let ef_search = workspace.vectors().ef_search().max(top_k);
    workspace
        .vectors()
        .search_filtered_meta(&query_embedding, top_k, ef_search, filter.as_ref())
}

/// Builds the composed filter expression for a search request, per
/// spec §4.7:
///
/// - `item_types` → `{"item_type": {"$in": [...]}}`
/// - `custom_data_categories` (only meaningful if `custom_data` is in
///   `item_types`) → `{"category": {"$in": [...]}}`
/// - `tags_all = [t1…]` → one `{"tags": {"$contains": ti}}` per tag
/// - `tags_any = [t1…]` → `{"$or": [{"tags": {"$contains": ti}}, …]}`
/// - all conditions are joined with a top-level `$and`
/// - if no conditions exist, returns `None` (a null filter)
pub fn build_filter(params: &SemanticSearchParams) -> Option<FilterExpr> {
    let mut conditions = Vec::new();

    if let Some(item_types) = &params.item_types {
        if !item_types.is_empty() {
            conditions.push(FilterExpr::in_list("item_type", item_types.clone()));
        }
    }

    if let Some(categories) = &params.custom_data_categories {
        if !categories.is_empty() {
            conditions.push(FilterExpr::in_list("category", categories.clone()));
        }
    }

    if let Some(tags_all) = &params.tags_all {
        for tag in tags_all {
            conditions.push(FilterExpr::contains("tags", tag.clone()));
        }
    }

    if let Some(tags_any) = &params.tags_any {
        if !tags_any.is_empty() {
            let any_of: Vec<FilterExpr> = tags_any
                .iter()
                .map(|t| FilterExpr::contains("tags", t.clone()))
                .collect();
            if let Some(expr) = FilterExpr::any(any_of) {
                conditions.push(expr);
            }
        }
    }

    FilterExpr::all(conditions)
}
