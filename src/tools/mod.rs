//! Tool Surface (C8): a stateless, named-operation dispatcher over the
//! entity/search/batch services (spec §4.8).
//!
//! Grounded on the teacher's "stateless free function over a
//! trait-object store" idiom (no async trait-object RPC framework is
//! introduced; the framing layer — stdio/HTTP — is out of scope per
//! spec §1). `dispatch` performs the five steps spec §4.8 names:
//! presence-check `workspace_id`, validate parameters, resolve the
//! workspace via [`crate::workspace::WorkspaceRegistry`], call the
//! matching service, and let [`crate::error::EngineError`] carry the
//! kind for the caller's envelope mapping (spec §7).

pub mod schema;

use serde_json::{json, Map, Value};

use crate::batch::{self, BatchItem};
use crate::entities::{context, custom_data, decision, link, pattern, progress};
use crate::error::{EngineError, Result, ValidationError};
use crate::search::{self, fts, SemanticSearchParams};
use crate::storage::ContextKind;
use crate::types::RowId;
use crate::workspace::WorkspaceRegistry;

/// The full tool catalog (spec §4.8/§6). Serializes to its canonical
/// snake_case name, matching the wire name every surface uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolName {
    GetProductContext,
    UpdateProductContext,
    GetActiveContext,
    UpdateActiveContext,
    LogDecision,
    GetDecisions,
    DeleteDecisionById,
    SearchDecisionsFts,
    LogProgress,
    GetProgress,
    UpdateProgress,
    DeleteProgressById,
    LogSystemPattern,
    GetSystemPatterns,
    DeleteSystemPatternById,
    LogCustomData,
    GetCustomData,
    DeleteCustomData,
    SearchCustomDataValueFts,
    SearchProjectGlossaryFts,
    LinkConportItems,
    GetLinkedItems,
    BatchLogItems,
    GetItemHistory,
    GetRecentActivitySummary,
    DiffContextVersions,
    SemanticSearchConport,
    ExportConportToMarkdown,
    ImportMarkdownToConport,
    GetConportSchema,
}

impl ToolName {
    pub const ALL: &'static [ToolName] = &[
        ToolName::GetProductContext,
        ToolName::UpdateProductContext,
        ToolName::GetActiveContext,
        ToolName::UpdateActiveContext,
        ToolName::LogDecision,
        ToolName::GetDecisions,
        ToolName::DeleteDecisionById,
        ToolName::SearchDecisionsFts,
        ToolName::LogProgress,
        ToolName::GetProgress,
        ToolName::UpdateProgress,
        ToolName::DeleteProgressById,
        ToolName::LogSystemPattern,
        ToolName::GetSystemPatterns,
        ToolName::DeleteSystemPatternById,
        ToolName::LogCustomData,
        ToolName::GetCustomData,
        ToolName::DeleteCustomData,
        ToolName::SearchCustomDataValueFts,
        ToolName::SearchProjectGlossaryFts,
        ToolName::LinkConportItems,
        ToolName::GetLinkedItems,
        ToolName::BatchLogItems,
        ToolName::GetItemHistory,
        ToolName::GetRecentActivitySummary,
        ToolName::DiffContextVersions,
        ToolName::SemanticSearchConport,
        ToolName::ExportConportToMarkdown,
        ToolName::ImportMarkdownToConport,
        ToolName::GetConportSchema,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ToolName::GetProductContext => "get_product_context",
            ToolName::UpdateProductContext => "update_product_context",
            ToolName::GetActiveContext => "get_active_context",
            ToolName::UpdateActiveContext => "update_active_context",
            ToolName::LogDecision => "log_decision",
            ToolName::GetDecisions => "get_decisions",
            ToolName::DeleteDecisionById => "delete_decision_by_id",
            ToolName::SearchDecisionsFts => "search_decisions_fts",
            ToolName::LogProgress => "log_progress",
            ToolName::GetProgress => "get_progress",
            ToolName::UpdateProgress => "update_progress",
            ToolName::DeleteProgressById => "delete_progress_by_id",
            ToolName::LogSystemPattern => "log_system_pattern",
            ToolName::GetSystemPatterns => "get_system_patterns",
            ToolName::DeleteSystemPatternById => "delete_system_pattern_by_id",
            ToolName::LogCustomData => "log_custom_data",
            ToolName::GetCustomData => "get_custom_data",
            ToolName::DeleteCustomData => "delete_custom_data",
            ToolName::SearchCustomDataValueFts => "search_custom_data_value_fts",
            ToolName::SearchProjectGlossaryFts => "search_project_glossary_fts",
            ToolName::LinkConportItems => "link_conport_items",
            ToolName::GetLinkedItems => "get_linked_items",
            ToolName::BatchLogItems => "batch_log_items",
            ToolName::GetItemHistory => "get_item_history",
            ToolName::GetRecentActivitySummary => "get_recent_activity_summary",
            ToolName::DiffContextVersions => "diff_context_versions",
            ToolName::SemanticSearchConport => "semantic_search_conport",
            ToolName::ExportConportToMarkdown => "export_conport_to_markdown",
            ToolName::ImportMarkdownToConport => "import_markdown_to_conport",
            ToolName::GetConportSchema => "get_conport_schema",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---- argument extraction helpers --------------------------------------

fn as_object(args: &Value) -> Result<&Map<String, Value>> {
    args.as_object()
        .ok_or_else(|| ValidationError::invalid_field("args", "expected a JSON object").into())
}

fn require_str(args: &Map<String, Value>, field: &'static str) -> Result<String> {
    args.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ValidationError::required_field(field).into())
}

fn opt_str(args: &Map<String, Value>, field: &str) -> Option<String> {
    args.get(field).and_then(Value::as_str).map(str::to_string)
}

fn opt_str_vec(args: &Map<String, Value>, field: &str) -> Option<Vec<String>> {
    args.get(field).and_then(Value::as_array).map(|items| {
        items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
    })
}

fn require_row_id(args: &Map<String, Value>, field: &'static str) -> Result<RowId> {
    args.get(field)
        .and_then(Value::as_u64)
        .map(RowId::new)
        .ok_or_else(|| ValidationError::required_field(field).into())
}

fn opt_row_id(args: &Map<String, Value>, field: &str) -> Option<RowId> {
    args.get(field).and_then(Value::as_u64).map(RowId::new)
}

fn opt_usize(args: &Map<String, Value>, field: &str) -> Option<usize> {
    args.get(field).and_then(Value::as_u64).map(|v| v as usize)
}

fn opt_u64(args: &Map<String, Value>, field: &str) -> Option<u64> {
    args.get(field).and_then(Value::as_u64)
}

fn opt_i64(args: &Map<String, Value>, field: &str) -> Option<i64> {
    args.get(field).and_then(Value::as_i64)
}

fn opt_object(args: &Map<String, Value>, field: &str) -> Option<crate::types::JsonMap> {
    args.get(field).and_then(Value::as_object).cloned()
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("engine row types are always JSON-serializable")
}

fn parse_context_kind(item_type: &str) -> Result<ContextKind> {
    match item_type {
        "product_context" => Ok(ContextKind::Product),
        "active_context" => Ok(ContextKind::Active),
        other => Err(ValidationError::invalid_field("item_type", format!("unknown context type '{other}'")).into()),
    }
}

/// Dispatches one tool call. Performs spec §4.8's five steps: presence
/// check on `workspace_id`, parameter validation, workspace resolution,
/// dispatch to the matching service, and error propagation (the caller
/// maps [`EngineError::kind`] to its own wire envelope).
pub fn dispatch(registry: &WorkspaceRegistry, tool: ToolName, args: Value) -> Result<Value> {
    if tool == ToolName::GetConportSchema {
        return Ok(schema::catalog());
    }

    let args = as_object(&args)?;
    let workspace_id = require_str(args, "workspace_id")?;
    let workspace = registry.acquire(workspace_id)?;

    match tool {
        ToolName::GetConportSchema => unreachable!("handled above"),

        ToolName::GetProductContext => Ok(Value::Object(context::get(workspace.storage(), ContextKind::Product)?)),
        ToolName::GetActiveContext => Ok(Value::Object(context::get(workspace.storage(), ContextKind::Active)?)),

        ToolName::UpdateProductContext | ToolName::UpdateActiveContext => {
            let kind = if tool == ToolName::UpdateProductContext {
                ContextKind::Product
            } else {
                ContextKind::Active
            };
            let content = opt_object(args, "content");
            let patch_content = opt_object(args, "patch_content");
            let change_source = opt_str(args, "change_source");
            let updated = context::update(workspace.storage(), kind, content, patch_content, change_source)?;
            Ok(Value::Object(updated))
        }

        ToolName::LogDecision => {
            let summary = require_str(args, "summary")?;
            let rationale = opt_str(args, "rationale");
            let implementation_details = opt_str(args, "implementation_details");
            let tags = opt_str_vec(args, "tags").unwrap_or_default();
            let row = decision::create(&workspace, summary, rationale, implementation_details, tags)?;
            Ok(to_value(&row))
        }
        ToolName::GetDecisions => {
            let limit = opt_usize(args, "limit");
            let tags_filter = opt_str_vec(args, "tags_filter");
            let rows = decision::list(&workspace, limit, tags_filter.as_deref())?;
            Ok(to_value(&rows))
        }
        ToolName::DeleteDecisionById => {
            decision::delete(&workspace, require_row_id(args, "decision_id")?)?;
            Ok(json!({"deleted": true}))
        }
        ToolName::SearchDecisionsFts => {
            let query = require_str(args, "query_text")?;
            let limit = opt_usize(args, "limit").unwrap_or(decision::DEFAULT_LIMIT);
            let rows = workspace.storage().list_decisions(None, None)?;
            Ok(to_value(&fts::search_decisions(rows, &query, limit)))
        }

        ToolName::LogProgress => {
            let status = require_str(args, "status")?;
            let description = require_str(args, "description")?;
            let parent_id = opt_row_id(args, "parent_id");
            let row = progress::create(&workspace, status, description, parent_id)?;
            Ok(to_value(&row))
        }
        ToolName::GetProgress => {
            let limit = opt_usize(args, "limit");
            let status_filter = opt_str(args, "status_filter");
            let parent_id_filter = opt_row_id(args, "parent_id_filter");
            let rows = progress::list(&workspace, limit, status_filter.as_deref(), parent_id_filter)?;
            Ok(to_value(&rows))
        }
        ToolName::UpdateProgress => {
            let id = require_row_id(args, "progress_id")?;
            let status = opt_str(args, "status");
            let description = opt_str(args, "description");
            let parent_id = if args.contains_key("parent_id") {
                Some(opt_row_id(args, "parent_id"))
            } else {
                None
            };
            let row = progress::update(&workspace, id, status, description, parent_id)?;
            Ok(to_value(&row))
        }
        ToolName::DeleteProgressById => {
            progress::delete(&workspace, require_row_id(args, "progress_id")?)?;
            Ok(json!({"deleted": true}))
        }

        ToolName::LogSystemPattern => {
            let name = require_str(args, "name")?;
            let description = opt_str(args, "description");
            let tags = opt_str_vec(args, "tags").unwrap_or_default();
            let row = pattern::create(&workspace, name, description, tags)?;
            Ok(to_value(&row))
        }
        ToolName::GetSystemPatterns => {
            let rows = pattern::list(&workspace, opt_usize(args, "limit"))?;
            Ok(to_value(&rows))
        }
        ToolName::DeleteSystemPatternById => {
            pattern::delete(&workspace, require_row_id(args, "pattern_id")?)?;
            Ok(json!({"deleted": true}))
        }

        ToolName::LogCustomData => {
            let category = require_str(args, "category")?;
            let key = require_str(args, "key")?;
            let value = args.get("value").cloned().ok_or_else(|| ValidationError::required_field("value"))?;
            let row = custom_data::upsert(&workspace, category, key, value)?;
            Ok(to_value(&row))
        }
        ToolName::GetCustomData => {
            let category = require_str(args, "category")?;
            let key = require_str(args, "key")?;
            Ok(to_value(&custom_data::get(&workspace, &category, &key)?))
        }
        ToolName::DeleteCustomData => {
            let category = require_str(args, "category")?;
            let key = require_str(args, "key")?;
            custom_data::delete(&workspace, &category, &key)?;
            Ok(json!({"deleted": true}))
        }
        ToolName::SearchCustomDataValueFts => {
            let query = require_str(args, "query_text")?;
            let limit = opt_usize(args, "limit").unwrap_or(100);
            let category_filter = opt_str(args, "category_filter");
            let rows = workspace.storage().list_custom_data(category_filter.as_deref())?;
            Ok(to_value(&fts::search_custom_data(rows, &query, limit)))
        }
        ToolName::SearchProjectGlossaryFts => {
            let query = require_str(args, "query_text")?;
            let limit = opt_usize(args, "limit").unwrap_or(100);
            let rows = workspace.storage().list_custom_data(Some("ProjectGlossary"))?;
            Ok(to_value(&fts::search_custom_data(rows, &query, limit)))
        }

        ToolName::LinkConportItems => {
            let row = link::create(
                &workspace,
                require_str(args, "source_item_type")?,
                require_str(args, "source_item_id")?,
                require_str(args, "target_item_type")?,
                require_str(args, "target_item_id")?,
                require_str(args, "relationship_type")?,
                opt_str(args, "description"),
            )?;
            Ok(to_value(&row))
        }
        ToolName::GetLinkedItems => {
            let item_type = require_str(args, "item_type")?;
            let item_id = require_str(args, "item_id")?;
            let limit = opt_usize(args, "limit");
            let rows = link::list_for_item(&workspace, &item_type, &item_id, limit)?;
            Ok(to_value(&rows))
        }

        ToolName::BatchLogItems => {
            let item_type = require_str(args, "item_type")?;
            let items: Vec<BatchItem> = args
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| ValidationError::required_field("items"))?
                .iter()
                .map(|v| BatchItem { data: v.clone() })
                .collect();
            let result = batch::batch_log_items(&workspace, &item_type, items)?;
            Ok(to_value(&result))
        }
        ToolName::GetItemHistory => {
            let item_type = require_str(args, "item_type")?;
            let kind = parse_context_kind(&item_type)?;
            let limit = opt_usize(args, "limit");
            let version = opt_u64(args, "version");
            let rows = context::list_history(workspace.storage(), kind, limit, version)?;
            Ok(to_value(&rows))
        }
        ToolName::GetRecentActivitySummary => {
            let since = opt_i64(args, "since_millis").map(crate::types::Timestamp::from_millis);
            let hours_ago = opt_i64(args, "hours_ago");
            let limit = opt_usize(args, "limit").unwrap_or(registry.config().default_recent_activity_limit);
            let activity = batch::recent_activity(&workspace, since, hours_ago, limit)?;
            Ok(to_value(&activity))
        }
        ToolName::DiffContextVersions => {
            let item_type = require_str(args, "item_type")?;
            let version_a = args.get("version_a").and_then(Value::as_u64).ok_or_else(|| ValidationError::required_field("version_a"))?;
            let version_b = args.get("version_b").and_then(Value::as_u64).ok_or_else(|| ValidationError::required_field("version_b"))?;
            let diff = batch::diff_context_versions(&workspace, &item_type, version_a, version_b)?;
            Ok(to_value(&diff))
        }

        ToolName::SemanticSearchConport => {
            let params = SemanticSearchParams {
                query_text: require_str(args, "query_text")?,
                top_k: opt_usize(args, "top_k").unwrap_or(search::DEFAULT_TOP_K),
                item_types: opt_str_vec(args, "filter_item_types"),
                custom_data_categories: opt_str_vec(args, "filter_custom_data_categories"),
                tags_all: opt_str_vec(args, "filter_tags_include_all"),
                tags_any: opt_str_vec(args, "filter_tags_include_any"),
            };
            let hits = search::semantic_search(&workspace, &params)?;
            Ok(to_value(&hits))
        }

        ToolName::ExportConportToMarkdown => {
            let out_dir = opt_str(args, "out_dir").unwrap_or_else(|| "conport_export".to_string());
            crate::importexport::export(&workspace, std::path::Path::new(&out_dir))?;
            Ok(json!({"exported": true}))
        }
        ToolName::ImportMarkdownToConport => {
            let in_dir = opt_str(args, "in_dir").unwrap_or_else(|| "conport_export".to_string());
            let result = crate::importexport::import(&workspace, std::path::Path::new(&in_dir))?;
            Ok(to_value(&result))
        }
    }
}

impl PartialEq<&str> for ToolName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_name_round_trips_through_its_wire_string() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(*tool));
        }
    }

    #[test]
    fn dispatch_requires_workspace_id() {
        let registry = WorkspaceRegistry::with_default_embedding(crate::config::EngineConfig::default());
        let err = dispatch(&registry, ToolName::GetProductContext, json!({})).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn dispatch_log_and_get_decision_round_trips() {
        use crate::entities::test_support::FixedEmbedding;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::EngineConfig {
            embedding_dimension: crate::config::EmbeddingDimension::Custom(8),
            ..crate::config::EngineConfig::default()
        };
        let registry = WorkspaceRegistry::new(config, Arc::new(FixedEmbedding));
        let workspace_id = dir.path().to_string_lossy().to_string();

        let created = dispatch(
            &registry,
            ToolName::LogDecision,
            json!({"workspace_id": workspace_id, "summary": "Use postgres", "tags": ["db"]}),
        )
        .unwrap();
        assert_eq!(created["summary"], "Use postgres");

        let listed = dispatch(
            &registry,
            ToolName::GetDecisions,
            json!({"workspace_id": workspace_id}),
        )
        .unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[test]
    fn get_conport_schema_never_touches_a_workspace() {
        let registry = WorkspaceRegistry::with_default_embedding(crate::config::EngineConfig::default());
        let result = dispatch(&registry, ToolName::GetConportSchema, json!({})).unwrap();
        assert!(result.as_object().unwrap().contains_key("log_decision"));
    }
}
