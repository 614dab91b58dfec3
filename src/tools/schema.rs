//! `get_conport_schema` catalog (spec §4.8): a `tool_name -> json_schema`
//! mapping, one schema object per [`super::ToolName`], with the
//! internal-only `db`/session parameter every tool's python counterpart
//! takes (see `original_source/.../api/*.py`'s `db: Session =
//! Depends(get_db)`) omitted — this crate has no such parameter to begin
//! with, since [`super::dispatch`] takes the registry instead, but
//! `workspace_id` is a real wire parameter and stays.

use serde_json::{json, Value};

use super::ToolName;

/// Builds the full `tool_name -> json_schema` mapping. Built fresh per
/// call rather than cached in a `OnceLock`: the catalog is small and
/// `get_conport_schema` is not a hot path.
pub fn catalog() -> Value {
    let mut map = serde_json::Map::with_capacity(ToolName::ALL.len());
    for tool in ToolName::ALL {
        map.insert(tool.as_str().to_string(), schema_for(*tool));
    }
    Value::Object(map)
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn schema_for(tool: ToolName) -> Value {
    let workspace_id = json!({"workspace_id": {"type": "string"}});

    match tool {
        ToolName::GetProductContext | ToolName::GetActiveContext => {
            object_schema(workspace_id, &["workspace_id"])
        }

        ToolName::UpdateProductContext | ToolName::UpdateActiveContext => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "content": {"type": "object"},
                "patch_content": {"type": "object"},
                "change_source": {"type": "string"},
            }),
            &["workspace_id"],
        ),

        ToolName::LogDecision => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "summary": {"type": "string"},
                "rationale": {"type": "string"},
                "implementation_details": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}},
            }),
            &["workspace_id", "summary"],
        ),
        ToolName::GetDecisions => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "limit": {"type": "integer"},
                "tags_filter": {"type": "array", "items": {"type": "string"}},
            }),
            &["workspace_id"],
        ),
        ToolName::DeleteDecisionById => object_schema(
            json!({"workspace_id": {"type": "string"}, "decision_id": {"type": "integer"}}),
            &["workspace_id", "decision_id"],
        ),
        ToolName::SearchDecisionsFts => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "query_text": {"type": "string"},
                "limit": {"type": "integer"},
            }),
            &["workspace_id", "query_text"],
        ),

        ToolName::LogProgress => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "status": {"type": "string"},
                "description": {"type": "string"},
                "parent_id": {"type": "integer"},
            }),
            &["workspace_id", "status", "description"],
        ),
        ToolName::GetProgress => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "limit": {"type": "integer"},
                "status_filter": {"type": "string"},
                "parent_id_filter": {"type": "integer"},
            }),
            &["workspace_id"],
        ),
        ToolName::UpdateProgress => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "progress_id": {"type": "integer"},
                "status": {"type": "string"},
                "description": {"type": "string"},
                "parent_id": {"type": ["integer", "null"]},
            }),
            &["workspace_id", "progress_id"],
        ),
        ToolName::DeleteProgressById => object_schema(
            json!({"workspace_id": {"type": "string"}, "progress_id": {"type": "integer"}}),
            &["workspace_id", "progress_id"],
        ),

        ToolName::LogSystemPattern => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "name": {"type": "string"},
                "description": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}},
            }),
            &["workspace_id", "name"],
        ),
        ToolName::GetSystemPatterns => object_schema(
            json!({"workspace_id": {"type": "string"}, "limit": {"type": "integer"}}),
            &["workspace_id"],
        ),
        ToolName::DeleteSystemPatternById => object_schema(
            json!({"workspace_id": {"type": "string"}, "pattern_id": {"type": "integer"}}),
            &["workspace_id", "pattern_id"],
        ),

        ToolName::LogCustomData => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "category": {"type": "string"},
                "key": {"type": "string"},
                "value": {},
            }),
            &["workspace_id", "category", "key", "value"],
        ),
        ToolName::GetCustomData => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "category": {"type": "string"},
                "key": {"type": "string"},
            }),
            &["workspace_id", "category", "key"],
        ),
        ToolName::DeleteCustomData => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "category": {"type": "string"},
                "key": {"type": "string"},
            }),
            &["workspace_id", "category", "key"],
        ),
        ToolName::SearchCustomDataValueFts => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "query_text": {"type": "string"},
                "limit": {"type": "integer"},
                "category_filter": {"type": "string"},
            }),
            &["workspace_id", "query_text"],
        ),
        ToolName::SearchProjectGlossaryFts => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "query_text": {"type": "string"},
                "limit": {"type": "integer"},
            }),
            &["workspace_id", "query_text"],
        ),

        ToolName::LinkConportItems => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "source_item_type": {"type": "string"},
                "source_item_id": {"type": "string"},
                "target_item_type": {"type": "string"},
                "target_item_id": {"type": "string"},
                "relationship_type": {"type": "string"},
                "description": {"type": "string"},
            }),
            &[
                "workspace_id",
                "source_item_type",
                "source_item_id",
                "target_item_type",
                "target_item_id",
                "relationship_type",
            ],
        ),
        ToolName::GetLinkedItems => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "item_type": {"type": "string"},
                "item_id": {"type": "string"},
                "limit": {"type": "integer"},
            }),
            &["workspace_id", "item_type", "item_id"],
        ),

        ToolName::BatchLogItems => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "item_type": {"type": "string"},
                "items": {"type": "array", "items": {"type": "object"}},
            }),
            &["workspace_id", "item_type", "items"],
        ),
        ToolName::GetItemHistory => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "item_type": {"type": "string", "enum": ["product_context", "active_context"]},
                "limit": {"type": "integer"},
                "version": {"type": "integer"},
            }),
            &["workspace_id", "item_type"],
        ),
        ToolName::GetRecentActivitySummary => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "since_millis": {"type": "integer"},
                "hours_ago": {"type": "integer"},
                "limit": {"type": "integer"},
            }),
            &["workspace_id"],
        ),
        ToolName::DiffContextVersions => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "item_type": {"type": "string", "enum": ["product_context", "active_context"]},
                "version_a": {"type": "integer"},
                "version_b": {"type": "integer"},
            }),
            &["workspace_id", "item_type", "version_a", "version_b"],
        ),

        ToolName::SemanticSearchConport => object_schema(
            json!({
                "workspace_id": {"type": "string"},
                "query_text": {"type": "string"},
                "top_k": {"type": "integer"},
                "filter_item_types": {"type": "array", "items": {"type": "string"}},
                "filter_custom_data_categories": {"type": "array", "items": {"type": "string"}},
                "filter_tags_include_all": {"type": "array", "items": {"type": "string"}},
                "filter_tags_include_any": {"type": "array", "items": {"type": "string"}},
            }),
            &["workspace_id", "query_text"],
        ),

        ToolName::ExportConportToMarkdown => object_schema(
            json!({"workspace_id": {"type": "string"}, "out_dir": {"type": "string"}}),
            &["workspace_id"],
        ),
        ToolName::ImportMarkdownToConport => object_schema(
            json!({"workspace_id": {"type": "string"}, "in_dir": {"type": "string"}}),
            &["workspace_id"],
        ),

        ToolName::GetConportSchema => object_schema(json!({}), &[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_one_entry_per_tool() {
        let catalog = catalog();
        let obj = catalog.as_object().unwrap();
        assert_eq!(obj.len(), ToolName::ALL.len());
        for tool in ToolName::ALL {
            assert!(obj.contains_key(tool.as_str()), "missing schema for {tool}");
        }
    }

    #[test]
    fn log_decision_schema_requires_summary_and_workspace_id() {
        let catalog = catalog();
        let schema = &catalog["log_decision"];
        let required: Vec<&str> = schema["required"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
        assert!(required.contains(&"workspace_id"));
        assert!(required.contains(&"summary"));
    }

    #[test]
    fn get_conport_schema_itself_needs_nothing() {
        let catalog = catalog();
        let schema = &catalog["get_conport_schema"];
        assert_eq!(schema["required"].as_array().unwrap().len(), 0);
    }
}
