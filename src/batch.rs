//! Batch & Meta Service (C6): bulk item logging, cross-entity recent
//! activity, and context-version diffing (spec §4.6).
//!
//! Grounded on `original_source/.../services/meta_service.py`'s
//! `batch_log_items`/`get_recent_activity_summary`/`diff_context_versions`
//! trio, adapted to this crate's entity-service free functions.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::entities::{custom_data, decision, pattern, progress};
use crate::error::{EngineError, Result, ValidationError};
use crate::storage::{ContextKind, RecentActivity};
use crate::types::Timestamp;
use crate::workspace::WorkspaceHandle;

/// One item to log in a `batch_log_items` call. The shape of `data`
/// depends on `item_type` and mirrors the corresponding entity's create
/// arguments (spec §4.6).
#[derive(Clone, Debug, Deserialize)]
pub struct BatchItem {
    #[serde(flatten)]
    pub data: Value,
}

/// Outcome of a single item within a batch (spec §4.6, "continue on
/// per-item failure").
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItemOutcome {
    Succeeded { index: usize, id: u64 },
    Failed { index: usize, error: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failed: usize,
    pub details: Vec<BatchItemOutcome>,
}

/// Logs a list of same-typed items, continuing past per-item failures
/// (spec §4.6 / §8 scenario 2): a malformed item (missing a required
/// field, wrong JSON shape) counts toward `failed` rather than aborting
/// the whole call.
#[instrument(skip(workspace, items))]
pub fn batch_log_items(
    workspace: &WorkspaceHandle,
    item_type: &str,
    items: Vec<BatchItem>,
) -> Result<BatchResult> {
    let mut succeeded = 0;
    let mut failed = 0;
    let mut details = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        match log_one(workspace, item_type, item.data) {
            Ok(id) => {
                succeeded += 1;
                details.push(BatchItemOutcome::Succeeded { index, id });
            }
            Err(err) => {
                failed += 1;
                details.push(BatchItemOutcome::Failed {
                    index,
                    error: err.to_string(),
                });
            }
        }
    }

    Ok(BatchResult {
        succeeded,
        failed,
        details,
    })
}

fn log_one(workspace: &WorkspaceHandle, item_type: &str, data: Value) -> Result<u64> {
    fn field(data: &Value, name: &'static str) -> Result<String> {
        data.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ValidationError::required_field(name).into())
    }
    fn tags(data: &Value) -> Vec<String> {
        data.get("tags")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    match item_type {
        "decision" => {
            let summary = field(&data, "summary")?;
            let rationale = data.get("rationale").and_then(Value::as_str).map(str::to_string);
            let implementation_details = data
                .get("implementation_details")
                .and_then(Value::as_str)
                .map(str::to_string);
            let row = decision::create(workspace, summary, rationale, implementation_details, tags(&data))?;
            Ok(row.id.get())
        }
        "progress_entry" => {
            let status = field(&data, "status")?;
            let description = field(&data, "description")?;
            let parent_id = data
                .get("parent_id")
                .and_then(Value::as_u64)
                .map(crate::types::RowId::new);
            let row = progress::create(workspace, status, description, parent_id)?;
            Ok(row.id.get())
        }
        "system_pattern" => {
            let name = field(&data, "name")?;
            let description = data.get("description").and_then(Value::as_str).map(str::to_string);
            let row = pattern::create(workspace, name, description, tags(&data))?;
            Ok(row.id.get())
        }
        "custom_data" => {
            let category = field(&data, "category")?;
            let key = field(&data, "key")?;
            let value = data
                .get("value")
                .cloned()
                .ok_or_else(|| ValidationError::required_field("value"))?;
            let row = custom_data::upsert(workspace, category, key, value)?;
            Ok(row.id.get())
        }
        other => Err(ValidationError::invalid_field("item_type", format!("unsupported batch item type '{other}'")).into()),
    }
}

/// Rows created at or after `since` (or, absent `since`, at or after
/// `now - hours_ago`), most-recent-first, each category capped at
/// `limit` (spec §4.6, Open Question 1: `since` wins over `hours_ago`).
pub fn recent_activity(
    workspace: &WorkspaceHandle,
    since: Option<Timestamp>,
    hours_ago: Option<i64>,
    limit: usize,
) -> Result<RecentActivity> {
    let effective_since = since.or_else(|| hours_ago.map(|h| Timestamp::now().minus_hours(h)));
    workspace.storage().recent_activity(effective_since, limit)
}

/// One edit between two context versions (spec §8 scenario 4: "`x: 1→2`
/// and `add y=3`").
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ContextDiffEntry {
    Added { path: String, value: Value },
    Removed { path: String, value: Value },
    Changed { path: String, old_value: Value, new_value: Value },
}

/// Diffs two historical versions of a context document as a flat,
/// top-level key comparison (spec §4.6; `v == v` yields `[]` per §8
/// boundary behavior).
#[instrument(skip(workspace))]
pub fn diff_context_versions(
    workspace: &WorkspaceHandle,
    item_type: &str,
    version_a: u64,
    version_b: u64,
) -> Result<Vec<ContextDiffEntry>> {
    let kind = parse_context_kind(item_type)?;

    if version_a == version_b {
        return Ok(Vec::new());
    }

    let content_a = fetch_version(workspace, kind, item_type, version_a)?;
    let content_b = fetch_version(workspace, kind, item_type, version_b)?;

    let mut diff = Vec::new();
    for (key, value_a) in &content_a {
        match content_b.get(key) {
            None => diff.push(ContextDiffEntry::Removed {
                path: key.clone(),
                value: value_a.clone(),
            }),
            Some(value_b) if value_b != value_a => diff.push(ContextDiffEntry::Changed {
                path: key.clone(),
                old_value: value_a.clone(),
                new_value: value_b.clone(),
            }),
            Some(_) => {}
        }
    }
    for (key, value_b) in &content_b {
        if !content_a.contains_key(key) {
            diff.push(ContextDiffEntry::Added {
                path: key.clone(),
                value: value_b.clone(),
            });
        }
    }
    diff.sort_by(|a, b| path_of(a).cmp(path_of(b)));
    Ok(diff)
}

fn path_of(entry: &ContextDiffEntry) -> &str {
    match entry {
        ContextDiffEntry::Added { path, .. }
        | ContextDiffEntry::Removed { path, .. }
        | ContextDiffEntry::Changed { path, .. } => path,
    }
}

fn fetch_version(
    workspace: &WorkspaceHandle,
    kind: ContextKind,
    item_type: &str,
    version: u64,
) -> Result<crate::types::JsonMap> {
    workspace
        .storage()
        .get_context_version(kind, Some(version))
        .map_err(|err| {
            if err.is_not_found() {
                EngineError::NotFound(crate::error::NotFoundError::entity(
                    "context_version",
                    format!("{item_type}@{version}"),
                    workspace.workspace_id().as_str(),
                ))
            } else {
                err
            }
        })
}

fn parse_context_kind(item_type: &str) -> Result<ContextKind> {
    match item_type {
        "product_context" => Ok(ContextKind::Product),
        "active_context" => Ok(ContextKind::Active),
        other => Err(ValidationError::invalid_field("item_type", format!("unknown context type '{other}'")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{context, test_support::test_handle};
    use serde_json::json;

    #[test]
    fn batch_log_items_reports_mixed_validity() {
        let (_dir, handle) = test_handle();
        let items = vec![
            BatchItem { data: json!({"summary": "A"}) },
            BatchItem { data: json!({"rationale": "no summary"}) },
            BatchItem { data: json!({"summary": "B"}) },
            BatchItem { data: json!({"summary": null}) },
            BatchItem { data: json!({"summary": "C"}) },
        ];
        let result = batch_log_items(&handle, "decision", items).unwrap();
        assert_eq!(result.succeeded, 3);
        assert_eq!(result.failed, 2);
        assert_eq!(result.details.len(), 5);
    }

    #[test]
    fn recent_activity_prefers_since_over_hours_ago() {
        let (_dir, handle) = test_handle();
        decision::create(&handle, "A".into(), None, None, vec![]).unwrap();
        let far_future = Timestamp::from_millis(Timestamp::now().as_millis() + 1_000_000);
        let result = recent_activity(&handle, Some(far_future), Some(999_999), 10).unwrap();
        assert!(result.decisions.is_empty());
    }

    #[test]
    fn diff_context_versions_same_version_is_empty() {
        let (_dir, handle) = test_handle();
        context::update(
            handle.storage(),
            ContextKind::Active,
            Some(json!({"x": 1}).as_object().unwrap().clone()),
            None,
            None,
        )
        .unwrap();
        let diff = diff_context_versions(&handle, "active_context", 1, 1).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn diff_context_versions_detects_change_and_add() {
        let (_dir, handle) = test_handle();
        context::update(
            handle.storage(),
            ContextKind::Active,
            Some(json!({"x": 1}).as_object().unwrap().clone()),
            None,
            None,
        )
        .unwrap();
        context::update(
            handle.storage(),
            ContextKind::Active,
            Some(json!({"x": 2, "y": 3}).as_object().unwrap().clone()),
            None,
            None,
        )
        .unwrap();

        let diff = diff_context_versions(&handle, "active_context", 1, 2).unwrap();
        assert_eq!(diff.len(), 2);
        assert!(diff.contains(&ContextDiffEntry::Changed {
            path: "x".into(),
            old_value: json!(1),
            new_value: json!(2),
        }));
        assert!(diff.contains(&ContextDiffEntry::Added {
            path: "y".into(),
            value: json!(3),
        }));
    }

    #[test]
    fn diff_context_versions_rejects_unknown_item_type() {
        let (_dir, handle) = test_handle();
        assert!(diff_context_versions(&handle, "unknown", 1, 2).is_err());
    }
}
