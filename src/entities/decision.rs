//! Decision entity service (spec §4.5).

use serde_json::json;
use tracing::instrument;

use crate::error::Result;
use crate::storage::schema::{DecisionRow, MAX_CONTENT_SIZE};
use crate::types::{item_key, ItemType, RowId};
use crate::workspace::WorkspaceHandle;

use super::{require_non_empty, sanitize_metadata, validate_tags};

/// `get_decisions` default `limit` (spec §4.5).
pub const DEFAULT_LIMIT: usize = 100;

#[instrument(skip(workspace, rationale, implementation_details))]
pub fn create(
    workspace: &WorkspaceHandle,
    summary: String,
    rationale: Option<String>,
    implementation_details: Option<String>,
    tags: Vec<String>,
) -> Result<DecisionRow> {
    require_non_empty("summary", &summary)?;
    validate_tags(&tags)?;
    if summary.len() > MAX_CONTENT_SIZE {
        return Err(crate::error::ValidationError::content_too_large(summary.len(), MAX_CONTENT_SIZE).into());
    }

    let row = workspace
        .storage()
        .create_decision(summary, rationale, implementation_details, tags)?;
    index(workspace, &row)?;
    Ok(row)
}

pub fn get(workspace: &WorkspaceHandle, id: RowId) -> Result<DecisionRow> {
    workspace.storage().get_decision(id)
}

#[instrument(skip(workspace))]
pub fn delete(workspace: &WorkspaceHandle, id: RowId) -> Result<()> {
    workspace.storage().delete_decision(id)?;
    let key = item_key(ItemType::Decision, id);
    if let Err(err) = workspace.vectors().delete_item(&key) {
        tracing::warn!(%err, item_key = %key, "failed to delete decision embedding (suppressed)");
    }
    let _ = workspace.storage().delete_embedding(&key);
    Ok(())
}

pub fn list(
    workspace: &WorkspaceHandle,
    limit: Option<usize>,
    tags_filter: Option<&[String]>,
) -> Result<Vec<DecisionRow>> {
    workspace
        .storage()
        .list_decisions(Some(limit.unwrap_or(DEFAULT_LIMIT)), tags_filter)
}

/// Builds and upserts the embedding for a decision row (spec §4.5's
/// canonical text projection for `Decision`), then persists the raw
/// embedding in the relational store so it survives a process restart.
fn index(workspace: &WorkspaceHandle, row: &DecisionRow) -> Result<()> {
    let text = format!(
        "Decision: {}\nRationale: {}",
        row.summary,
        row.rationale.as_deref().unwrap_or("")
    );
    let embedding = workspace.embedding().embed(&text)?;

    let metadata = sanitize_metadata(
        json!({
            "item_type": ItemType::Decision.as_str(),
            "summary": row.summary,
            "tags": row.tags,
        })
        .as_object()
        .expect("object literal")
        .clone(),
    );

    let key = item_key(ItemType::Decision, row.id);
    workspace.storage().put_embedding(&key, embedding.clone(), metadata.clone())?;
    workspace.vectors().upsert_item(&key, &embedding, metadata)?;
    Ok(())
}
