//! Progress entry entity service (spec §4.5): parent/child self-FK where
//! deleting a parent cascades to every descendant (cascade-delete is
//! driven by the relational layer; re-embed follows any change to
//! indexed fields).

use serde_json::json;
use tracing::instrument;

use crate::error::Result;
use crate::storage::schema::ProgressRow;
use crate::types::{item_key, ItemType, RowId};
use crate::workspace::WorkspaceHandle;

use super::require_non_empty;

/// `get_progress` default `limit` (spec §4.5).
pub const DEFAULT_LIMIT: usize = 50;

#[instrument(skip(workspace, description))]
pub fn create(
    workspace: &WorkspaceHandle,
    status: String,
    description: String,
    parent_id: Option<RowId>,
) -> Result<ProgressRow> {
    require_non_empty("status", &status)?;
    require_non_empty("description", &description)?;

    let row = workspace.storage().create_progress(status, description, parent_id)?;
    index(workspace, &row)?;
    Ok(row)
}

pub fn get(workspace: &WorkspaceHandle, id: RowId) -> Result<ProgressRow> {
    workspace.storage().get_progress(id)
}

/// `status`/`description`/`parent_id` of `None` leave the field
/// unchanged; `parent_id = Some(None)` clears the parent link. Per
/// `SPEC_FULL.md` §9 Open Question 2, any change to an indexed field
/// (`status`, `description`) re-embeds the row.
#[instrument(skip(workspace, description))]
pub fn update(
    workspace: &WorkspaceHandle,
    id: RowId,
    status: Option<String>,
    description: Option<String>,
    parent_id: Option<Option<RowId>>,
) -> Result<ProgressRow> {
    if let Some(status) = &status {
        require_non_empty("status", status)?;
    }
    if let Some(description) = &description {
        require_non_empty("description", description)?;
    }
    let reembed = status.is_some() || description.is_some();

    let row = workspace.storage().update_progress(id, status, description, parent_id)?;
    if reembed {
        index(workspace, &row)?;
    }
    Ok(row)
}

/// Deletes `id` and cascades to every descendant (spec §4.5 "children
/// cascade-delete"), removing each deleted row's embedding in turn so
/// the vector store never outlives a relational row it indexes.
#[instrument(skip(workspace))]
pub fn delete(workspace: &WorkspaceHandle, id: RowId) -> Result<()> {
    let deleted_ids = workspace.storage().delete_progress(id)?;
    for deleted_id in deleted_ids {
        let key = item_key(ItemType::ProgressEntry, deleted_id);
        if let Err(err) = workspace.vectors().delete_item(&key) {
            tracing::warn!(%err, item_key = %key, "failed to delete progress embedding (suppressed)");
        }
        let _ = workspace.storage().delete_embedding(&key);
    }
    Ok(())
}

pub fn list(
    workspace: &WorkspaceHandle,
    limit: Option<usize>,
    status_filter: Option<&str>,
    parent_id_filter: Option<RowId>,
) -> Result<Vec<ProgressRow>> {
    workspace
        .storage()
        .list_progress(Some(limit.unwrap_or(DEFAULT_LIMIT)), status_filter, parent_id_filter)
}

fn index(workspace: &WorkspaceHandle, row: &ProgressRow) -> Result<()> {
    let text = format!("Progress {}: {}", row.status, row.description);
    let embedding = workspace.embedding().embed(&text)?;

    let metadata = json!({
        "item_type": ItemType::ProgressEntry.as_str(),
        "status": row.status,
    })
    .as_object()
    .expect("object literal")
    .clone();

    let key = item_key(ItemType::ProgressEntry, row.id);
    workspace.storage().put_embedding(&key, embedding.clone(), metadata.clone())?;
    workspace.vectors().upsert_item(&key, &embedding, metadata)?;
    Ok(())
}
