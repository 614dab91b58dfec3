//! System pattern entity service (spec §4.5): `name` unique within a
//! workspace, enforced by the relational layer's secondary index.

use serde_json::json;
use tracing::instrument;

use crate::error::Result;
use crate::storage::schema::SystemPatternRow;
use crate::types::{item_key, ItemType, RowId};
use crate::workspace::WorkspaceHandle;

use super::{require_non_empty, validate_tags};

#[instrument(skip(workspace, description))]
pub fn create(
    workspace: &WorkspaceHandle,
    name: String,
    description: Option<String>,
    tags: Vec<String>,
) -> Result<SystemPatternRow> {
    require_non_empty("name", &name)?;
    validate_tags(&tags)?;

    let row = workspace.storage().create_system_pattern(name, description, tags)?;
    index(workspace, &row)?;
    Ok(row)
}

pub fn get(workspace: &WorkspaceHandle, id: RowId) -> Result<SystemPatternRow> {
    workspace.storage().get_system_pattern(id)
}

#[instrument(skip(workspace))]
pub fn delete(workspace: &WorkspaceHandle, id: RowId) -> Result<()> {
    workspace.storage().delete_system_pattern(id)?;
    let key = item_key(ItemType::SystemPattern, id);
    if let Err(err) = workspace.vectors().delete_item(&key) {
        tracing::warn!(%err, item_key = %key, "failed to delete system pattern embedding (suppressed)");
    }
    let _ = workspace.storage().delete_embedding(&key);
    Ok(())
}

/// Unbounded by design (spec §4.5); callers should pass an explicit
/// `limit`, but `None` is honored literally rather than defaulted.
pub fn list(workspace: &WorkspaceHandle, limit: Option<usize>) -> Result<Vec<SystemPatternRow>> {
    workspace.storage().list_system_patterns(limit)
}

fn index(workspace: &WorkspaceHandle, row: &SystemPatternRow) -> Result<()> {
    let text = format!(
        "System Pattern: {}\nDescription: {}",
        row.name,
        row.description.as_deref().unwrap_or("")
    );
    let embedding = workspace.embedding().embed(&text)?;

    let metadata = json!({
        "item_type": ItemType::SystemPattern.as_str(),
        "name": row.name,
        "tags": row.tags,
    })
    .as_object()
    .expect("object literal")
    .clone();

    let key = item_key(ItemType::SystemPattern, row.id);
    workspace.storage().put_embedding(&key, embedding.clone(), metadata.clone())?;
    workspace.vectors().upsert_item(&key, &embedding, metadata)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::test_support::test_handle;

    #[test]
    fn create_rejects_duplicate_name() {
        let (_dir, handle) = test_handle();
        create(&handle, "Repository Pattern".into(), None, vec![]).unwrap();
        let second = create(&handle, "Repository Pattern".into(), None, vec![]);
        assert!(second.is_err());
        assert!(second.unwrap_err().is_conflict());
    }

    #[test]
    fn create_rejects_empty_name() {
        let (_dir, handle) = test_handle();
        assert!(create(&handle, "".into(), None, vec![]).is_err());
    }

    #[test]
    fn list_with_no_limit_returns_everything() {
        let (_dir, handle) = test_handle();
        for i in 0..5 {
            create(&handle, format!("Pattern {i}"), None, vec![]).unwrap();
        }
        assert_eq!(list(&handle, None).unwrap().len(), 5);
    }
}
