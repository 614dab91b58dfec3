//! Context link entity service (spec §4.5): a plain relational
//! relationship between two (possibly heterogeneous) items. No vector
//! side effect — links are not semantically searchable themselves.

use tracing::instrument;

use crate::error::Result;
use crate::storage::schema::ContextLinkRow;
use crate::types::RowId;
use crate::workspace::WorkspaceHandle;

use super::require_non_empty;

/// `get_linked_items` default `limit` (spec §4.5).
pub const DEFAULT_LIMIT: usize = 50;

#[instrument(skip(workspace, description))]
#[allow(clippy::too_many_arguments)]
pub fn create(
    workspace: &WorkspaceHandle,
    source_item_type: String,
    source_item_id: String,
    target_item_type: String,
    target_item_id: String,
    relationship_type: String,
    description: Option<String>,
) -> Result<ContextLinkRow> {
    require_non_empty("source_item_type", &source_item_type)?;
    require_non_empty("source_item_id", &source_item_id)?;
    require_non_empty("target_item_type", &target_item_type)?;
    require_non_empty("target_item_id", &target_item_id)?;
    require_non_empty("relationship_type", &relationship_type)?;

    workspace.storage().create_link(
        source_item_type,
        source_item_id,
        target_item_type,
        target_item_id,
        relationship_type,
        description,
    )
}

pub fn get(workspace: &WorkspaceHandle, id: RowId) -> Result<ContextLinkRow> {
    workspace.storage().get_link(id)
}

#[instrument(skip(workspace))]
pub fn delete(workspace: &WorkspaceHandle, id: RowId) -> Result<()> {
    workspace.storage().delete_link(id)
}

/// Links where `(item_type, item_id)` occurs as either the source or
/// the target (spec §4.5).
pub fn list_for_item(
    workspace: &WorkspaceHandle,
    item_type: &str,
    item_id: &str,
    limit: Option<usize>,
) -> Result<Vec<ContextLinkRow>> {
    workspace
        .storage()
        .list_links_for_item(item_type, item_id, Some(limit.unwrap_or(DEFAULT_LIMIT)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::test_support::test_handle;

    #[test]
    fn create_rejects_empty_relationship_type() {
        let (_dir, handle) = test_handle();
        let result = create(
            &handle,
            "decision".into(),
            "1".into(),
            "system_pattern".into(),
            "2".into(),
            "".into(),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn list_for_item_finds_both_sides() {
        let (_dir, handle) = test_handle();
        create(
            &handle,
            "decision".into(),
            "1".into(),
            "system_pattern".into(),
            "2".into(),
            "implements".into(),
            None,
        )
        .unwrap();

        let from_source = list_for_item(&handle, "decision", "1", None).unwrap();
        let from_target = list_for_item(&handle, "system_pattern", "2", None).unwrap();
        assert_eq!(from_source.len(), 1);
        assert_eq!(from_target.len(), 1);
    }
}
