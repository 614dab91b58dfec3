//! Custom data entity service (spec §4.5): `(category, key)` is a unique
//! key, and writes are upsert semantics — re-logging the same pair
//! replaces the value and re-embeds, leaving exactly one relational row
//! and one embedding per pair (spec §8 testable property).

use serde_json::json;
use tracing::{instrument, warn};

use crate::error::Result;
use crate::storage::schema::{CustomDataRow, MAX_CATEGORY_KEY_LENGTH};
use crate::types::{item_key, ItemType, RowId};
use crate::workspace::WorkspaceHandle;

use super::require_non_empty;

#[instrument(skip(workspace, value))]
pub fn upsert(
    workspace: &WorkspaceHandle,
    category: String,
    key: String,
    value: serde_json::Value,
) -> Result<CustomDataRow> {
    require_non_empty("category", &category)?;
    require_non_empty("key", &key)?;
    if category.len() > MAX_CATEGORY_KEY_LENGTH || key.len() > MAX_CATEGORY_KEY_LENGTH {
        return Err(crate::error::ValidationError::invalid_field(
            "category/key",
            format!("must not exceed {MAX_CATEGORY_KEY_LENGTH} characters"),
        )
        .into());
    }

    let row = workspace.storage().upsert_custom_data(category, key, value)?;
    index(workspace, &row);
    Ok(row)
}

pub fn get(workspace: &WorkspaceHandle, category: &str, key: &str) -> Result<CustomDataRow> {
    workspace.storage().get_custom_data(category, key)
}

#[instrument(skip(workspace))]
pub fn delete(workspace: &WorkspaceHandle, category: &str, key: &str) -> Result<()> {
    let row = workspace.storage().get_custom_data(category, key)?;
    workspace.storage().delete_custom_data(category, key)?;
    let item_key = item_key(ItemType::CustomData, row.id);
    if let Err(err) = workspace.vectors().delete_item(&item_key) {
        warn!(%err, item_key = %item_key, "failed to delete custom data embedding (suppressed)");
    }
    let _ = workspace.storage().delete_embedding(&item_key);
    Ok(())
}

pub fn list(workspace: &WorkspaceHandle, category_filter: Option<&str>) -> Result<Vec<CustomDataRow>> {
    workspace.storage().list_custom_data(category_filter)
}

/// Best-effort: if the value doesn't stringify (shouldn't happen for a
/// `serde_json::Value`, which is always serializable, but guarded per
/// spec §4.5's documented edge case), the relational write still
/// succeeds and only the embedding is skipped.
fn index(workspace: &WorkspaceHandle, row: &CustomDataRow) {
    let Ok(value_str) = serde_json::to_string(&row.value) else {
        warn!(category = %row.category, key = %row.key, "custom data value not JSON-serializable; skipping embedding");
        return;
    };
    let text = format!(
        "Custom Data in category '{}' key '{}': {}",
        row.category, row.key, value_str
    );

    let embedding = match workspace.embedding().embed(&text) {
        Ok(embedding) => embedding,
        Err(err) => {
            warn!(%err, category = %row.category, key = %row.key, "failed to embed custom data");
            return;
        }
    };

    let metadata = json!({
        "item_type": ItemType::CustomData.as_str(),
        "category": row.category,
        "key": row.key,
    })
    .as_object()
    .expect("object literal")
    .clone();

    let item_key = item_key(ItemType::CustomData, row.id);
    if let Err(err) = workspace.storage().put_embedding(&item_key, embedding.clone(), metadata.clone()) {
        warn!(%err, "failed to persist custom data embedding row");
        return;
    }
    if let Err(err) = workspace.vectors().upsert_item(&item_key, &embedding, metadata) {
        warn!(%err, "failed to upsert custom data embedding");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::test_support::test_handle;
    use crate::types::ItemType;

    #[test]
    fn upsert_replaces_existing_row_and_embedding() {
        let (_dir, handle) = test_handle();
        let first = upsert(&handle, "glossary".into(), "LLM".into(), serde_json::json!("v1")).unwrap();
        let second = upsert(&handle, "glossary".into(), "LLM".into(), serde_json::json!("v2")).unwrap();

        assert_eq!(first.id, second.id);
        let fetched = get(&handle, "glossary", "LLM").unwrap();
        assert_eq!(fetched.value, serde_json::json!("v2"));
        assert_eq!(handle.storage().list_embeddings().unwrap().len(), 1);
    }

    #[test]
    fn delete_removes_row_and_embedding() {
        let (_dir, handle) = test_handle();
        let row = upsert(&handle, "glossary".into(), "LLM".into(), serde_json::json!("v1")).unwrap();
        delete(&handle, "glossary", "LLM").unwrap();
        assert!(get(&handle, "glossary", "LLM").is_err());
        assert!(!handle.vectors().contains(&item_key(ItemType::CustomData, row.id)));
    }

    #[test]
    fn upsert_rejects_empty_category() {
        let (_dir, handle) = test_handle();
        assert!(upsert(&handle, "".into(), "LLM".into(), serde_json::json!("v1")).is_err());
    }
}
