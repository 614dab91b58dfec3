//! Singleton context document service (`ProductContext`/`ActiveContext`,
//! spec §4.5 "Update semantics for contexts").
//!
//! Unlike the indexed entities in this module's siblings, contexts have
//! no vector-store side effect — they are not part of the semantic
//! search surface. The history side effect (C4) is folded into
//! [`crate::storage::RelationalStore::update_context`] itself, since it
//! must run in the same write transaction as the content update.

use crate::error::{Result, ValidationError};
use crate::storage::{ContextHistoryRow, ContextKind, RelationalStore};
use crate::types::JsonMap;

/// Sentinel value that removes a key during `patch_content` application
/// (spec §4.5).
const DELETE_SENTINEL: &str = "__DELETE__";

/// `list_context_history` default `limit` (spec §4.5).
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

pub fn get(storage: &dyn RelationalStore, kind: ContextKind) -> Result<JsonMap> {
    storage.get_context(kind)
}

/// Exactly one of `content`/`patch_content` must be `Some`; anything
/// else is a `validation` error (spec §4.5).
pub fn update(
    storage: &dyn RelationalStore,
    kind: ContextKind,
    content: Option<JsonMap>,
    patch_content: Option<JsonMap>,
    change_source: Option<String>,
) -> Result<JsonMap> {
    let new_content = match (content, patch_content) {
        (Some(_), Some(_)) => {
            return Err(ValidationError::invalid_field(
                "content",
                "exactly one of content or patch_content must be provided, not both",
            )
            .into())
        }
        (None, None) => {
            return Err(ValidationError::invalid_field(
                "content",
                "exactly one of content or patch_content must be provided",
            )
            .into())
        }
        (Some(content), None) => content,
        (None, Some(patch)) => apply_patch(storage.get_context(kind)?, patch),
    };

    storage.update_context(kind, new_content.clone(), change_source)?;
    Ok(new_content)
}

/// Shallow merge: `value == "__DELETE__"` removes the key, else assigns
/// it (spec §4.5).
fn apply_patch(mut base: JsonMap, patch: JsonMap) -> JsonMap {
    for (key, value) in patch {
        if value.as_str() == Some(DELETE_SENTINEL) {
            base.remove(&key);
        } else {
            base.insert(key, value);
        }
    }
    base
}

pub fn list_history(
    storage: &dyn RelationalStore,
    kind: ContextKind,
    limit: Option<usize>,
    version: Option<u64>,
) -> Result<Vec<ContextHistoryRow>> {
    storage.list_context_history(kind, Some(limit.unwrap_or(DEFAULT_HISTORY_LIMIT)), version)
}

pub fn get_version(
    storage: &dyn RelationalStore,
    kind: ContextKind,
    version: Option<u64>,
) -> Result<JsonMap> {
    storage.get_context_version(kind, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::test_support::test_handle;
    use serde_json::json;

    fn obj(v: serde_json::Value) -> JsonMap {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn update_requires_exactly_one_of_content_or_patch() {
        let (_dir, handle) = test_handle();
        assert!(update(handle.storage(), ContextKind::Product, None, None, None).is_err());
        assert!(update(
            handle.storage(),
            ContextKind::Product,
            Some(obj(json!({"a": 1}))),
            Some(obj(json!({"b": 2}))),
            None
        )
        .is_err());
    }

    #[test]
    fn full_replace_round_trips() {
        let (_dir, handle) = test_handle();
        let content = obj(json!({"project": "Nova"}));
        update(handle.storage(), ContextKind::Product, Some(content.clone()), None, None).unwrap();
        assert_eq!(get(handle.storage(), ContextKind::Product).unwrap(), content);
    }

    #[test]
    fn patch_merges_and_delete_sentinel_removes_key() {
        let (_dir, handle) = test_handle();
        update(
            handle.storage(),
            ContextKind::Product,
            None,
            Some(obj(json!({"project": "Nova", "version": 1}))),
            None,
        )
        .unwrap();
        update(
            handle.storage(),
            ContextKind::Product,
            None,
            Some(obj(json!({"version": 2, "status": "alpha"}))),
            None,
        )
        .unwrap();
        let after_two = update(
            handle.storage(),
            ContextKind::Product,
            None,
            Some(obj(json!({"status": "__DELETE__"}))),
            None,
        )
        .unwrap();

        assert_eq!(after_two, obj(json!({"project": "Nova", "version": 2})));

        // Three real content changes (the initial `{}` -> first patch counts
        // as one, per the singleton's implicit `{}` pre-image) produce three
        // history rows, most recent first.
        let history = list_history(handle.storage(), ContextKind::Product, None, None).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].version, 3);
        assert_eq!(history[1].version, 2);
        assert_eq!(history[2].version, 1);
        assert_eq!(history[2].content, obj(json!({})));
        assert_eq!(history[1].content, obj(json!({"project": "Nova", "version": 1})));
        assert_eq!(
            history[0].content,
            obj(json!({"project": "Nova", "version": 2, "status": "alpha"}))
        );
    }

    #[test]
    fn no_op_patch_does_not_grow_history() {
        let (_dir, handle) = test_handle();
        update(
            handle.storage(),
            ContextKind::Active,
            None,
            Some(obj(json!({"x": 1}))),
            None,
        )
        .unwrap();
        update(
            handle.storage(),
            ContextKind::Active,
            None,
            Some(obj(json!({"x": 1}))),
            None,
        )
        .unwrap();
        let history = list_history(handle.storage(), ContextKind::Active, None, None).unwrap();
        assert_eq!(history.len(), 1);
    }
}
