//! Singleton context documents + version history (spec §4.4/§4.5/§8
//! scenario 1): patch → patch → delete-a-key → final content and
//! history-row count, plus the diffing boundary behaviors batch/meta
//! exposes over the same history rows.

mod common;

use novaport_engine::batch::{diff_context_versions, ContextDiffEntry};
use novaport_engine::entities::context;
use novaport_engine::storage::ContextKind;
use serde_json::json;

fn obj(v: serde_json::Value) -> novaport_engine::JsonMap {
    v.as_object().unwrap().clone()
}

#[test]
fn patch_then_patch_then_delete_key_matches_literal_scenario() {
    let (_dir, _registry, workspace) = common::open_workspace();
    let storage = workspace.storage();

    context::update(
        storage,
        ContextKind::Active,
        None,
        Some(obj(json!({"phase": "design", "owner": "nova"}))),
        None,
    )
    .unwrap();

    context::update(
        storage,
        ContextKind::Active,
        None,
        Some(obj(json!({"phase": "implementation"}))),
        None,
    )
    .unwrap();

    let final_content = context::update(
        storage,
        ContextKind::Active,
        None,
        Some(obj(json!({"owner": "__DELETE__"}))),
        None,
    )
    .unwrap();

    assert_eq!(final_content, obj(json!({"phase": "implementation"})));

    let history = context::list_history(storage, ContextKind::Active, None, None).unwrap();
    assert_eq!(history.len(), 3);
    // Most recent first; history rows hold the pre-mutation content.
    assert_eq!(history[0].version, 3);
    assert_eq!(history[2].version, 1);
}

#[test]
fn diff_same_version_is_empty_per_boundary_behavior() {
    let (_dir, _registry, workspace) = common::open_workspace();
    context::update(
        workspace.storage(),
        ContextKind::Active,
        Some(obj(json!({"x": 1}))),
        None,
        None,
    )
    .unwrap();

    let diff = diff_context_versions(&workspace, "active_context", 1, 1).unwrap();
    assert!(diff.is_empty());
}

#[test]
fn diff_detects_change_and_addition_across_versions() {
    let (_dir, _registry, workspace) = common::open_workspace();
    context::update(
        workspace.storage(),
        ContextKind::Active,
        Some(obj(json!({"x": 1}))),
        None,
        None,
    )
    .unwrap();
    context::update(
        workspace.storage(),
        ContextKind::Active,
        Some(obj(json!({"x": 2, "y": 3}))),
        None,
        None,
    )
    .unwrap();

    let diff = diff_context_versions(&workspace, "active_context", 1, 2).unwrap();
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
fn get_item_history_version_lookup_returns_the_requested_snapshot() {
    let (_dir, _registry, workspace) = common::open_workspace();
    context::update(
        workspace.storage(),
        ContextKind::Product,
        Some(obj(json!({"project": "alpha"}))),
        None,
        None,
    )
    .unwrap();
    context::update(
        workspace.storage(),
        ContextKind::Product,
        Some(obj(json!({"project": "beta"}))),
        None,
        None,
    )
    .unwrap();

    let v1 = context::get_version(workspace.storage(), ContextKind::Product, Some(1)).unwrap();
    assert_eq!(v1, obj(json!({"project": "alpha"})));

    let live = context::get_version(workspace.storage(), ContextKind::Product, None).unwrap();
    assert_eq!(live, obj(json!({"project": "beta"})));
}
