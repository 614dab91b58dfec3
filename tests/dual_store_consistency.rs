//! Dual-store consistency (spec §5): every indexed entity's relational
//! write and vector-store upsert/delete stay in lockstep from the
//! caller's point of view, and deleting a row removes it from both the
//! relational store and semantic search.

mod common;

use novaport_engine::entities::{custom_data, decision, pattern, progress};
use novaport_engine::search::{semantic_search, SemanticSearchParams};
use novaport_engine::types::{item_key, ItemType};

#[test]
fn decision_create_is_findable_by_semantic_search_and_delete_removes_it() {
    let (_dir, _registry, workspace) = common::open_workspace();

    let row = decision::create(
        &workspace,
        "Use Postgres for storage".into(),
        Some("mature ecosystem".into()),
        None,
        vec!["db".into()],
    )
    .unwrap();

    assert!(workspace.vectors().contains(&item_key(ItemType::Decision, row.id)));

    let params = SemanticSearchParams {
        query_text: "postgres".into(),
        top_k: 5,
        item_types: Some(vec!["decision".into()]),
        ..Default::default()
    };
    let hits = semantic_search(&workspace, &params).unwrap();
    assert_eq!(hits.len(), 1);

    decision::delete(&workspace, row.id).unwrap();
    assert!(decision::get(&workspace, row.id).is_err());
    assert!(!workspace.vectors().contains(&item_key(ItemType::Decision, row.id)));

    let hits_after_delete = semantic_search(&workspace, &params).unwrap();
    assert!(hits_after_delete.is_empty());
}

#[test]
fn progress_cascade_delete_removes_every_descendant_embedding() {
    let (_dir, _registry, workspace) = common::open_workspace();

    let parent = progress::create(&workspace, "TODO".into(), "parent task".into(), None).unwrap();
    let child = progress::create(&workspace, "TODO".into(), "child task".into(), Some(parent.id)).unwrap();

    progress::delete(&workspace, parent.id).unwrap();

    assert!(progress::get(&workspace, parent.id).is_err());
    assert!(progress::get(&workspace, child.id).is_err());
    assert!(!workspace.vectors().contains(&item_key(ItemType::ProgressEntry, parent.id)));
    assert!(!workspace.vectors().contains(&item_key(ItemType::ProgressEntry, child.id)));
}

#[test]
fn system_pattern_duplicate_name_is_rejected_and_does_not_leave_a_stray_embedding() {
    let (_dir, _registry, workspace) = common::open_workspace();

    pattern::create(&workspace, "Repository Pattern".into(), None, vec![]).unwrap();
    let err = pattern::create(&workspace, "Repository Pattern".into(), None, vec![]).unwrap_err();
    assert!(err.is_conflict());

    let rows = pattern::list(&workspace, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(workspace.storage().list_embeddings().unwrap().len(), 1);
}

#[test]
fn custom_data_upsert_keeps_exactly_one_row_and_one_embedding_per_category_key() {
    let (_dir, _registry, workspace) = common::open_workspace();

    custom_data::upsert(&workspace, "glossary".into(), "LLM".into(), serde_json::json!("v1")).unwrap();
    custom_data::upsert(&workspace, "glossary".into(), "LLM".into(), serde_json::json!("v2")).unwrap();

    let rows = custom_data::list(&workspace, Some("glossary")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, serde_json::json!("v2"));
    assert_eq!(workspace.storage().list_embeddings().unwrap().len(), 1);
}

#[test]
fn empty_workspace_semantic_search_returns_empty_not_an_error() {
    let (_dir, _registry, workspace) = common::open_workspace();

    let params = SemanticSearchParams {
        query_text: "anything".into(),
        top_k: 5,
        ..Default::default()
    };
    let hits = semantic_search(&workspace, &params).unwrap();
    assert!(hits.is_empty());
}
