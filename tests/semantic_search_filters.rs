//! Semantic search filter composition end-to-end (spec §4.7): tag and
//! item-type filters actually narrow results against a live HNSW index,
//! not just the `FilterExpr` unit tests in `src/search/semantic.rs`.

mod common;

use novaport_engine::entities::{decision, pattern};
use novaport_engine::search::{semantic_search, SemanticSearchParams};

#[test]
fn item_type_filter_excludes_other_entity_kinds() {
    let (_dir, _registry, workspace) = common::open_workspace();

    decision::create(&workspace, "Use postgres for storage".into(), None, None, vec!["db".into()]).unwrap();
    pattern::create(&workspace, "Repository Pattern".into(), None, vec!["db".into()]).unwrap();

    let params = SemanticSearchParams {
        query_text: "storage".into(),
        top_k: 10,
        item_types: Some(vec!["decision".into()]),
        ..Default::default()
    };
    let hits = semantic_search(&workspace, &params).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].metadata.get("item_type").unwrap(), "decision");
}

#[test]
fn tags_all_requires_every_tag_present() {
    let (_dir, _registry, workspace) = common::open_workspace();

    decision::create(&workspace, "Use postgres".into(), None, None, vec!["db".into(), "infra".into()]).unwrap();
    decision::create(&workspace, "Use redis".into(), None, None, vec!["db".into()]).unwrap();

    let params = SemanticSearchParams {
        query_text: "use".into(),
        top_k: 10,
        tags_all: Some(vec!["db".into(), "infra".into()]),
        ..Default::default()
    };
    let hits = semantic_search(&workspace, &params).unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn tags_any_matches_either_tag() {
    let (_dir, _registry, workspace) = common::open_workspace();

    decision::create(&workspace, "Use postgres".into(), None, None, vec!["db".into()]).unwrap();
    decision::create(&workspace, "Use react".into(), None, None, vec!["frontend".into()]).unwrap();
    decision::create(&workspace, "Use rust".into(), None, None, vec!["lang".into()]).unwrap();

    let params = SemanticSearchParams {
        query_text: "use".into(),
        top_k: 10,
        tags_any: Some(vec!["db".into(), "frontend".into()]),
        ..Default::default()
    };
    let hits = semantic_search(&workspace, &params).unwrap();
    assert_eq!(hits.len(), 2);
}

#[test]
fn top_k_out_of_range_is_clamped_not_rejected() {
    let (_dir, _registry, workspace) = common::open_workspace();
    decision::create(&workspace, "Use postgres".into(), None, None, vec![]).unwrap();

    let too_low = SemanticSearchParams { query_text: "postgres".into(), top_k: 0, ..Default::default() };
    assert_eq!(semantic_search(&workspace, &too_low).unwrap().len(), 1);

    let too_high = SemanticSearchParams { query_text: "postgres".into(), top_k: 10_000, ..Default::default() };
    assert!(semantic_search(&workspace, &too_high).is_ok());
}
