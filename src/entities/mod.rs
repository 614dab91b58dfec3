//! Entity Services (C5): per-entity create/get/list/update/delete
//! operations that write the relational store transactionally and then
//! apply the paired vector-store side effect (spec §4.5).
//!
//! Grounded on the teacher's `experience/{mod,validation,types}.rs`
//! validate-then-write shape, generalized from the single `Experience`
//! entity to the five indexed/linked ConPort entities. Each submodule
//! owns one entity family; [`context`] additionally owns the C4 history
//! side effect (folded into `RelationalStore::update_context` itself,
//! since it must run in the same write transaction).
//!
//! # Dual-store ordering
//!
//! Every mutating operation here follows spec §4.5 steps 2-6: relational
//! write first (and committed), then the vector-store upsert/delete. The
//! two are never in the same transaction (spec §5, "the paired
//! vector-store side effect is *not* part of the relational
//! transaction") — a failure in the vector step is returned to the
//! caller as [`crate::error::EngineError::Embedding`]/`Vector` (kind
//! `internal`), but the relational write already committed and is not
//! rolled back.

pub mod context;
pub mod custom_data;
pub mod decision;
pub mod link;
pub mod pattern;
pub mod progress;

use crate::error::{Result, ValidationError};
use crate::types::JsonMap;

/// Rejects an empty (after trimming) required string field.
fn require_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::required_field(field).into());
    }
    Ok(())
}

/// Validates a tag list against `storage::schema`'s size limits.
fn validate_tags(tags: &[String]) -> Result<()> {
    use crate::storage::schema::{MAX_TAGS, MAX_TAG_LENGTH};
    if tags.len() > MAX_TAGS {
        return Err(ValidationError::too_many_items(tags.len(), MAX_TAGS).into());
    }
    for tag in tags {
        if tag.len() > MAX_TAG_LENGTH {
            return Err(ValidationError::invalid_field(
                "tags",
                format!("tag '{tag}' exceeds {MAX_TAG_LENGTH} characters"),
            )
            .into());
        }
    }
    Ok(())
}

/// Drops any metadata value that is not string/int/float/bool, or an
/// array of strings (tag lists) — spec §4.3 sanitization rule. Nested
/// objects/arrays of anything else are not guaranteed indexable by the
/// filter algebra, so they're dropped rather than stored unusably.
fn sanitize_metadata(metadata: JsonMap) -> JsonMap {
    metadata
        .into_iter()
        .filter(|(_, v)| is_sanitizable(v))
        .collect()
}

fn is_sanitizable(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::String(_)
        | serde_json::Value::Number(_)
        | serde_json::Value::Bool(_) => true,
        serde_json::Value::Array(items) => items.iter().all(|v| matches!(v, serde_json::Value::String(_))),
        serde_json::Value::Null | serde_json::Value::Object(_) => false,
    }
}

/// Shared test fixture for entity-service unit tests: an in-memory-sized
/// workspace handle with a fixed, dimension-8 embedding stub.
#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::config::{EmbeddingDimension, EngineConfig};
    use crate::embedding::EmbeddingService;
    use crate::error::Result;
    use crate::storage::RedbStore;
    use crate::types::{Embedding, WorkspaceId};
    use crate::vector::HnswIndex;
    use crate::workspace::WorkspaceHandle;

    pub(crate) struct FixedEmbedding;

    impl EmbeddingService for FixedEmbedding {
        fn embed(&self, _text: &str) -> Result<Embedding> {
            Ok(vec![0.1; 8])
        }
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
            texts.iter().map(|t| self.embed(t)).collect()
        }
        fn dimension(&self) -> u16 {
            8
        }
    }

    pub(crate) fn test_handle() -> (tempfile::TempDir, WorkspaceHandle) {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            embedding_dimension: EmbeddingDimension::Custom(8),
            ..EngineConfig::default()
        };
        let storage = RedbStore::open(dir.path().join("conport.db"), &config).unwrap();
        let vectors = HnswIndex::new(8, &config.hnsw);
        let handle = WorkspaceHandle::new(
            WorkspaceId::new(dir.path().to_string_lossy().to_string()),
            Box::new(storage),
            vectors,
            Arc::new(FixedEmbedding),
            dir.path().to_path_buf(),
        );
        (dir, handle)
    }
}
