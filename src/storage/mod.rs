//! Relational store abstraction.
//!
//! Generalizes the teacher's `StorageEngine` trait (doc-commented exact
//! transaction boundaries per operation) from PulseDB's
//! collective/experience model to the ConPort entity set: singleton
//! context documents with history, decisions, progress entries (with
//! parent/child cascade), system patterns, custom data, and context
//! links.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    WorkspaceHandle                           │
//! │                         │                                    │
//! │                         ▼                                    │
//! │              ┌─────────────────────┐                        │
//! │              │  RelationalStore    │  ← Trait               │
//! │              └─────────────────────┘                        │
//! │                         ▲                                    │
//! │                         │                                    │
//! │                  ┌───────────┐                               │
//! │                  │ RedbStore │ (only implementation)         │
//! │                  └───────────┘                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod redb;
pub mod schema;

pub use self::redb::RedbStore;
pub use schema::{ContextHistoryRow, DatabaseMetadata, SCHEMA_VERSION};

use crate::error::Result;
use crate::storage::schema::{
    ContextLinkRow, CustomDataRow, DecisionRow, ProgressRow, SystemPatternRow,
};
use crate::types::{RowId, Timestamp};

/// Which singleton document an operation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextKind {
    Product,
    Active,
}

impl ContextKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ContextKind::Product => "ProductContext",
            ContextKind::Active => "ActiveContext",
        }
    }
}

/// Relational store trait for the engine.
///
/// This trait defines the contract a storage backend must implement to
/// back one workspace. The only implementation is [`RedbStore`].
/// Implementations must be `Send + Sync`; the workspace registry handles
/// sharing across threads.
pub trait RelationalStore: Send + Sync {
    // ---- lifecycle -------------------------------------------------

    fn metadata(&self) -> DatabaseMetadata;

    // ---- singleton context documents + history (C4/C5) -------------

    /// Returns the current content of the given singleton document
    /// (`{}` if it has never been written).
    fn get_context(&self, kind: ContextKind) -> Result<serde_json::Map<String, serde_json::Value>>;

    /// Replaces the singleton document's content.
    ///
    /// If the new content differs from the current content, a history
    /// row is written first (the pre-mutation value, at
    /// `version = prior_max_version + 1`), in the same write transaction
    /// as the content update.
    fn update_context(
        &self,
        kind: ContextKind,
        new_content: serde_json::Map<String, serde_json::Value>,
        change_source: Option<String>,
    ) -> Result<()>;

    /// Lists history rows for a singleton document, most recent first.
    /// `version`, when given, restricts the result to the single row
    /// stamped with that version (empty if no such row exists).
    fn list_context_history(
        &self,
        kind: ContextKind,
        limit: Option<usize>,
        version: Option<u64>,
    ) -> Result<Vec<ContextHistoryRow>>;

    /// Fetches one specific historical version (or the live document if
    /// `version` is `None`), used by `diff_context_versions`.
    fn get_context_version(
        &self,
        kind: ContextKind,
        version: Option<u64>,
    ) -> Result<serde_json::Map<String, serde_json::Value>>;

    // ---- decisions ---------------------------------------------------

    fn create_decision(
        &self,
        summary: String,
        rationale: Option<String>,
        implementation_details: Option<String>,
        tags: Vec<String>,
    ) -> Result<DecisionRow>;

    fn get_decision(&self, id: RowId) -> Result<DecisionRow>;

    fn delete_decision(&self, id: RowId) -> Result<()>;

    /// Lists decisions most-recent-first, optionally filtered to rows
    /// that carry every tag in `tags_filter` and optionally limited.
    fn list_decisions(
        &self,
        limit: Option<usize>,
        tags_filter: Option<&[String]>,
    ) -> Result<Vec<DecisionRow>>;

    // ---- progress entries ---------------------------------------------

    fn create_progress(
        &self,
        status: String,
        description: String,
        parent_id: Option<RowId>,
    ) -> Result<ProgressRow>;

    fn get_progress(&self, id: RowId) -> Result<ProgressRow>;

    /// Updates the given fields; `None` leaves the field unchanged,
    /// `Some(None)` for `parent_id` clears the parent link.
    fn update_progress(
        &self,
        id: RowId,
        status: Option<String>,
        description: Option<String>,
        parent_id: Option<Option<RowId>>,
    ) -> Result<ProgressRow>;

    /// Deletes a progress entry and cascades to every descendant
    /// (`original_source/.../db/models.py`'s ORM relationship is
    /// `cascade="all, delete-orphan"` — the `ON DELETE SET NULL` on the
    /// raw FK never fires because the ORM deletes children before
    /// emitting the parent's `DELETE`, per spec §4.5 "children
    /// cascade-delete"). Returns every deleted id (the root plus all
    /// descendants, in deletion order) so the caller can also remove
    /// their vector-store embeddings.
    fn delete_progress(&self, id: RowId) -> Result<Vec<RowId>>;

    fn list_progress(
        &self,
        limit: Option<usize>,
        status_filter: Option<&str>,
        parent_id_filter: Option<RowId>,
    ) -> Result<Vec<ProgressRow>>;

    // ---- system patterns ---------------------------------------------

    /// Fails with [`crate::error::ConflictError::Duplicate`] if `name` is
    /// already in use.
    fn create_system_pattern(
        &self,
        name: String,
        description: Option<String>,
        tags: Vec<String>,
    ) -> Result<SystemPatternRow>;

    fn get_system_pattern(&self, id: RowId) -> Result<SystemPatternRow>;

    fn delete_system_pattern(&self, id: RowId) -> Result<()>;

    fn list_system_patterns(&self, limit: Option<usize>) -> Result<Vec<SystemPatternRow>>;

    // ---- custom data ---------------------------------------------------

    /// Creates or replaces the row for `(category, key)`.
    fn upsert_custom_data(
        &self,
        category: String,
        key: String,
        value: serde_json::Value,
    ) -> Result<CustomDataRow>;

    fn get_custom_data(&self, category: &str, key: &str) -> Result<CustomDataRow>;

    fn delete_custom_data(&self, category: &str, key: &str) -> Result<()>;

    fn list_custom_data(&self, category_filter: Option<&str>) -> Result<Vec<CustomDataRow>>;

    // ---- context links ---------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn create_link(
        &self,
        source_item_type: String,
        source_item_id: String,
        target_item_type: String,
        target_item_id: String,
        relationship_type: String,
        description: Option<String>,
    ) -> Result<ContextLinkRow>;

    fn get_link(&self, id: RowId) -> Result<ContextLinkRow>;

    fn delete_link(&self, id: RowId) -> Result<()>;

    /// Links where `item_type`/`item_id` appear on either side.
    fn list_links_for_item(
        &self,
        item_type: &str,
        item_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ContextLinkRow>>;

    // ---- cross-entity queries (C6/C7) ----------------------------------

    /// Rows created at or after `since` for each recent-activity
    /// category, most-recent-first, each capped at `limit`.
    fn recent_activity(
        &self,
        since: Option<Timestamp>,
        limit: usize,
    ) -> Result<RecentActivity>;

    // ---- embeddings (vector-store source of truth) ---------------------

    /// Persists (or replaces) the embedding and vector-store metadata for
    /// `item_key` (see [`crate::types::item_key`]).
    fn put_embedding(&self, item_key: &str, embedding: Vec<f32>, metadata: crate::types::JsonMap) -> Result<()>;

    /// Removes the stored embedding for `item_key`, if any.
    fn delete_embedding(&self, item_key: &str) -> Result<()>;

    /// Lists every stored `(item_key, embedding, metadata)` row, used to
    /// rebuild the HNSW graph on workspace open.
    fn list_embeddings(&self) -> Result<Vec<(String, Vec<f32>, crate::types::JsonMap)>>;
}

/// Result of [`RelationalStore::recent_activity`], matching
/// `original_source/.../services/meta_service.py`'s
/// `{decisions, progress, system_patterns}` shape.
#[derive(Clone, Debug, Default)]
pub struct RecentActivity {
    pub decisions: Vec<DecisionRow>,
    pub progress: Vec<ProgressRow>,
    pub system_patterns: Vec<SystemPatternRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_kind_as_str() {
        assert_eq!(ContextKind::Product.as_str(), "ProductContext");
        assert_eq!(ContextKind::Active.as_str(), "ActiveContext");
    }
}
