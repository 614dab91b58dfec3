//! redb table definitions and entity row types for the relational store.
//!
//! Grounded on the teacher's `storage/schema.rs` (const `TableDefinition`s,
//! big-endian-timestamp key encoding for reverse-chronological scans,
//! `DatabaseMetadata` schema-version record) and the exact field sets in
//! `original_source/src/conport/db/models.py`.
//!
//! # Table Layout
//!
//! Each entity has a primary table keyed by `RowId` big-endian bytes, and
//! (where spec §4.5/§4.7 need ordering or uniqueness) a secondary index
//! table. Singleton documents (`ProductContext`/`ActiveContext`) live in a
//! one-row table keyed by the constant `SINGLETON_KEY`.

use redb::TableDefinition;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingDimension;
use crate::types::{JsonMap, RowId, Timestamp};

/// Current schema version. The relational store refuses to open a
/// database stamped with a different version (see [`DatabaseMetadata`]);
/// per `SPEC_FULL.md` §9 Open Question 4, redb has no ALTER-TABLE-style
/// migration path, so "running migrations" reduces to this check plus
/// stamping a fresh database with the current version.
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum size, in bytes, of any single JSON `content`/`value` field.
pub const MAX_CONTENT_SIZE: usize = 256 * 1024;

/// Maximum number of tags on a `Decision` or `SystemPattern`.
pub const MAX_TAGS: usize = 32;

/// Maximum length of a single tag.
pub const MAX_TAG_LENGTH: usize = 100;

/// Maximum length of `CustomData.category` / `CustomData.key`.
pub const MAX_CATEGORY_KEY_LENGTH: usize = 200;

/// Key used for the single row of a singleton table.
pub const SINGLETON_KEY: u8 = 1;

// ============================================================================
// Metadata
// ============================================================================

pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Per-table row-id counters, keyed by table name.
pub const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    pub schema_version: u32,
    pub embedding_dimension: EmbeddingDimension,
    pub created_at: Timestamp,
    pub last_opened_at: Timestamp,
}

impl DatabaseMetadata {
    pub fn new(embedding_dimension: EmbeddingDimension) -> Self {
        let now = Timestamp::now();
        Self {
            schema_version: SCHEMA_VERSION,
            embedding_dimension,
            created_at: now,
            last_opened_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_opened_at = Timestamp::now();
    }

    pub fn is_compatible(&self) -> bool {
        self.schema_version == SCHEMA_VERSION
    }
}

// ============================================================================
// Singleton context documents + history (C4/C5)
// ============================================================================

pub const PRODUCT_CONTEXT_TABLE: TableDefinition<u8, &[u8]> =
    TableDefinition::new("product_context");
pub const ACTIVE_CONTEXT_TABLE: TableDefinition<u8, &[u8]> =
    TableDefinition::new("active_context");

pub const PRODUCT_CONTEXT_HISTORY_TABLE: TableDefinition<u64, &[u8]> =
    TableDefinition::new("product_context_history");
pub const ACTIVE_CONTEXT_HISTORY_TABLE: TableDefinition<u64, &[u8]> =
    TableDefinition::new("active_context_history");

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SingletonContext {
    pub content: JsonMap,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextHistoryRow {
    pub id: RowId,
    pub timestamp: Timestamp,
    pub version: u64,
    pub content: JsonMap,
    pub change_source: Option<String>,
}

// ============================================================================
// Decisions
// ============================================================================

pub const DECISIONS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("decisions");
/// Key: timestamp_be(8) ++ id_be(8). Value: id_be(8). Enables
/// reverse-chronological range scans (teacher's `*_BY_COLLECTIVE` idiom).
pub const DECISIONS_BY_TIME_TABLE: TableDefinition<&[u8; 16], &[u8; 8]> =
    TableDefinition::new("decisions_by_time");

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionRow {
    pub id: RowId,
    pub timestamp: Timestamp,
    pub summary: String,
    pub rationale: Option<String>,
    pub implementation_details: Option<String>,
    pub tags: Vec<String>,
}

// ============================================================================
// Progress entries
// ============================================================================

pub const PROGRESS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("progress");
pub const PROGRESS_BY_TIME_TABLE: TableDefinition<&[u8; 16], &[u8; 8]> =
    TableDefinition::new("progress_by_time");
/// Multimap: parent_id -> child ids, for cascade-on-delete and
/// `get_progress(parent_id_filter)`.
pub const PROGRESS_BY_PARENT_TABLE: redb::MultimapTableDefinition<u64, u64> =
    redb::MultimapTableDefinition::new("progress_by_parent");

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressRow {
    pub id: RowId,
    pub timestamp: Timestamp,
    pub status: String,
    pub description: String,
    pub parent_id: Option<RowId>,
}

// ============================================================================
// System patterns
// ============================================================================

pub const SYSTEM_PATTERNS_TABLE: TableDefinition<u64, &[u8]> =
    TableDefinition::new("system_patterns");
pub const SYSTEM_PATTERNS_BY_TIME_TABLE: TableDefinition<&[u8; 16], &[u8; 8]> =
    TableDefinition::new("system_patterns_by_time");
/// Uniqueness index: name -> id.
pub const SYSTEM_PATTERNS_BY_NAME_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("system_patterns_by_name");

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemPatternRow {
    pub id: RowId,
    pub timestamp: Timestamp,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

// ============================================================================
// Custom data
// ============================================================================

pub const CUSTOM_DATA_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("custom_data");
pub const CUSTOM_DATA_BY_TIME_TABLE: TableDefinition<&[u8; 16], &[u8; 8]> =
    TableDefinition::new("custom_data_by_time");
/// Uniqueness index: "category\0key" -> id, backing the
/// `UniqueConstraint('category', 'key')` from the original schema.
pub const CUSTOM_DATA_BY_CATEGORY_KEY_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("custom_data_by_category_key");
/// Secondary index for `get_custom_data(category filter only)`.
pub const CUSTOM_DATA_BY_CATEGORY_TABLE: redb::MultimapTableDefinition<&str, u64> =
    redb::MultimapTableDefinition::new("custom_data_by_category");

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomDataRow {
    pub id: RowId,
    pub timestamp: Timestamp,
    pub category: String,
    pub key: String,
    pub value: serde_json::Value,
}

/// Composes the `(category, key)` uniqueness-index key.
pub fn category_key_index(category: &str, key: &str) -> String {
    format!("{}\u{0}{}", category, key)
}

// ============================================================================
// Context links
// ============================================================================

pub const CONTEXT_LINKS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("context_links");
pub const CONTEXT_LINKS_BY_TIME_TABLE: TableDefinition<&[u8; 16], &[u8; 8]> =
    TableDefinition::new("context_links_by_time");
/// Multimap: "item_type\0item_id" -> link id, covering lookups from
/// either the source or the target side (a link is indexed twice).
pub const CONTEXT_LINKS_BY_ITEM_TABLE: redb::MultimapTableDefinition<&str, u64> =
    redb::MultimapTableDefinition::new("context_links_by_item");

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextLinkRow {
    pub id: RowId,
    pub timestamp: Timestamp,
    pub source_item_type: String,
    pub source_item_id: String,
    pub target_item_type: String,
    pub target_item_id: String,
    pub relationship_type: String,
    pub description: Option<String>,
}

/// Composes the `(item_type, item_id)` secondary-index key.
pub fn item_index_key(item_type: &str, item_id: &str) -> String {
    format!("{}\u{0}{}", item_type, item_id)
}

// ============================================================================
// Embeddings (vector-store source of truth)
// ============================================================================

/// Keyed by the stable `"<item_type>_<row_id>"` string (see
/// `crate::types::item_key`). This table is the durable source of truth
/// for the HNSW graph: on workspace open, the vector index is rebuilt
/// from these rows rather than trusting a possibly-stale on-disk graph
/// dump (spec §4.1, "load or rebuild the vector collection").
pub const EMBEDDINGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("embeddings");

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingRow {
    pub embedding: Vec<f32>,
    pub metadata: JsonMap,
}

// ============================================================================
// Key encoding helpers
// ============================================================================

/// Encodes a (Timestamp, RowId) tuple for a `*_by_time` index.
///
/// Format: `[timestamp_be: 8 bytes][id_be: 8 bytes]` = 16 bytes.
/// Big-endian timestamp ensures lexicographic ordering matches time
/// ordering; the trailing id breaks ties between same-millisecond rows.
#[inline]
pub fn encode_time_id_key(timestamp: Timestamp, id: RowId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&timestamp.to_be_bytes());
    key[8..16].copy_from_slice(&id.to_be_bytes());
    key
}

#[inline]
pub fn decode_id_from_time_key(key: &[u8; 16]) -> RowId {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&key[8..16]);
    RowId::from_be_bytes(bytes)
}

/// Full-range bounds for a `*_by_time` index scan.
#[inline]
pub fn time_range_start() -> [u8; 16] {
    encode_time_id_key(Timestamp::from_millis(0), RowId::new(0))
}

#[inline]
pub fn time_range_end() -> [u8; 16] {
    encode_time_id_key(Timestamp::from_millis(i64::MAX), RowId::new(u64::MAX))
}

/// Range start for "since" queries: every row at or after `since`.
#[inline]
pub fn time_range_since(since: Timestamp) -> [u8; 16] {
    encode_time_id_key(since, RowId::new(0))
}
