//! HNSW vector index implementation using `hnsw_rs`.
//!
//! Wraps `hnsw_rs::Hnsw<f32, DistCosine>` with:
//! - bidirectional stable-id (`"<type>_<row_id>"`, see [`crate::types::item_key`])
//!   ↔ `usize` internal-id mapping,
//! - soft-delete via `HashSet` + filtered search,
//! - sanitized metadata kept alongside each vector for [`FilterExpr`]
//!   evaluation at query time,
//! - JSON metadata persistence (`.hnsw.meta`).
//!
//! Grounded on the teacher's `HnswIndex` (same graph wrapper, same
//! soft-delete-by-internal-id strategy, same on-disk metadata file); the
//! teacher's `ExperienceId` UUID key is replaced by the stable string id
//! spec §4.3 requires. One `HnswIndex` backs one workspace's single
//! `conport_default` collection (spec §4.3), not one per entity type —
//! entity type is just another metadata field (`item_type`), filtered on
//! like any other.
//!
//! # Thread Safety
//!
//! The `hnsw_rs::Hnsw` graph uses an internal lock, so `insert` takes
//! `&self`. Our id/metadata bookkeeping (`IndexState`) is protected by a
//! `std::sync::RwLock`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::RwLock;

use hnsw_rs::prelude::*;

use crate::config::HnswConfig;
use crate::error::{EngineError, Result};
use crate::search::filter::FilterExpr;
use crate::types::JsonMap;

use super::VectorIndex;

/// A hit from [`HnswIndex::search_filtered_meta`] / plain search.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct VectorHit {
    pub id: String,
    pub distance: f32,
    pub metadata: JsonMap,
}

/// Newtype wrapper that bridges `&dyn Fn(&usize) -> bool` to `FilterT`.
///
/// `hnsw_rs`'s blanket impl `impl<F: Fn(&DataId) -> bool> FilterT for F`
/// only covers concrete closure types, not `&dyn Fn` trait objects, so
/// this wrapper re-implements `FilterT` by delegating to the boxed
/// closure.
struct FilterBridge<'a>(&'a (dyn Fn(&usize) -> bool + Sync));

impl FilterT for FilterBridge<'_> {
    fn hnsw_filter(&self, id: &DataId) -> bool {
        (self.0)(id)
    }
}

/// HNSW vector index backed by `hnsw_rs`.
///
/// One instance per workspace. Internal `usize` ids are assigned
/// sequentially and never reused within a process lifetime; the stable
/// external id (`item_key`) is what every caller outside this module
/// ever sees.
pub struct HnswIndex {
    /// `'static` because all data is heap-owned (never memory-mapped).
    hnsw: Hnsw<'static, f32, DistCosine>,

    state: RwLock<IndexState>,

    config: HnswConfig,

    dimension: usize,
}

#[derive(Debug)]
struct IndexState {
    id_to_internal: HashMap<String, usize>,
    internal_to_id: Vec<String>,
    metadata: HashMap<String, JsonMap>,
    deleted: HashSet<usize>,
    next_id: usize,
}

/// Serializable metadata for persistence (`.hnsw.meta`).
#[derive(serde::Serialize, serde::Deserialize)]
pub(crate) struct IndexMetadata {
    pub(crate) dimension: usize,
    pub(crate) next_id: usize,
    /// (stable item id, internal id) pairs.
    pub(crate) id_map: Vec<(String, usize)>,
    /// Stable item ids for soft-deleted entries. Stored by stable id
    /// (not internal id) because internal ids are reassigned on rebuild.
    pub(crate) deleted: Vec<String>,
    /// Sanitized metadata per stable item id.
    pub(crate) metadata: Vec<(String, JsonMap)>,
}

impl HnswIndex {
    /// Creates a new empty HNSW index.
    pub fn new(dimension: usize, config: &HnswConfig) -> Self {
        let max_layer = Self::max_layer_for(config.max_elements);
        let hnsw = Hnsw::new(
            config.max_nb_connection,
            config.max_elements,
            max_layer,
            config.ef_construction,
            DistCosine,
        );

        Self {
            hnsw,
            state: RwLock::new(IndexState {
                id_to_internal: HashMap::new(),
                internal_to_id: Vec::new(),
                metadata: HashMap::new(),
                deleted: HashSet::new(),
                next_id: 0,
            }),
            config: config.clone(),
            dimension,
        }
    }

    /// A reasonable graph-layer count for `max_elements` nodes, per
    /// `hnsw_rs`'s own rule of thumb (`log2(n)`, floored at 4).
    fn max_layer_for(max_elements: usize) -> usize {
        (max_elements as f64).log2().ceil().max(4.0) as usize
    }

    /// Upserts an item's embedding and metadata.
    ///
    /// If `item_id` is already present, the previous internal node is
    /// soft-deleted and a fresh one is inserted — `hnsw_rs` has no
    /// in-place vector update, so "upsert" here means "replace the
    /// active node for this id," satisfying spec §3 invariant 1 (at
    /// most one active embedding per stable id).
    pub fn upsert_item(&self, item_id: &str, embedding: &[f32], metadata: JsonMap) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EngineError::vector(format!(
                "embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| EngineError::vector("index state lock poisoned"))?;

        if let Some(&old_internal) = state.id_to_internal.get(item_id) {
            state.deleted.insert(old_internal);
        }

        let internal_id = state.next_id;
        state.next_id += 1;
        state.id_to_internal.insert(item_id.to_string(), internal_id);
        state.internal_to_id.push(item_id.to_string());
        state.metadata.insert(item_id.to_string(), metadata);

        drop(state);

        self.hnsw.insert((embedding, internal_id));
        Ok(())
    }

    /// Marks an item as deleted. Idempotent — missing ids are not an
    /// error, per spec §4.3.
    pub fn delete_item(&self, item_id: &str) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| EngineError::vector("index state lock poisoned"))?;
        if let Some(&internal_id) = state.id_to_internal.get(item_id) {
            state.deleted.insert(internal_id);
        }
        state.metadata.remove(item_id);
        Ok(())
    }

    /// Returns the sanitized metadata stored for `item_id`, if present
    /// and not deleted.
    pub fn metadata_for(&self, item_id: &str) -> Option<JsonMap> {
        let state = self.state.read().ok()?;
        let internal = *state.id_to_internal.get(item_id)?;
        if state.deleted.contains(&internal) {
            return None;
        }
        state.metadata.get(item_id).cloned()
    }

    /// Searches for the `k` nearest items, excluding deleted ones and
    /// any that fail `filter` (when provided). Per spec §4.3, an empty
    /// or missing collection returns `[]`, never an error for "no
    /// matches."
    pub fn search_filtered_meta(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<VectorHit>> {
        if query.len() != self.dimension {
            return Err(EngineError::vector(format!(
                "query dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }

        let state = self
            .state
            .read()
            .map_err(|_| EngineError::vector("index state lock poisoned"))?;

        if state.id_to_internal.is_empty() {
            return Ok(Vec::new());
        }

        let deleted_ref = &state.deleted;
        let metadata_ref = &state.metadata;
        let internal_to_id = &state.internal_to_id;

        let predicate = |internal_id: &usize| -> bool {
            if deleted_ref.contains(internal_id) {
                return false;
            }
            let Some(filter) = filter else { return true };
            internal_to_id
                .get(*internal_id)
                .and_then(|id| metadata_ref.get(id))
                .is_some_and(|meta| filter.matches(meta))
        };

        let results = self.hnsw.search_filter(query, k, ef_search, Some(&predicate));

        let hits = results
            .into_iter()
            .filter_map(|n| {
                let id = internal_to_id.get(n.d_id)?.clone();
                let metadata = metadata_ref.get(&id).cloned().unwrap_or_default();
                Some(VectorHit {
                    id,
                    distance: n.distance,
                    metadata,
                })
            })
            .collect();

        Ok(hits)
    }

    /// Returns true if `item_id` is present and not deleted.
    pub fn contains(&self, item_id: &str) -> bool {
        let state = self.state.read().ok();
        state.is_some_and(|s| {
            s.id_to_internal
                .get(item_id)
                .is_some_and(|id| !s.deleted.contains(id))
        })
    }

    /// Number of active (non-deleted) vectors.
    pub fn active_count(&self) -> usize {
        let state = self.state.read().ok();
        state.map_or(0, |s| s.id_to_internal.len() - s.deleted.len())
    }

    /// Total vectors including deleted ones.
    pub fn total_count(&self) -> usize {
        self.hnsw.get_nb_point()
    }

    /// This index's configured default `ef_search` (candidates considered
    /// per query), absent an explicit per-call override.
    pub fn ef_search(&self) -> usize {
        self.config.ef_search
    }

    /// Rebuilds an index from `(item_id, embedding, metadata)` triples —
    /// used by the registry to reconstruct a workspace's collection from
    /// the relational store (the source of truth) on first acquire.
    pub fn rebuild_from_items(
        dimension: usize,
        config: &HnswConfig,
        items: Vec<(String, Vec<f32>, JsonMap)>,
    ) -> Result<Self> {
        let index = Self::new(dimension, config);
        if items.is_empty() {
            return Ok(index);
        }

        let mut state = index
            .state
            .write()
            .map_err(|_| EngineError::vector("index state lock poisoned"))?;

        let mut batch: Vec<(&Vec<f32>, usize)> = Vec::with_capacity(items.len());
        for (item_id, embedding, metadata) in &items {
            let internal_id = state.next_id;
            state.next_id += 1;
            state.id_to_internal.insert(item_id.clone(), internal_id);
            state.internal_to_id.push(item_id.clone());
            state.metadata.insert(item_id.clone(), metadata.clone());
            batch.push((embedding, internal_id));
        }
        drop(state);

        index.hnsw.parallel_insert(&batch);
        Ok(index)
    }

    /// Saves index metadata (id map, deleted set, metadata) to
    /// `{dir}/{name}.hnsw.meta`. The graph itself is always rebuilt from
    /// the relational store on open (see module docs), so only the
    /// bookkeeping needs to survive a restart.
    pub fn save_to_dir(&self, dir: &Path, name: &str) -> Result<()> {
        fs::create_dir_all(dir)
            .map_err(|e| EngineError::vector(format!("failed to create vector dir: {e}")))?;

        let state = self
            .state
            .read()
            .map_err(|_| EngineError::vector("index state lock poisoned"))?;

        let metadata = IndexMetadata {
            dimension: self.dimension,
            next_id: state.next_id,
            id_map: state
                .id_to_internal
                .iter()
                .map(|(id, &internal)| (id.clone(), internal))
                .collect(),
            deleted: state
                .deleted
                .iter()
                .filter_map(|&internal| state.internal_to_id.get(internal).cloned())
                .collect(),
            metadata: state
                .metadata
                .iter()
                .map(|(id, meta)| (id.clone(), meta.clone()))
                .collect(),
        };

        let meta_path = dir.join(format!("{name}.hnsw.meta"));
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| EngineError::vector(format!("failed to serialize vector metadata: {e}")))?;
        fs::write(&meta_path, json)
            .map_err(|e| EngineError::vector(format!("failed to write vector metadata: {e}")))?;

        Ok(())
    }

    /// Loads persisted metadata (id map, deleted set, field metadata),
    /// if present. Returns `None` when there is nothing on disk yet.
    pub(crate) fn load_metadata(dir: &Path, name: &str) -> Result<Option<IndexMetadata>> {
        let meta_path = dir.join(format!("{name}.hnsw.meta"));
        if !meta_path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&meta_path)
            .map_err(|e| EngineError::vector(format!("failed to read vector metadata: {e}")))?;
        let metadata: IndexMetadata = serde_json::from_str(&json)
            .map_err(|e| EngineError::vector(format!("failed to parse vector metadata: {e}")))?;
        Ok(Some(metadata))
    }

    /// Removes persisted vector-index files for a workspace's collection.
    pub fn remove_files(dir: &Path, name: &str) -> Result<()> {
        let meta_path = dir.join(format!("{name}.hnsw.meta"));
        if meta_path.exists() {
            fs::remove_file(&meta_path)
                .map_err(|e| EngineError::vector(format!("failed to remove vector metadata: {e}")))?;
        }
        Ok(())
    }
}

// ==========================================================================
// VectorIndex trait implementation (low-level usize-keyed operations)
// ==========================================================================

impl VectorIndex for HnswIndex {
    fn insert(&self, id: usize, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EngineError::vector(format!(
                "embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }
        self.hnsw.insert((embedding, id));
        Ok(())
    }

    fn insert_batch(&self, items: &[(&Vec<f32>, usize)]) -> Result<()> {
        self.hnsw.parallel_insert(items);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize, ef_search: usize) -> Result<Vec<(usize, f32)>> {
        let results = self.hnsw.search(query, k, ef_search);
        Ok(results.into_iter().map(|n| (n.d_id, n.distance)).collect())
    }

    fn search_filtered(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
        filter: &(dyn Fn(&usize) -> bool + Sync),
    ) -> Result<Vec<(usize, f32)>> {
        let bridge = FilterBridge(filter);
        let results = self.hnsw.search_filter(query, k, ef_search, Some(&bridge));
        Ok(results.into_iter().map(|n| (n.d_id, n.distance)).collect())
    }

    fn delete(&self, id: usize) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| EngineError::vector("index state lock poisoned"))?;
        state.deleted.insert(id);
        Ok(())
    }

    fn is_deleted(&self, id: usize) -> bool {
        self.state.read().ok().is_some_and(|s| s.deleted.contains(&id))
    }

    fn len(&self) -> usize {
        self.active_count()
    }

    fn save(&self, dir: &Path, name: &str) -> Result<()> {
        self.save_to_dir(dir, name)
    }
}

// ==========================================================================
// Tests
// ==========================================================================
