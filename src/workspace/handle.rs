//! Per-workspace bundle of relational store, vector index, and embedding
//! service (spec §4.1).
//!
//! Grounded on the teacher's `PulseDB` struct (`storage` + `embedding` +
//! `vectors` fields, `hnsw_dir`/`load_all_indexes`/`close` lifecycle in
//! `db.rs`), narrowed from "one database holding many collectives" to
//! "one handle per workspace, holding exactly one vector collection."

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{instrument, warn};

use crate::embedding::EmbeddingService;
use crate::error::Result;
use crate::storage::RelationalStore;
use crate::types::WorkspaceId;
use crate::vector::HnswIndex;

/// Directory name, under a workspace's data directory, holding the HNSW
/// index files.
const VECTOR_DIR_NAME: &str = "vectordb";

/// The index name used within [`VECTOR_DIR_NAME`] — one workspace has
/// exactly one vector collection, so this is a fixed constant rather than
/// a per-collection identifier (contrast the teacher's per-collective
/// `collective_id.to_string()` file naming).
const INDEX_NAME: &str = "context";

/// Live state for one workspace: its relational store, its vector index,
/// and the embedding service shared across every workspace the owning
/// [`crate::workspace::WorkspaceRegistry`] has opened.
pub struct WorkspaceHandle {
    workspace_id: WorkspaceId,
    storage: Box<dyn RelationalStore>,
    vectors: HnswIndex,
    embedding: Arc<dyn EmbeddingService>,
    data_dir: PathBuf,
}

impl std::fmt::Debug for WorkspaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceHandle")
            .field("workspace_id", &self.workspace_id)
            .field("data_dir", &self.data_dir)
            .field("active_vectors", &self.vectors.active_count())
            .finish_non_exhaustive()
    }
}

impl WorkspaceHandle {
    pub(crate) fn new(
        workspace_id: WorkspaceId,
        storage: Box<dyn RelationalStore>,
        vectors: HnswIndex,
        embedding: Arc<dyn EmbeddingService>,
        data_dir: PathBuf,
    ) -> Self {
        Self {
            workspace_id,
            storage,
            vectors,
            embedding,
            data_dir,
        }
    }

    pub fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    pub fn storage(&self) -> &dyn RelationalStore {
        self.storage.as_ref()
    }

    pub fn vectors(&self) -> &HnswIndex {
        &self.vectors
    }

    pub fn embedding(&self) -> &dyn EmbeddingService {
        self.embedding.as_ref()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory the HNSW index metadata is saved to/loaded from.
    pub fn vector_dir(&self) -> PathBuf {
        self.data_dir.join(VECTOR_DIR_NAME)
    }

    pub fn index_name(&self) -> &'static str {
        INDEX_NAME
    }

    /// Persists HNSW metadata (id map + deleted set) to disk. The
    /// vectors themselves remain durable in the relational store, so a
    /// failure here only costs a graph rebuild on next open — mirrors
    /// the teacher's `close()` "save is best-effort, rebuild on next
    /// open" comment in `db.rs`.
    #[instrument(skip(self), fields(workspace_id = %self.workspace_id))]
    pub fn save_vectors(&self) -> Result<()> {
        let dir = self.vector_dir();
        if let Err(err) = self.vectors.save_to_dir(&dir, INDEX_NAME) {
            warn!(%err, "failed to save HNSW index metadata; will rebuild on next open");
            return Err(err);
        }
        Ok(())
    }
}
