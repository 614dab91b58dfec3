//! Shared fixtures for integration tests: a deterministic embedding
//! stub (no test here plugs in a real model) and a registry/workspace
//! builder wired to it.

use std::sync::Arc;

use novaport_engine::config::{EmbeddingDimension, EngineConfig};
use novaport_engine::embedding::EmbeddingService;
use novaport_engine::{Embedding, Result, WorkspaceHandle, WorkspaceRegistry};

pub const DIMENSION: usize = 8;

/// Returns a fixed, non-erroring vector regardless of input text — good
/// enough to exercise dual-store wiring and filter composition without a
/// real model.
pub struct FixedEmbedding;

impl EmbeddingService for FixedEmbedding {
    fn embed(&self, _text: &str) -> Result<Embedding> {
        Ok(vec![0.1; DIMENSION])
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> u16 {
        DIMENSION as u16
    }
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        embedding_dimension: EmbeddingDimension::Custom(DIMENSION),
        ..EngineConfig::default()
    }
}

pub fn test_registry() -> WorkspaceRegistry {
    WorkspaceRegistry::new(test_config(), Arc::new(FixedEmbedding))
}

/// A registry plus one already-open workspace backed by a fresh temp
/// directory. The `TempDir` guard must stay alive for the workspace's
/// on-disk store to remain valid.
pub fn open_workspace() -> (tempfile::TempDir, WorkspaceRegistry, Arc<WorkspaceHandle>) {
    let dir = tempfile::tempdir().unwrap();
    let registry = test_registry();
    let workspace = registry.acquire(dir.path().to_string_lossy().to_string()).unwrap();
    (dir, registry, workspace)
}
