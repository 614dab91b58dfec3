//! Configuration types for the engine.
//!
//! [`EngineConfig`] controls workspace-engine-wide behavior: the
//! embedding provider/dimension, HNSW tuning, relational cache size,
//! durability mode, and default list limits. Kept in the teacher's
//! `Config` style — `Default` impl with documented defaults, a
//! `validate()` method invoked once by the registry on first acquire,
//! struct-update-syntax friendly.
//!
//! # Example
//! ```rust
//! use novaport_engine::{EngineConfig, EmbeddingProvider, EmbeddingDimension, SyncMode};
//!
//! let config = EngineConfig::default();
//!
//! let config = EngineConfig {
//!     embedding_dimension: EmbeddingDimension::D768,
//!     cache_size_mb: 128,
//!     sync_mode: SyncMode::Normal,
//!     ..Default::default()
//! };
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Engine-wide configuration.
///
/// All fields have sensible defaults; use struct update syntax to
/// override specific settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Where embeddings for semantic search come from.
    pub embedding_provider: EmbeddingProvider,

    /// Dimensionality of embedding vectors. Fixed per database once
    /// created; changing it later requires a fresh workspace directory.
    pub embedding_dimension: EmbeddingDimension,

    /// Approximate relational-store page cache budget, in megabytes.
    /// Must be non-zero.
    pub cache_size_mb: u32,

    /// Durability/fsync trade-off for the relational store.
    pub sync_mode: SyncMode,

    /// HNSW index tuning parameters.
    pub hnsw: HnswConfig,

    /// Default page size for list-style operations (`get_decisions`,
    /// `get_progress`, ...) when the caller doesn't specify a limit.
    pub default_list_limit: usize,

    /// Default number of items `get_recent_activity_summary` returns per
    /// category when the caller doesn't specify a limit.
    pub default_recent_activity_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            embedding_provider: EmbeddingProvider::External,
            embedding_dimension: EmbeddingDimension::D384,
            cache_size_mb: 64,
            sync_mode: SyncMode::Normal,
            hnsw: HnswConfig::default(),
            default_list_limit: 100,
            default_recent_activity_limit: 5,
        }
    }
}

impl EngineConfig {
    /// Validates this configuration, returning a [`ValidationError`] that
    /// describes the first problem found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cache_size_mb == 0 {
            return Err(ValidationError::invalid_field(
                "cache_size_mb",
                "must be greater than 0",
            ));
        }
        if let EmbeddingDimension::Custom(dim) = self.embedding_dimension {
            if dim == 0 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must be greater than 0",
                ));
            }
            if dim > 4096 {
                return Err(ValidationError::invalid_field(
                    "embedding_dimension",
                    "custom dimension must not exceed 4096",
                ));
            }
        }
        if self.default_list_limit == 0 {
            return Err(ValidationError::invalid_field(
                "default_list_limit",
                "must be greater than 0",
            ));
        }
        self.hnsw.validate()?;
        Ok(())
    }
}

/// Where embeddings come from.
///
/// The engine never loads a model itself (spec §1 places the
/// embedding-model loader out of scope) — it only ever calls
/// [`crate::embedding::EmbeddingService::embed`]. This enum exists so
/// callers can declare their choice alongside the rest of the config and
/// have it persisted in workspace metadata for dimension-mismatch
/// detection on reopen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// The caller supplies pre-computed embeddings for every call that
    /// needs one. [`crate::embedding::ExternalEmbedding`] enforces this
    /// by returning an error from `embed`/`embed_batch`.
    External,
}

impl EmbeddingProvider {
    pub fn is_external(self) -> bool {
        matches!(self, EmbeddingProvider::External)
    }
}

/// Embedding vector dimensionality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingDimension {
    D384,
    D768,
    Custom(usize),
}

impl EmbeddingDimension {
    pub fn value(self) -> usize {
        match self {
            EmbeddingDimension::D384 => 384,
            EmbeddingDimension::D768 => 768,
            EmbeddingDimension::Custom(d) => d,
        }
    }
}

/// Durability/fsync trade-off, passed through to the relational store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// fsync on every commit. Safest, slowest.
    Paranoid,
    /// redb's default durability.
    Normal,
    /// Relaxed durability for throughput-sensitive batch workloads.
    Fast,
}

impl SyncMode {
    pub fn is_paranoid(self) -> bool {
        matches!(self, SyncMode::Paranoid)
    }

    pub fn is_fast(self) -> bool {
        matches!(self, SyncMode::Fast)
    }

    pub(crate) fn to_redb_durability(self) -> redb::Durability {
        match self {
            SyncMode::Paranoid => redb::Durability::Paranoid,
            SyncMode::Normal => redb::Durability::Immediate,
            SyncMode::Fast => redb::Durability::Eventual,
        }
    }
}

/// HNSW index tuning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Max number of bidirectional links per node (graph layer 0 uses
    /// `2 * max_nb_connection`).
    pub max_nb_connection: usize,
    /// Number of candidates considered during index construction.
    pub ef_construction: usize,
    /// Number of candidates considered during search, absent an explicit
    /// per-call override.
    pub ef_search: usize,
    /// Expected max number of elements, used to size the initial graph.
    pub max_elements: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            max_nb_connection: 16,
            ef_construction: 200,
            ef_search: 64,
            max_elements: 100_000,
        }
    }
}

impl HnswConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_nb_connection == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.max_nb_connection",
                "must be greater than 0",
            ));
        }
        if self.ef_construction == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_construction",
                "must be greater than 0",
            ));
        }
        if self.ef_search == 0 {
            return Err(ValidationError::invalid_field(
                "hnsw.ef_search",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn default_provider_is_external() {
        assert!(EngineConfig::default().embedding_provider.is_external());
    }

    #[test]
    fn default_dimension_is_384() {
        assert_eq!(EngineConfig::default().embedding_dimension.value(), 384);
    }

    #[test]
    fn zero_cache_size_is_invalid() {
        let config = EngineConfig {
            cache_size_mb: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_custom_dimension_is_invalid() {
        let config = EngineConfig {
            embedding_dimension: EmbeddingDimension::Custom(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_custom_dimension_is_invalid() {
        let config = EngineConfig {
            embedding_dimension: EmbeddingDimension::Custom(5000),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn sync_mode_predicates() {
        assert!(SyncMode::Fast.is_fast());
        assert!(!SyncMode::Fast.is_paranoid());
        assert!(SyncMode::Paranoid.is_paranoid());
    }

    #[test]
    fn hnsw_config_zero_fields_invalid() {
        let mut cfg = HnswConfig::default();
        cfg.max_nb_connection = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_list_limits() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.default_list_limit, 100);
        assert_eq!(cfg.default_recent_activity_limit, 5);
    }
}
