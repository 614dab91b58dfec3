//! # novaport-engine
//!
//! Embedded, multi-workspace context engine for coding agents — the
//! structured memory substrate an agent keeps its project knowledge in
//! between sessions.
//!
//! Each workspace is an isolated pair of stores: a relational store
//! (decisions, progress entries, system patterns, custom data, context
//! links, and two singleton context documents with version history) and
//! a vector store (one embedding per semantically-indexed row, kept in
//! lockstep with its relational counterpart). Workspaces are opened
//! lazily and cached for the life of the process.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use novaport_engine::{EngineConfig, WorkspaceRegistry};
//! use novaport_engine::entities::decision;
//!
//! let registry = WorkspaceRegistry::with_default_embedding(EngineConfig::default());
//! let workspace = registry.acquire("/home/user/my-project")?;
//!
//! let row = decision::create(
//!     &workspace,
//!     "Use Postgres for storage".to_string(),
//!     Some("mature ecosystem".to_string()),
//!     None,
//!     vec!["db".to_string()],
//! )?;
//! # Ok::<(), novaport_engine::EngineError>(())
//! ```
//!
//! Callers that speak JSON (an MCP-style tool surface, an HTTP handler)
//! go through [`tools::dispatch`] instead of the entity services
//! directly — it is the single place argument validation, workspace
//! resolution, and error-kind mapping happen.
//!
//! ## Key concepts
//!
//! ### Workspace
//!
//! A **workspace** is an isolated namespace identified by an opaque
//! string (in practice, a project's absolute path). Each workspace owns
//! its own on-disk relational store and vector index under
//! `<workspace_id>/.novaport_data/`.
//!
//! ### Dual-store consistency
//!
//! Every semantically-indexed entity (decisions, progress entries,
//! system patterns, custom data) has a stable vector-store id of the
//! form `"<item_type>_<row_id>"`. The relational write always commits
//! first; the vector-store upsert is a separate, best-effort step that
//! never shares a transaction with the relational write (see
//! [`entities`]'s module docs).
//!
//! ### Embedding providers
//!
//! The engine never computes embeddings itself — [`embedding::EmbeddingService`]
//! is an external seam every deployment plugs its own model or API call
//! into. See [`config::EmbeddingProvider`].
//!
//! ## Features
//!
//! - `http-demo` — builds the `http_surface` demonstration binary under
//!   `demos/`, showing one way to expose the tool surface over HTTP.
//!   Not part of the library's documented surface.
//! - `sync` — enables the `tokio` time/sync/macros features used by the
//!   `http-demo` binary's async runtime.
//!
//! ## Thread safety
//!
//! [`WorkspaceRegistry`] is `Send + Sync` and meant to be shared across
//! threads behind an `Arc`; it synchronizes workspace initialization
//! internally. Once open, a workspace's storage and vector index are
//! themselves `Send + Sync` (single-writer/multi-reader via `redb`, a
//! `RwLock`-guarded HNSW graph).

#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============================================================================
// Module declarations
// ============================================================================

pub mod batch;
pub mod config;
pub mod embedding;
pub mod entities;
pub mod error;
pub mod importexport;
pub mod search;
pub mod storage;
pub mod tools;
pub mod types;
pub mod vector;
pub mod workspace;

// ============================================================================
// Public API re-exports
// ============================================================================

// Configuration
pub use config::{EmbeddingDimension, EmbeddingProvider, EngineConfig, HnswConfig, SyncMode};

// Error handling
pub use error::{ConflictError, EngineError, ErrorKind, NotFoundError, Result, StorageError, ValidationError};

// Core types
pub use types::{item_key, parse_item_key, Embedding, ItemType, JsonMap, RowId, Timestamp, WorkspaceId};

// Workspace registry
pub use workspace::{WorkspaceHandle, WorkspaceRegistry};

// Storage (for advanced users who want to call the trait directly)
pub use storage::{ContextKind, DatabaseMetadata, RecentActivity, RelationalStore};

// Tool surface
pub use tools::{dispatch, ToolName};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common `novaport-engine` usage.
///
/// ```rust
/// use novaport_engine::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::error::{EngineError, Result};
    pub use crate::tools::{dispatch, ToolName};
    pub use crate::types::{ItemType, RowId, Timestamp, WorkspaceId};
    pub use crate::workspace::{WorkspaceHandle, WorkspaceRegistry};
}
