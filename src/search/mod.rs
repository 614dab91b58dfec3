//! Search Service (C7): structured list filters, full-text search, and
//! semantic search, sharing no runtime state with one another (spec
//! §4.7). Each submodule is one of the three query paths:
//!
//! - structured list filters live on [`crate::storage::RelationalStore`]
//!   itself (tag/status/parent/since filters are storage-layer scans);
//! - [`fts`] ranks relational rows by token overlap, with a
//!   substring-match fallback;
//! - [`filter`] is the metadata-filter algebra semantic search uses, and
//!   [`semantic`] composes it from the public tool parameters.

pub mod filter;
pub mod fts;
pub mod semantic;

pub use filter::FilterExpr;
pub use semantic::{build_filter, execute as semantic_search, SemanticSearchParams, DEFAULT_TOP_K, MAX_TOP_K, MIN_TOP_K};
