//! Embedding service abstraction.
//!
//! Spec §1 places the embedding-model loader out of scope: the engine
//! only ever calls [`EmbeddingService::embed`]/[`EmbeddingService::embed_batch`].
//! The model (whatever it is) is loaded once by the caller and handed to
//! the registry as a `Arc<dyn EmbeddingService>`, shared read-only across
//! workspaces for the lifetime of the process (spec §5 "Shared resources").
//!
//! # Example
//!
//! ```rust,ignore
//! use novaport_engine::embedding::{EmbeddingService, ExternalEmbedding};
//!
//! let service = ExternalEmbedding::new(384);
//! assert_eq!(service.dimension(), 384);
//! assert!(service.embed("hello").is_err());
//! ```

use crate::error::{EngineError, Result, ValidationError};
use crate::types::Embedding;

/// Embedding service trait for generating vector representations of text.
///
/// Implementations must be thread-safe (`Send + Sync`): the registry
/// shares one instance across every workspace and every request.
///
/// # Implementing a custom provider
///
/// ```rust,ignore
/// use novaport_engine::embedding::EmbeddingService;
/// use novaport_engine::{Embedding, Result};
///
/// struct MyEmbeddingService { dimension: u16 }
///
/// impl EmbeddingService for MyEmbeddingService {
///     fn embed(&self, text: &str) -> Result<Embedding> {
///         todo!("call out to the actual model")
///     }
///     fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
///         texts.iter().map(|t| self.embed(t)).collect()
///     }
///     fn dimension(&self) -> u16 { self.dimension }
/// }
/// ```
pub trait EmbeddingService: Send + Sync {
    /// Generates an embedding for a single text.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Embedding`] if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Embedding>;

    /// Generates embeddings for multiple texts in one call.
    ///
    /// Batch processing is typically cheaper than individual calls due to
    /// reduced per-call overhead.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Returns the dimension of embeddings produced by this service.
    fn dimension(&self) -> u16;

    /// Validates that an embedding has the expected dimension.
    fn validate_embedding(&self, embedding: &Embedding) -> Result<()> {
        let expected = self.dimension() as usize;
        let actual = embedding.len();
        if actual != expected {
            return Err(EngineError::Validation(ValidationError::dimension_mismatch(
                expected, actual,
            )));
        }
        Ok(())
    }
}

/// Embedding provider for callers who only ever supply pre-computed
/// vectors (the only [`crate::config::EmbeddingProvider`] variant this
/// engine knows about — see its doc comment for why).
///
/// Exists mainly as a validating placeholder: real deployments plug in
/// their own [`EmbeddingService`] (wrapping an HTTP call, a local model,
/// whatever); `embed`/`embed_batch` on this type always fail, since there
/// is nothing to compute from.
///
/// # Example
///
/// ```rust
/// use novaport_engine::embedding::{EmbeddingService, ExternalEmbedding};
///
/// let service = ExternalEmbedding::new(1536); // e.g. OpenAI text-embedding-3-small
/// assert_eq!(service.dimension(), 1536);
/// ```
#[derive(Clone, Debug)]
pub struct ExternalEmbedding {
    dimension: u16,
}

impl ExternalEmbedding {
    /// Creates a new external embedding placeholder with the given
    /// dimension.
    pub fn new(dimension: u16) -> Self {
        Self { dimension }
    }
}

impl EmbeddingService for ExternalEmbedding {
    fn embed(&self, _text: &str) -> Result<Embedding> {
        Err(EngineError::embedding(
            "no embedding service configured: the engine was opened with the default \
             ExternalEmbedding placeholder, which never computes vectors",
        ))
    }

    fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Embedding>> {
        Err(EngineError::embedding(
            "no embedding service configured: the engine was opened with the default \
             ExternalEmbedding placeholder, which never computes vectors",
        ))
    }

    fn dimension(&self) -> u16 {
        self.dimension
    }
}

/// Builds the default embedding service for an [`crate::config::EngineConfig`].
///
/// Real deployments should construct their own [`EmbeddingService`] and
/// pass it to [`crate::workspace::WorkspaceRegistry::new`] directly; this
/// helper only exists to give the registry something non-panicking to
/// fall back to when a caller doesn't supply one.
pub fn default_embedding_service(config: &crate::config::EngineConfig) -> Box<dyn EmbeddingService> {
    Box::new(ExternalEmbedding::new(config.embedding_dimension.value() as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_embedding_dimension() {
        let service = ExternalEmbedding::new(384);
        assert_eq!(service.dimension(), 384);
    }

    #[test]
    fn external_embedding_embed_returns_error() {
        let service = ExternalEmbedding::new(384);
        assert!(service.embed("hello world").is_err());
    }

    #[test]
    fn external_embedding_embed_batch_returns_error() {
        let service = ExternalEmbedding::new(384);
        assert!(service.embed_batch(&["hello", "world"]).is_err());
    }

    #[test]
    fn validate_embedding_correct_dimension() {
        let service = ExternalEmbedding::new(3);
        assert!(service.validate_embedding(&vec![1.0, 2.0, 3.0]).is_ok());
    }

    #[test]
    fn validate_embedding_wrong_dimension() {
        let service = ExternalEmbedding::new(3);
        assert!(service.validate_embedding(&vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn external_embedding_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExternalEmbedding>();
    }

    #[test]
    fn default_embedding_service_matches_config_dimension() {
        let config = crate::config::EngineConfig::default();
        let service = default_embedding_service(&config);
        assert_eq!(service.dimension(), 384);
    }
}
