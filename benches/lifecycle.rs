//! Benchmarks for workspace lifecycle and entity CRUD operations.
//!
//! Run with: `cargo bench`
//!
//! Performance targets:
//! - `acquire()` < 100ms for a new workspace
//! - `acquire()` < 100ms for an already-open workspace (cache hit)
//! - `decision::create` < 50ms including embedding + vector upsert

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use novaport_engine::config::{EmbeddingDimension, EngineConfig};
use novaport_engine::embedding::EmbeddingService;
use novaport_engine::entities::decision;
use novaport_engine::workspace::WorkspaceRegistry;
use novaport_engine::{Embedding, Result};
use tempfile::tempdir;

fn bench_config() -> EngineConfig {
    EngineConfig {
        embedding_dimension: EmbeddingDimension::Custom(8),
        ..EngineConfig::default()
    }
}

/// Stand-in [`EmbeddingService`] for benchmarks: no caller plugs a real
/// model into a `cargo bench` run, so this returns a fixed vector instead
/// of erroring the way [`novaport_engine::embedding::ExternalEmbedding`]
/// does.
struct BenchEmbedding;

impl EmbeddingService for BenchEmbedding {
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

/// Benchmark opening a brand-new workspace (cold: no on-disk store yet).
fn bench_acquire_new_workspace(c: &mut Criterion) {
    c.bench_function("acquire_new_workspace", |b| {
        b.iter_custom(|iters| {
            let mut total = std::time::Duration::ZERO;

            for _ in 0..iters {
                let dir = tempdir().unwrap();
                let registry = WorkspaceRegistry::with_default_embedding(bench_config());

                let start = std::time::Instant::now();
                registry.acquire(dir.path().to_string_lossy().as_ref()).unwrap();
                total += start.elapsed();
            }

            total
        });
    });
}

/// Benchmark re-acquiring an already-open workspace (cache hit path).
fn bench_acquire_cached_workspace(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let registry = WorkspaceRegistry::with_default_embedding(bench_config());
    let workspace_id = dir.path().to_string_lossy().to_string();
    registry.acquire(&workspace_id).unwrap();

    c.bench_function("acquire_cached_workspace", |b| {
        b.iter(|| {
            registry.acquire(&workspace_id).unwrap();
        });
    });
}

/// Benchmark opening a workspace that already has an on-disk store
/// (cold process, warm disk).
fn bench_acquire_existing_workspace(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let workspace_id = dir.path().to_string_lossy().to_string();

    {
        let registry = WorkspaceRegistry::with_default_embedding(bench_config());
        registry.acquire(&workspace_id).unwrap();
    }

    c.bench_function("acquire_existing_workspace", |b| {
        b.iter_custom(|iters| {
            let mut total = std::time::Duration::ZERO;

            for _ in 0..iters {
                let registry = WorkspaceRegistry::with_default_embedding(bench_config());

                let start = std::time::Instant::now();
                registry.acquire(&workspace_id).unwrap();
                total += start.elapsed();
            }

            total
        });
    });
}

/// Benchmark logging a decision (relational write + embed + vector upsert).
fn bench_log_decision(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let registry = WorkspaceRegistry::new(bench_config(), Arc::new(BenchEmbedding));
    let workspace = registry.acquire(dir.path().to_string_lossy().as_ref()).unwrap();

    c.bench_function("log_decision", |b| {
        b.iter(|| {
            decision::create(
                &workspace,
                "Use Postgres for storage".to_string(),
                Some("mature ecosystem".to_string()),
                None,
                vec!["db".to_string()],
            )
            .unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_acquire_new_workspace,
    bench_acquire_cached_workspace,
    bench_acquire_existing_workspace,
    bench_log_decision
);
criterion_main!(benches);
