//! Collaborator seams.
//!
//! The chunk store treats everything around it as a pluggable
//! collaborator: where working trees come from, where codebase metadata
//! is recorded, and who turns retrieved context into an answer. The
//! traits here are the full surface the core consumes — tests and
//! embedders substitute their own implementations.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Obtains a working tree of a codebase at some revision.
///
/// With a destination, the tree is materialized (or refreshed) there and
/// survives per the caller's lifecycle; without one, the implementation
/// picks a fresh private location the caller then owns. Returns the tree
/// root and a revision identifier.
pub trait RepositorySource: Send + Sync {
    fn materialize(&self, url: &str, destination: Option<&Path>) -> Result<(PathBuf, String)>;
}

/// Persistent registry of codebase metadata.
///
/// The core only reports counts after an ingest; storage of names,
/// source locations, and timestamps is the collaborator's business.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn record_counts(&self, tenant_id: i64, file_count: usize, chunk_count: usize)
        -> Result<()>;
}

/// Catalog implementation that records nothing.
///
/// Used by the CLI (which has no external catalog wired up) and tests.
pub struct NullCatalog;

#[async_trait]
impl Catalog for NullCatalog {
    async fn record_counts(
        &self,
        tenant_id: i64,
        file_count: usize,
        chunk_count: usize,
    ) -> Result<()> {
        debug!(tenant_id, file_count, chunk_count, "ingest counts");
        Ok(())
    }
}

/// Turns retrieved chunk text plus a question into an answer.
///
/// One attempt per call: transport failures surface to the caller
/// untouched, the core never retries on the collaborator's behalf.
#[async_trait]
pub trait AnsweringService: Send + Sync {
    async fn answer(&self, context: &str, question: &str) -> Result<String>;
}
