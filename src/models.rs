//! Core data models used throughout codequarry.
//!
//! These types represent the chunks, query results, and ingest reports that
//! flow through the ingestion and retrieval pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A chunk prepared for storage: one line-window of source text plus its
/// position within the add batch.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Tenant this chunk belongs to.
    pub tenant_id: i64,
    /// 0-based position within the add batch. Unique and contiguous.
    pub ordinal: i64,
    /// Chunk text. Non-empty after trimming.
    pub text: String,
}

impl ChunkRecord {
    /// Storage identity of the chunk: `"{tenant_id}:{ordinal}"`.
    pub fn storage_id(&self) -> String {
        format!("{}:{}", self.tenant_id, self.ordinal)
    }
}

/// A ranked query result: chunk text, its distance from the query vector,
/// and the metadata stored with it.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub text: String,
    pub distance: f32,
    pub metadata: serde_json::Value,
}

/// Document count for a tenant collection.
///
/// `exists` is false when the tenant has no backing store yet; that case
/// is a result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantStats {
    pub document_count: i64,
    pub exists: bool,
}

impl TenantStats {
    pub fn absent() -> Self {
        TenantStats {
            document_count: 0,
            exists: false,
        }
    }
}

/// Summary of one ingest run, reported back to the catalog.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Source files found in the tree (processable or not).
    pub file_count: usize,
    /// Chunks written to the store, placeholder included.
    pub chunk_count: usize,
    /// Revision identifier of the materialized tree (e.g. git HEAD SHA).
    pub revision: String,
    /// True when the tree had no processable files and a single
    /// placeholder chunk was stored instead.
    pub placeholder: bool,
}

/// Cooperative cancellation flag for long-running ingest and reclaim work.
///
/// Checked between file boundaries and between reclaim retry attempts;
/// nothing is interrupted mid-write.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
