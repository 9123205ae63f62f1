//! Error taxonomy for the chunk store.
//!
//! Typed errors cover the store's own failure modes; orchestration code
//! (CLI, pipeline glue) wraps these in `anyhow` at the boundary. Per-file
//! read failures during ingest are *not* errors — they are logged skips.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the tenant store, registry, reclaimer, and pipeline.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid splitter or store configuration. Raised before any I/O.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Query or stats against a tenant never provisioned in this process.
    ///
    /// The collection cache is process-local; provisioning the tenant
    /// first makes the operation valid.
    #[error("codebase {0} not found in embedding store")]
    TenantNotFound(i64),

    /// Operation on a handle after `destroy`. The caller must re-provision.
    #[error("codebase {0} has been destroyed; re-provision to use this id again")]
    TenantDestroyed(i64),

    /// A chunk batch could not be written.
    ///
    /// When a replace-mode add fails after the delete phase completed, the
    /// tenant is left empty, never in a mixed old/new state. Retrying the
    /// whole add is safe.
    #[error("failed to write chunk batch for codebase {tenant_id}: {detail}")]
    StoreWrite { tenant_id: i64, detail: String },

    /// On-disk tenant state could not be removed or relocated.
    ///
    /// The only unrecoverable reclaim outcome; the path needs manual
    /// intervention.
    #[error("cannot remove or rename directory: {}", path.display())]
    Reclaim { path: PathBuf },

    /// Repository materialization failed; the ingest call cannot proceed.
    #[error("ingest failed: {0}")]
    Ingest(String),
}

impl StoreError {
    pub fn ingest(msg: impl Into<String>) -> Self {
        StoreError::Ingest(msg.into())
    }
}
