//! Tenant routing and handle caching.
//!
//! The [`StoreRegistry`] owns the only shared mutable state in the
//! system: a process-local cache of open [`TenantStore`] handles. Opening
//! a collection is expensive (directory creation, pool, schema), so the
//! cache guarantees one handle per tenant per process. Check-then-insert
//! runs under a single mutex so two concurrent callers can never open two
//! pools for the same tenant.
//!
//! Directory-layout conventions live here: a tenant's collection is
//! always `<base_dir>/codebase_<id>`, a pure function of the id, so no
//! two tenants can ever resolve to the same path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::info;

use crate::errors::StoreError;
use crate::models::{CancelToken, QueryHit, TenantStats};
use crate::reclaim::{ReclaimOutcome, Reclaimer};
use crate::store::TenantStore;

/// Collection name for a tenant: `"codebase_{tenant_id}"`.
pub fn collection_name(tenant_id: i64) -> String {
    format!("codebase_{}", tenant_id)
}

/// Routes operations by tenant id and caches open collection handles.
pub struct StoreRegistry {
    base_dir: PathBuf,
    cache: Mutex<HashMap<i64, Arc<TenantStore>>>,
    reclaimer: Reclaimer,
}

impl StoreRegistry {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        StoreRegistry {
            base_dir: base_dir.into(),
            cache: Mutex::new(HashMap::new()),
            reclaimer: Reclaimer::new(),
        }
    }

    /// Replace the default reclaim schedule (used by tests to avoid
    /// multi-second backoff sleeps).
    pub fn with_reclaimer(mut self, reclaimer: Reclaimer) -> Self {
        self.reclaimer = reclaimer;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Storage path for a tenant, derived from its id.
    pub fn tenant_path(&self, tenant_id: i64) -> PathBuf {
        self.base_dir.join(collection_name(tenant_id))
    }

    /// Return the cached handle for a tenant, provisioning it first if
    /// needed. Idempotent and safe to call concurrently for the same id.
    pub async fn get_or_create(&self, tenant_id: i64) -> Result<Arc<TenantStore>> {
        let mut cache = self.cache.lock().await;
        if let Some(store) = cache.get(&tenant_id) {
            return Ok(store.clone());
        }

        let store = Arc::new(TenantStore::open(tenant_id, &self.tenant_path(tenant_id)).await?);
        cache.insert(tenant_id, store.clone());
        Ok(store)
    }

    /// Return the handle for a tenant already provisioned in this
    /// process, or [`StoreError::TenantNotFound`].
    pub async fn get_cached(&self, tenant_id: i64) -> Result<Arc<TenantStore>, StoreError> {
        self.cache
            .lock()
            .await
            .get(&tenant_id)
            .cloned()
            .ok_or(StoreError::TenantNotFound(tenant_id))
    }

    /// Drop the cached handle without touching on-disk data.
    ///
    /// Run before any destructive filesystem operation so no handle in
    /// this process still references the path.
    pub async fn evict(&self, tenant_id: i64) -> Option<Arc<TenantStore>> {
        self.cache.lock().await.remove(&tenant_id)
    }

    /// Tenant ids with on-disk collections, sorted.
    ///
    /// Derived by scanning the base directory, not from the in-memory
    /// cache, so it reflects on-disk truth including tenants provisioned
    /// by another process.
    pub fn list_provisioned(&self) -> Vec<i64> {
        let entries = match std::fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut ids: Vec<i64> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix("codebase_"))
                    .and_then(|id| id.parse::<i64>().ok())
            })
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Query a tenant's collection.
    ///
    /// Fails with [`StoreError::TenantNotFound`] when the tenant was
    /// never provisioned in this process — the handle cache is
    /// process-local by design.
    pub async fn query(&self, tenant_id: i64, text: &str, limit: usize) -> Result<Vec<QueryHit>> {
        let store = self.get_cached(tenant_id).await?;
        store.query(text, limit).await
    }

    /// Document count for a tenant.
    ///
    /// A tenant with no backing store yet reports
    /// [`TenantStats::absent`] rather than an error.
    pub async fn stats(&self, tenant_id: i64) -> Result<TenantStats> {
        if !self.tenant_path(tenant_id).exists() {
            return Ok(TenantStats::absent());
        }
        let store = self.get_or_create(tenant_id).await?;
        store.stats().await
    }

    /// Destroy a tenant: evict the handle, release its pool, then
    /// reclaim the on-disk footprint.
    ///
    /// Returns once the directory is gone or relocated; the tenant id
    /// may be provisioned fresh afterwards.
    pub async fn destroy(&self, tenant_id: i64, cancel: &CancelToken) -> Result<ReclaimOutcome> {
        if let Some(store) = self.evict(tenant_id).await {
            store.shutdown().await;
        }

        let path = self.tenant_path(tenant_id);
        let outcome = self.reclaimer.reclaim(&path, cancel).await?;
        info!(tenant_id, "deleted embedding data");
        Ok(outcome)
    }
}
