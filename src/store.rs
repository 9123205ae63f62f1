//! Per-tenant chunk collection backed by SQLite.
//!
//! Each tenant owns one isolated database file inside its storage
//! directory. A [`TenantStore`] wraps the connection pool for one such
//! collection and exposes the write/read surface: batch add with
//! replace-on-refresh semantics, similarity query, and document counts.
//!
//! # Replace is two-phase and not atomic
//!
//! `add` with `replace_existing` first enumerates and deletes the
//! tenant's stored documents, then inserts the new batch in a separate
//! transaction. The window between the two phases is deliberately not
//! hidden: a crash there leaves the tenant *empty*, never holding a mix
//! of old and new chunks. An insert failure after a completed delete
//! surfaces as [`StoreError::StoreWrite`] and likewise leaves the tenant
//! empty; retrying the whole add is safe.
//!
//! # Writer discipline
//!
//! The store does not arbitrate concurrent writers within one tenant.
//! Two overlapping replace-mode adds against the same tenant race (both
//! delete, both insert); callers must serialize writes per tenant id.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use crate::embedding::{blob_to_vec, cosine_distance, embed, vec_to_blob};
use crate::errors::StoreError;
use crate::models::{ChunkRecord, QueryHit, TenantStats};

/// Lifecycle of a tenant handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Storage path and collection exist; no successful add yet.
    Provisioned,
    /// At least one add/replace batch has been stored.
    Populated,
    /// `destroy` ran; every further operation on this handle fails.
    Destroyed,
}

/// One tenant's open chunk collection.
pub struct TenantStore {
    tenant_id: i64,
    path: PathBuf,
    pool: SqlitePool,
    state: RwLock<Lifecycle>,
}

impl TenantStore {
    /// Open (and if necessary create) the collection for a tenant.
    ///
    /// Idempotent: opening an already-provisioned tenant reuses the
    /// on-disk collection as-is.
    pub async fn open(tenant_id: i64, path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let db_file = path.join("chunks.sqlite");
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_file.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                tenant_id INTEGER NOT NULL,
                ordinal INTEGER NOT NULL,
                text TEXT NOT NULL,
                metadata_json TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_tenant ON chunks(tenant_id)")
            .execute(&pool)
            .await?;

        debug!(tenant_id, path = %path.display(), "opened tenant collection");

        Ok(TenantStore {
            tenant_id,
            path: path.to_path_buf(),
            pool,
            state: RwLock::new(Lifecycle::Provisioned),
        })
    }

    pub fn tenant_id(&self) -> i64 {
        self.tenant_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_live(&self) -> Result<(), StoreError> {
        if *self.state.read().unwrap() == Lifecycle::Destroyed {
            return Err(StoreError::TenantDestroyed(self.tenant_id));
        }
        Ok(())
    }

    /// Add a batch of chunks, optionally replacing everything stored.
    ///
    /// `metadata`, when supplied, must be one JSON object per chunk (a
    /// length mismatch fails before anything is touched) and each object
    /// is tagged with the tenant id. Without metadata, `{ordinal,
    /// tenant_id}` objects are synthesized. An empty batch is a no-op —
    /// callers substitute a placeholder chunk upstream rather than
    /// storing nothing.
    pub async fn add(
        &self,
        chunks: &[String],
        metadata: Option<Vec<serde_json::Value>>,
        replace_existing: bool,
    ) -> Result<()> {
        self.check_live()?;

        if chunks.is_empty() {
            return Ok(());
        }

        let metadata = match metadata {
            Some(meta) => {
                if meta.len() != chunks.len() {
                    return Err(StoreError::StoreWrite {
                        tenant_id: self.tenant_id,
                        detail: format!(
                            "metadata length {} does not match chunk count {}",
                            meta.len(),
                            chunks.len()
                        ),
                    }
                    .into());
                }
                meta.into_iter()
                    .map(|mut m| {
                        if let Some(obj) = m.as_object_mut() {
                            obj.insert("tenant_id".to_string(), self.tenant_id.into());
                        }
                        m
                    })
                    .collect::<Vec<_>>()
            }
            None => (0..chunks.len())
                .map(|i| serde_json::json!({ "ordinal": i as i64, "tenant_id": self.tenant_id }))
                .collect(),
        };

        let records: Vec<ChunkRecord> = chunks
            .iter()
            .enumerate()
            .map(|(i, text)| ChunkRecord {
                tenant_id: self.tenant_id,
                ordinal: i as i64,
                text: text.clone(),
            })
            .collect();

        // Phase one: enumerate and delete what is currently stored. Runs
        // in its own transaction; once it commits the tenant is empty
        // until phase two commits.
        if replace_existing {
            let existing: Vec<String> =
                sqlx::query_scalar("SELECT id FROM chunks WHERE tenant_id = ?")
                    .bind(self.tenant_id)
                    .fetch_all(&self.pool)
                    .await?;

            if !existing.is_empty() {
                info!(
                    tenant_id = self.tenant_id,
                    count = existing.len(),
                    "removing existing documents before replace"
                );
                let mut tx = self.pool.begin().await?;
                for id in &existing {
                    sqlx::query("DELETE FROM chunks WHERE id = ?")
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                tx.commit().await?;
            }
        }

        // Phase two: insert the new batch in one transaction, so a failure
        // here leaves the tenant empty rather than partially written.
        let insert = async {
            let mut tx = self.pool.begin().await?;
            for (record, meta) in records.iter().zip(metadata.iter()) {
                let vector = embed(&record.text);
                sqlx::query(
                    "INSERT OR REPLACE INTO chunks (id, tenant_id, ordinal, text, metadata_json, embedding) \
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(record.storage_id())
                .bind(record.tenant_id)
                .bind(record.ordinal)
                .bind(&record.text)
                .bind(meta.to_string())
                .bind(vec_to_blob(&vector))
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;
            Ok::<(), sqlx::Error>(())
        };

        insert.await.map_err(|e| StoreError::StoreWrite {
            tenant_id: self.tenant_id,
            detail: e.to_string(),
        })?;

        *self.state.write().unwrap() = Lifecycle::Populated;
        info!(
            tenant_id = self.tenant_id,
            count = records.len(),
            "added documents to collection"
        );
        Ok(())
    }

    /// Rank stored chunks against a free-text query.
    ///
    /// Results are ordered by ascending cosine distance; equal distances
    /// keep insertion order (the sort is stable over rowid order).
    pub async fn query(&self, text: &str, limit: usize) -> Result<Vec<QueryHit>> {
        self.check_live()?;

        let query_vec = embed(text);

        let rows = sqlx::query(
            "SELECT text, metadata_json, embedding FROM chunks WHERE tenant_id = ? ORDER BY rowid",
        )
        .bind(self.tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<QueryHit> = rows
            .iter()
            .map(|row| {
                let text: String = row.get("text");
                let metadata_json: String = row.get("metadata_json");
                let blob: Vec<u8> = row.get("embedding");
                let metadata =
                    serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({}));
                QueryHit {
                    distance: cosine_distance(&query_vec, &blob_to_vec(&blob)),
                    text,
                    metadata,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Document count for this collection.
    ///
    /// A collection that cannot be counted (backing file gone) reports
    /// [`TenantStats::absent`] instead of raising.
    pub async fn stats(&self) -> Result<TenantStats> {
        self.check_live()?;

        let count: std::result::Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE tenant_id = ?")
                .bind(self.tenant_id)
                .fetch_one(&self.pool)
                .await;

        Ok(match count {
            Ok(document_count) => TenantStats {
                document_count,
                exists: true,
            },
            Err(_) => TenantStats::absent(),
        })
    }

    /// Mark the handle destroyed and release the connection pool.
    ///
    /// Called by the registry during destroy, after eviction and before
    /// the on-disk footprint is reclaimed — no open file descriptor may
    /// reference the path being removed.
    pub(crate) async fn shutdown(&self) {
        *self.state.write().unwrap() = Lifecycle::Destroyed;
        self.pool.close().await;
    }
}
