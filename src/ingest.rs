//! Ingestion pipeline orchestration.
//!
//! Composes a [`RepositorySource`], the line-window splitter, and the
//! tenant store to (re)populate one tenant from a repository. Two modes:
//!
//! - **Persistent**: the working tree lives at a caller-supplied path
//!   that survives the call. A refresh re-chunks the existing tree in
//!   place; a full refresh reclaims the old path first and re-fetches.
//! - **Ephemeral**: the working tree is materialized into a
//!   process-private temporary directory that is unconditionally removed
//!   before the call returns — success or failure — falling back to a
//!   timestamped rename when deletion fails.
//!
//! Per-file read failures are logged skips; only a failure to
//! materialize the repository at all is fatal. A tree with zero
//! processable files stores a single explicit placeholder chunk, so
//! downstream query code never has to special-case an empty tenant.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::chunk::{split_lines, SplitterConfig};
use crate::config::RepoConfig;
use crate::errors::StoreError;
use crate::models::{CancelToken, IngestReport};
use crate::reclaim::{self, Reclaimer};
use crate::registry::StoreRegistry;
use crate::repo::{read_source_file, scan_source_files};
use crate::traits::{Catalog, RepositorySource};

/// Chunk stored when a repository has nothing the splitter can handle.
pub const PLACEHOLDER_TEXT: &str = "No processable source files found in this repository. \
It may contain only documentation, images, or other non-code files.";

/// Repository → chunks → tenant store, in either storage mode.
pub struct IngestPipeline<'a> {
    registry: &'a StoreRegistry,
    source: &'a dyn RepositorySource,
    catalog: &'a dyn Catalog,
    splitter: SplitterConfig,
    repo: RepoConfig,
    reclaimer: Reclaimer,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(
        registry: &'a StoreRegistry,
        source: &'a dyn RepositorySource,
        catalog: &'a dyn Catalog,
        splitter: SplitterConfig,
        repo: RepoConfig,
    ) -> Self {
        IngestPipeline {
            registry,
            source,
            catalog,
            splitter,
            repo,
            reclaimer: Reclaimer::new(),
        }
    }

    /// Ingest into a working tree that survives the call.
    ///
    /// With `full_refresh`, the old tree is reclaimed before re-fetching;
    /// otherwise an existing clone of the same remote is reused and only
    /// re-chunked.
    pub async fn ingest_persistent(
        &self,
        tenant_id: i64,
        url: &str,
        dest: &Path,
        full_refresh: bool,
        cancel: &CancelToken,
    ) -> Result<IngestReport> {
        if full_refresh && dest.exists() {
            info!(path = %dest.display(), "full refresh: reclaiming old working tree");
            self.reclaimer.reclaim(dest, cancel).await?;
        }

        let (root, revision) = self
            .source
            .materialize(url, Some(dest))
            .map_err(|e| StoreError::ingest(format!("failed to materialize {}: {}", url, e)))?;

        self.chunk_and_store(tenant_id, &root, &revision, cancel)
            .await
    }

    /// Ingest through a temporary working tree, removed on every exit
    /// path before this returns.
    pub async fn ingest_ephemeral(
        &self,
        tenant_id: i64,
        url: &str,
        cancel: &CancelToken,
    ) -> Result<IngestReport> {
        let tmp = tempfile::Builder::new()
            .prefix(&format!("codebase_temp_{}_", tenant_id))
            .tempdir()
            .with_context(|| "Failed to create temporary ingest directory")?;
        let tmp_path = tmp.path().to_path_buf();

        // No early return between here and cleanup: the outcome is held
        // so the temporary tree is released on every exit path.
        let outcome = match self.source.materialize(url, Some(&tmp_path)) {
            Ok((root, revision)) => {
                self.chunk_and_store(tenant_id, &root, &revision, cancel)
                    .await
            }
            Err(e) => Err(StoreError::ingest(format!(
                "failed to materialize {}: {}",
                url, e
            ))
            .into()),
        };

        if let Err(e) = tmp.close() {
            warn!(path = %tmp_path.display(), error = %e, "could not clean up temporary directory");
            match reclaim::relocate_tree(&tmp_path) {
                Ok(backup) => {
                    info!(backup = %backup.display(), "renamed failed cleanup directory")
                }
                Err(e) => {
                    warn!(path = %tmp_path.display(), error = %e, "temporary directory may need manual cleanup")
                }
            }
        }

        outcome
    }

    async fn chunk_and_store(
        &self,
        tenant_id: i64,
        root: &Path,
        revision: &str,
        cancel: &CancelToken,
    ) -> Result<IngestReport> {
        let files = scan_source_files(root, &self.repo.include_globs, &self.repo.exclude_globs)?;
        info!(tenant_id, count = files.len(), "found source files");

        let mut chunks: Vec<String> = Vec::new();
        let mut metadata: Vec<serde_json::Value> = Vec::new();

        for (file_ordinal, path) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(StoreError::ingest("ingest cancelled").into());
            }

            let Some(content) = read_source_file(path) else {
                continue;
            };
            if content.trim().is_empty() {
                continue;
            }

            let rel = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            for (chunk_index, text) in split_lines(&content, &self.splitter)?.into_iter().enumerate()
            {
                metadata.push(serde_json::json!({
                    "ordinal": chunks.len() as i64,
                    "source_path": rel,
                    "file_ordinal": file_ordinal as i64,
                    "chunk_index": chunk_index as i64,
                }));
                chunks.push(text);
            }
        }

        let placeholder = chunks.is_empty();
        if placeholder {
            warn!(tenant_id, "no processable content; storing placeholder");
            chunks.push(PLACEHOLDER_TEXT.to_string());
            metadata.push(serde_json::json!({ "ordinal": 0, "placeholder": true }));
        }

        let store = self.registry.get_or_create(tenant_id).await?;
        store.add(&chunks, Some(metadata), true).await?;

        let report = IngestReport {
            file_count: files.len(),
            chunk_count: chunks.len(),
            revision: revision.to_string(),
            placeholder,
        };

        self.catalog
            .record_counts(tenant_id, report.file_count, report.chunk_count)
            .await?;

        info!(
            tenant_id,
            files = report.file_count,
            chunks = report.chunk_count,
            revision = %report.revision,
            "ingest complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::NullCatalog;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Source that copies a prepared tree into the destination.
    struct FixtureSource {
        files: Vec<(&'static str, &'static str)>,
        seen_dest: Mutex<Option<PathBuf>>,
    }

    impl FixtureSource {
        fn new(files: Vec<(&'static str, &'static str)>) -> Self {
            FixtureSource {
                files,
                seen_dest: Mutex::new(None),
            }
        }
    }

    impl RepositorySource for FixtureSource {
        fn materialize(&self, _url: &str, destination: Option<&Path>) -> Result<(PathBuf, String)> {
            let dest = destination.expect("pipeline always supplies a destination");
            for (rel, body) in &self.files {
                let path = dest.join(rel);
                std::fs::create_dir_all(path.parent().unwrap())?;
                std::fs::write(path, body)?;
            }
            *self.seen_dest.lock().unwrap() = Some(dest.to_path_buf());
            Ok((dest.to_path_buf(), "deadbeef".to_string()))
        }
    }

    struct FailingSource;

    impl RepositorySource for FailingSource {
        fn materialize(&self, url: &str, _destination: Option<&Path>) -> Result<(PathBuf, String)> {
            anyhow::bail!("cannot reach {}", url)
        }
    }

    fn splitter() -> SplitterConfig {
        SplitterConfig {
            window: 4,
            overlap: 1,
        }
    }

    #[tokio::test]
    async fn test_ephemeral_ingest_stores_chunks_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(tmp.path().join("vectors"));
        let source = FixtureSource::new(vec![
            ("src/lib.rs", "fn a() {}\nfn b() {}\nfn c() {}\nfn d() {}\nfn e() {}\n"),
            ("README.md", "# fixture\n"),
        ]);

        let pipeline = IngestPipeline::new(
            &registry,
            &source,
            &NullCatalog,
            splitter(),
            RepoConfig::default(),
        );
        let report = pipeline
            .ingest_ephemeral(1, "https://example.com/repo.git", &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(report.file_count, 2);
        assert!(report.chunk_count >= 2);
        assert!(!report.placeholder);
        assert_eq!(report.revision, "deadbeef");

        // Chunks landed in the store...
        let stats = registry.stats(1).await.unwrap();
        assert_eq!(stats.document_count, report.chunk_count as i64);

        // ...and the temporary tree is gone.
        let seen = source.seen_dest.lock().unwrap().clone().unwrap();
        assert!(!seen.exists());
    }

    #[tokio::test]
    async fn test_empty_repository_stores_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(tmp.path().join("vectors"));
        let source = FixtureSource::new(vec![("image.png", "binary-ish")]);

        let pipeline = IngestPipeline::new(
            &registry,
            &source,
            &NullCatalog,
            splitter(),
            RepoConfig::default(),
        );
        let report = pipeline
            .ingest_ephemeral(2, "https://example.com/repo.git", &CancelToken::new())
            .await
            .unwrap();

        assert!(report.placeholder);
        assert_eq!(report.chunk_count, 1);

        let hits = registry.query(2, "anything", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, PLACEHOLDER_TEXT);
        assert_eq!(hits[0].metadata["placeholder"], true);
    }

    #[tokio::test]
    async fn test_persistent_refresh_reuses_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(tmp.path().join("vectors"));
        let dest = tmp.path().join("repos").join("fixture");
        let source = FixtureSource::new(vec![("main.py", "print('hello')\n")]);

        let pipeline = IngestPipeline::new(
            &registry,
            &source,
            &NullCatalog,
            splitter(),
            RepoConfig::default(),
        );

        let first = pipeline
            .ingest_persistent(3, "https://example.com/r.git", &dest, false, &CancelToken::new())
            .await
            .unwrap();
        let second = pipeline
            .ingest_persistent(3, "https://example.com/r.git", &dest, false, &CancelToken::new())
            .await
            .unwrap();

        // Replace semantics: a refresh supersedes, never accumulates.
        assert_eq!(first.chunk_count, second.chunk_count);
        let stats = registry.stats(3).await.unwrap();
        assert_eq!(stats.document_count, second.chunk_count as i64);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn test_materialize_failure_is_fatal_ingest_error() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(tmp.path().join("vectors"));

        let pipeline = IngestPipeline::new(
            &registry,
            &FailingSource,
            &NullCatalog,
            splitter(),
            RepoConfig::default(),
        );
        let err = pipeline
            .ingest_ephemeral(4, "https://example.com/gone.git", &CancelToken::new())
            .await
            .unwrap_err();
        let store_err = err.downcast_ref::<StoreError>().unwrap();
        assert!(matches!(store_err, StoreError::Ingest(_)));
    }

    #[tokio::test]
    async fn test_cancelled_ingest_stops_between_files() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = StoreRegistry::new(tmp.path().join("vectors"));
        let source = FixtureSource::new(vec![("a.rs", "fn a() {}\n"), ("b.rs", "fn b() {}\n")]);

        let cancel = CancelToken::new();
        cancel.cancel();

        let pipeline = IngestPipeline::new(
            &registry,
            &source,
            &NullCatalog,
            splitter(),
            RepoConfig::default(),
        );
        let err = pipeline
            .ingest_ephemeral(5, "https://example.com/r.git", &cancel)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
