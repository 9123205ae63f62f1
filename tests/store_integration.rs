//! End-to-end tests over the public library surface: tenant isolation,
//! replace semantics, lifecycle, and the full ingest→query→destroy flow.

use std::path::{Path, PathBuf};

use codequarry::chunk::SplitterConfig;
use codequarry::config::RepoConfig;
use codequarry::errors::StoreError;
use codequarry::ingest::IngestPipeline;
use codequarry::models::CancelToken;
use codequarry::reclaim::ReclaimOutcome;
use codequarry::registry::StoreRegistry;
use codequarry::traits::{NullCatalog, RepositorySource};

/// Repository source that copies a fixed in-memory tree into the
/// destination.
struct TreeSource {
    files: Vec<(String, String)>,
}

impl TreeSource {
    fn new(files: &[(&str, &str)]) -> Self {
        TreeSource {
            files: files
                .iter()
                .map(|(p, b)| (p.to_string(), b.to_string()))
                .collect(),
        }
    }
}

impl RepositorySource for TreeSource {
    fn materialize(
        &self,
        _url: &str,
        destination: Option<&Path>,
    ) -> anyhow::Result<(PathBuf, String)> {
        let dest = destination.expect("pipeline supplies a destination");
        for (rel, body) in &self.files {
            let path = dest.join(rel);
            std::fs::create_dir_all(path.parent().unwrap())?;
            std::fs::write(path, body)?;
        }
        Ok((dest.to_path_buf(), "rev0".to_string()))
    }
}

fn lines(prefix: &str, n: usize) -> String {
    (0..n)
        .map(|i| format!("{} line {}", prefix, i))
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_tenant_isolation() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new(tmp.path());

    let a = registry.get_or_create(1).await.unwrap();
    a.add(
        &["alpha secret handshake".into(), "alpha config".into()],
        None,
        true,
    )
    .await
    .unwrap();

    let b = registry.get_or_create(2).await.unwrap();
    b.add(&["beta deployment notes".into()], None, true)
        .await
        .unwrap();

    // Tenant B's content is unreachable through tenant A, even when the
    // query text matches B exactly.
    let hits = registry
        .query(1, "beta deployment notes", 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    for hit in &hits {
        assert!(hit.text.starts_with("alpha"));
        assert_eq!(hit.metadata["tenant_id"], 1);
    }
}

#[tokio::test]
async fn test_replace_idempotence_through_registry() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new(tmp.path());

    let batch: Vec<String> = (0..5).map(|i| format!("chunk {}", i)).collect();
    let store = registry.get_or_create(9).await.unwrap();
    store.add(&batch, None, true).await.unwrap();
    store.add(&batch, None, true).await.unwrap();

    let stats = registry.stats(9).await.unwrap();
    assert_eq!(stats.document_count, 5);
}

#[tokio::test]
async fn test_concurrent_get_or_create_single_handle() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = std::sync::Arc::new(StoreRegistry::new(tmp.path()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        handles.push(tokio::spawn(
            async move { registry.get_or_create(3).await },
        ));
    }

    let mut stores = Vec::new();
    for handle in handles {
        stores.push(handle.await.unwrap().unwrap());
    }
    for pair in stores.windows(2) {
        assert!(std::sync::Arc::ptr_eq(&pair[0], &pair[1]));
    }
}

#[tokio::test]
async fn test_destroy_then_reprovision_starts_fresh() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new(tmp.path());

    let store = registry.get_or_create(4).await.unwrap();
    store.add(&["old data".into()], None, true).await.unwrap();

    let outcome = registry.destroy(4, &CancelToken::new()).await.unwrap();
    assert_eq!(outcome, ReclaimOutcome::Removed);
    assert!(!registry.list_provisioned().contains(&4));

    // The old handle is dead.
    let err = store.query("old data", 1).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>().unwrap(),
        StoreError::TenantDestroyed(4)
    ));

    // The same id provisions fresh, with none of the old chunks.
    let fresh = registry.get_or_create(4).await.unwrap();
    let stats = fresh.stats().await.unwrap();
    assert_eq!(stats.document_count, 0);
}

#[tokio::test]
async fn test_end_to_end_ingest_query_destroy() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new(tmp.path().join("vectors"));

    // window 5 / overlap 1 (step 4): 9 + 6 + 5 content lines chunk into
    // 3 + 2 + 2 = 7 windows.
    let source = TreeSource::new(&[
        ("src/alpha.rs", &lines("alpha", 9)),
        ("src/beta.rs", &lines("beta", 6)),
        ("docs/notes.md", &lines("notes", 5)),
    ]);
    let pipeline = IngestPipeline::new(
        &registry,
        &source,
        &NullCatalog,
        SplitterConfig {
            window: 5,
            overlap: 1,
        },
        RepoConfig::default(),
    );

    let report = pipeline
        .ingest_ephemeral(42, "https://example.com/fixture.git", &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(report.file_count, 3);
    assert_eq!(report.chunk_count, 7);
    assert!(!report.placeholder);

    let stats = registry.stats(42).await.unwrap();
    assert!(stats.exists);
    assert_eq!(stats.document_count, 7);

    let hits = registry.query(42, "x", 3).await.unwrap();
    assert!(hits.len() <= 3);
    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }

    let outcome = registry.destroy(42, &CancelToken::new()).await.unwrap();
    assert_eq!(outcome, ReclaimOutcome::Removed);
    assert!(!registry.list_provisioned().contains(&42));
}

#[tokio::test]
async fn test_refresh_after_source_change_supersedes() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new(tmp.path().join("vectors"));
    let dest = tmp.path().join("repos").join("codebase_11");

    let splitter = SplitterConfig {
        window: 5,
        overlap: 1,
    };

    let before = TreeSource::new(&[("a.rs", &lines("v1", 9)), ("b.rs", &lines("v1b", 9))]);
    let pipeline = IngestPipeline::new(
        &registry,
        &before,
        &NullCatalog,
        splitter,
        RepoConfig::default(),
    );
    let first = pipeline
        .ingest_persistent(11, "https://example.com/r.git", &dest, false, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(first.chunk_count, 6);

    // The repository shrank; a refresh replaces, never accumulates.
    let after = TreeSource::new(&[("a.rs", &lines("v2", 5))]);
    let pipeline = IngestPipeline::new(
        &registry,
        &after,
        &NullCatalog,
        splitter,
        RepoConfig::default(),
    );
    let second = pipeline
        .ingest_persistent(11, "https://example.com/r.git", &dest, true, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(second.chunk_count, 2);

    let stats = registry.stats(11).await.unwrap();
    assert_eq!(stats.document_count, 2);

    let hits = registry.query(11, "v2 line 0", 10).await.unwrap();
    assert!(hits.iter().all(|h| h.text.starts_with("v2")));
}
