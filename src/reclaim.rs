//! Resilient removal of a tenant's on-disk footprint.
//!
//! Storage engines and antivirus scanners can hold transient locks on
//! files inside a collection directory (mandatory locks on Windows), so a
//! plain recursive delete is allowed to fail. The reclaimer runs a
//! bounded retry schedule instead of nested error handlers:
//!
//! ```text
//! Attempting ──ok──▶ Removed
//!     │fail
//!     ▼
//! Retrying(n) — clear readonly attributes, wait 2^n backoff units,
//!     │          force-remove with per-path attribute clearing
//!     │exhausted (or cancelled)
//!     ▼
//! rename to "<path>_backup_<ts>" ──ok──▶ Relocated
//!     │fail
//!     ▼
//! ReclaimError (fatal, names the path)
//! ```
//!
//! Relocation is success-with-a-caveat: the data is intact but no longer
//! at the expected path. Only a failed rename bubbles up as
//! unrecoverable. The reclaimer operates purely on the subtree it was
//! given and never touches anything outside it.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::errors::StoreError;
use crate::models::CancelToken;

/// Retry ceiling used by [`Reclaimer::new`].
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Terminal states of a reclaim run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReclaimOutcome {
    /// The subtree is gone.
    Removed,
    /// The subtree could not be deleted and was renamed to the returned
    /// backup path instead. Nothing was lost.
    Relocated(PathBuf),
}

/// Bounded retry/backoff delete with a rename fallback.
#[derive(Debug, Clone)]
pub struct Reclaimer {
    max_attempts: u32,
    backoff_unit: Duration,
}

impl Default for Reclaimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reclaimer {
    pub fn new() -> Self {
        Reclaimer {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_unit: Duration::from_secs(1),
        }
    }

    /// Override the retry schedule. The wait before retry `n` is
    /// `2^n × backoff_unit`; the default unit is one second.
    pub fn with_schedule(max_attempts: u32, backoff_unit: Duration) -> Self {
        Reclaimer {
            max_attempts,
            backoff_unit,
        }
    }

    /// Remove `path` recursively, retrying under lock contention, and
    /// fall back to relocation when the retry budget is exhausted.
    ///
    /// Cancellation is honored between attempts and short-circuits to the
    /// rename fallback, so the run stays bounded either way. A path that
    /// does not exist reclaims trivially.
    pub async fn reclaim(
        &self,
        path: &Path,
        cancel: &CancelToken,
    ) -> Result<ReclaimOutcome, StoreError> {
        if !path.exists() {
            return Ok(ReclaimOutcome::Removed);
        }

        for attempt in 0..self.max_attempts {
            if cancel.is_cancelled() {
                warn!(path = %path.display(), "reclaim cancelled; falling back to relocation");
                break;
            }

            let result = if attempt == 0 {
                std::fs::remove_dir_all(path)
            } else {
                // Unlock the whole subtree, give the holder time to let
                // go, then remove with per-path attribute clearing.
                clear_readonly_tree(path);
                tokio::time::sleep(self.backoff_unit * (1u32 << attempt)).await;
                force_remove_tree(path)
            };

            match result {
                Ok(()) => {
                    info!(path = %path.display(), attempt, "reclaimed tenant directory");
                    return Ok(ReclaimOutcome::Removed);
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        attempt,
                        error = %e,
                        "could not remove tenant directory"
                    );
                }
            }
        }

        // Non-destructive fallback: move the subtree aside under a
        // timestamped name so nothing is lost.
        match relocate_tree(path) {
            Ok(backup) => {
                warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    "could not delete directory; relocated instead"
                );
                Ok(ReclaimOutcome::Relocated(backup))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "rename fallback failed");
                Err(StoreError::Reclaim {
                    path: path.to_path_buf(),
                })
            }
        }
    }
}

/// One-shot removal for paths the caller exclusively owns: plain delete,
/// then a single attribute-clearing pass. No backoff — callers that need
/// the full schedule go through [`Reclaimer::reclaim`].
pub(crate) fn remove_tree(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(_) => {
            clear_readonly_tree(path);
            force_remove_tree(path)
        }
    }
}

/// Rename `path` to a timestamped backup name alongside it.
pub(crate) fn relocate_tree(path: &Path) -> io::Result<PathBuf> {
    let ts = chrono::Utc::now().timestamp();
    let backup = PathBuf::from(format!("{}_backup_{}", path.display(), ts));
    std::fs::rename(path, &backup)?;
    Ok(backup)
}

/// Clear write protection on every file and directory under `path`.
fn clear_readonly_tree(path: &Path) {
    for entry in WalkDir::new(path).into_iter().flatten() {
        if let Ok(metadata) = entry.metadata() {
            let mut perms = metadata.permissions();
            if perms.readonly() {
                perms.set_readonly(false);
                let _ = std::fs::set_permissions(entry.path(), perms);
            }
        }
    }
    #[cfg(unix)]
    {
        // Directory entries also need owner-write on the directory itself
        // for unlink to succeed.
        use std::os::unix::fs::PermissionsExt;
        for entry in WalkDir::new(path).into_iter().flatten() {
            if entry.file_type().is_dir() {
                let _ = std::fs::set_permissions(
                    entry.path(),
                    std::fs::Permissions::from_mode(0o755),
                );
            }
        }
    }
}

/// Recursive remove that re-clears attributes on each failing path before
/// giving up on it.
fn force_remove_tree(path: &Path) -> io::Result<()> {
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let child = entry.path();
        if entry.file_type()?.is_dir() {
            force_remove_tree(&child)?;
        } else if let Err(first) = std::fs::remove_file(&child) {
            clear_readonly_tree(path);
            std::fs::remove_file(&child).map_err(|_| first)?;
        }
    }
    if let Err(first) = std::fs::remove_dir(path) {
        clear_readonly_tree(path);
        std::fs::remove_dir(path).map_err(|_| first)?;
    }
    Ok(())
}
