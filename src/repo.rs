//! Git repository source and source-file scanning.
//!
//! [`GitRepoSource`] materializes a working tree by shelling out to
//! `git`. A persistent destination that already holds a clone of the
//! same remote is reused as-is (refreshes re-chunk in place); a clone of
//! a *different* remote is removed and replaced. The HEAD commit SHA is
//! returned as the revision identifier.
//!
//! [`scan_source_files`] walks a materialized tree and selects the files
//! worth chunking: hidden and dependency/build directories are skipped,
//! then include/exclude glob sets decide the rest.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::reclaim;
use crate::traits::RepositorySource;

/// Directory names never worth descending into.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "__pycache__",
    "target",
    "build",
    "dist",
    "bin",
    "obj",
];

/// Materializes working trees with the `git` CLI.
pub struct GitRepoSource;

impl RepositorySource for GitRepoSource {
    fn materialize(&self, url: &str, destination: Option<&Path>) -> Result<(PathBuf, String)> {
        let dest = match destination {
            Some(dest) => dest.to_path_buf(),
            None => {
                // Caller wants a private location and owns it afterwards.
                let dir = tempfile::Builder::new()
                    .prefix(&format!("codequarry_repo_{}_", short_hash(url)))
                    .tempdir()?;
                dir.keep()
            }
        };

        if dest.join(".git").exists() {
            match git_origin_url(&dest) {
                Ok(existing) if existing == url => {
                    info!(path = %dest.display(), "using existing clone");
                    let sha = git_head_sha(&dest)?;
                    return Ok((dest, sha));
                }
                Ok(existing) => {
                    info!(
                        old = %existing,
                        new = %url,
                        "remote url changed; removing old clone"
                    );
                    reclaim::remove_tree(&dest)
                        .with_context(|| format!("Failed to remove old clone: {}", dest.display()))?;
                }
                Err(e) => {
                    warn!(path = %dest.display(), error = %e, "unreadable clone; removing");
                    reclaim::remove_tree(&dest)
                        .with_context(|| format!("Failed to remove old clone: {}", dest.display()))?;
                }
            }
        }

        git_clone(url, &dest)?;
        let sha = git_head_sha(&dest)?;
        Ok((dest, sha))
    }
}

fn git_clone(url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create clone directory: {}", parent.display()))?;
    }

    info!(url, dest = %dest.display(), "cloning repository");
    let output = Command::new("git")
        .args(["clone", url])
        .arg(dest)
        .output()
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }

    Ok(())
}

fn git_head_sha(repo_dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_dir)
        .output()
        .with_context(|| "Failed to get HEAD SHA")?;

    if !output.status.success() {
        bail!("git rev-parse HEAD failed");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn git_origin_url(repo_dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["remote", "get-url", "origin"])
        .current_dir(repo_dir)
        .output()
        .with_context(|| "Failed to read origin url")?;

    if !output.status.success() {
        bail!("git remote get-url origin failed");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

/// Walk a working tree and return the source files to chunk, sorted by
/// relative path for deterministic ordering.
pub fn scan_source_files(
    root: &Path,
    include_globs: &[String],
    exclude_globs: &[String],
) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(include_globs)?;
    let exclude_set = build_globset(exclude_globs)?;

    let mut files = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        if entry.depth() > 0 && name.starts_with('.') {
            return false;
        }
        !(entry.file_type().is_dir() && SKIP_DIRS.contains(&name.as_ref()))
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Read one source file, skipping anything unreadable or non-UTF-8.
///
/// Per-file failures are not fatal to an ingest; the file is logged and
/// dropped.
pub fn read_source_file(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read file; skipping");
            None
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
