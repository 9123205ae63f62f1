//! # codequarry CLI (`cq`)
//!
//! The `cq` binary manages codebase tenants: ingesting repositories,
//! refreshing them, asking questions against the stored chunks, and
//! tearing tenants down.
//!
//! ## Usage
//!
//! ```bash
//! cq --config ./config/cq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cq add <id> <url>` | Clone a repository and ingest it as tenant `<id>` |
//! | `cq refresh <id> <url>` | Re-chunk a tenant (`--full` re-fetches the tree) |
//! | `cq ask <id> "<question>"` | Answer a question from the tenant's chunks |
//! | `cq stats <id>` | Show the tenant's document count |
//! | `cq list` | List tenant ids with on-disk collections |
//! | `cq destroy <id>` | Remove a tenant's on-disk footprint |

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use codequarry::answer::{self, OpenRouterAnswerer};
use codequarry::config::{self, Config};
use codequarry::ingest::IngestPipeline;
use codequarry::models::CancelToken;
use codequarry::reclaim::ReclaimOutcome;
use codequarry::registry::StoreRegistry;
use codequarry::repo::GitRepoSource;
use codequarry::traits::NullCatalog;

/// codequarry CLI — a multi-tenant codebase chunk store for
/// retrieval-backed code Q&A.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "cq",
    about = "codequarry — a multi-tenant codebase chunk store for retrieval-backed code Q&A",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Ingest a repository as a new codebase tenant.
    ///
    /// Clones the repository, splits every source file into overlapping
    /// line windows, and stores the chunks in the tenant's collection.
    /// With `--ephemeral`, the clone lives in a temporary directory that
    /// is removed before the command returns; otherwise it is kept under
    /// the configured repo root for cheap re-chunking later.
    Add {
        /// Tenant id for the codebase (externally assigned, unique).
        tenant_id: i64,

        /// Git URL of the repository.
        url: String,

        /// Process through a temporary clone that is deleted afterwards.
        #[arg(long)]
        ephemeral: bool,

        /// Override the persistent clone location.
        #[arg(long)]
        dest: Option<PathBuf>,
    },

    /// Refresh a tenant from its repository.
    ///
    /// Re-chunks the existing working tree in place (safe mode). With
    /// `--full`, the old tree is reclaimed and the repository is fetched
    /// fresh before re-chunking.
    Refresh {
        /// Tenant id of the codebase.
        tenant_id: i64,

        /// Git URL of the repository.
        url: String,

        /// Reclaim the old working tree and re-fetch.
        #[arg(long)]
        full: bool,
    },

    /// Answer a question from a tenant's stored chunks.
    ///
    /// Ranks the tenant's chunks against the question, assembles the best
    /// matches into a context block, and sends one request to the
    /// configured answering service.
    Ask {
        /// Tenant id of the codebase.
        tenant_id: i64,

        /// The question to answer.
        question: String,

        /// Maximum number of chunks to retrieve.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a tenant's document count.
    Stats {
        /// Tenant id of the codebase.
        tenant_id: i64,
    },

    /// List tenant ids with on-disk collections.
    List,

    /// Remove a tenant's on-disk footprint.
    ///
    /// Returns once the collection directory is gone or — when file
    /// locks defeat the bounded retry schedule — relocated to a
    /// timestamped backup name.
    Destroy {
        /// Tenant id of the codebase.
        tenant_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codequarry=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let registry = StoreRegistry::new(cfg.storage.base_dir.clone());

    match cli.command {
        Commands::Add {
            tenant_id,
            url,
            ephemeral,
            dest,
        } => {
            run_ingest(&cfg, &registry, tenant_id, &url, ephemeral, dest, false).await?;
        }
        Commands::Refresh {
            tenant_id,
            url,
            full,
        } => {
            run_ingest(&cfg, &registry, tenant_id, &url, false, None, full).await?;
        }
        Commands::Ask {
            tenant_id,
            question,
            limit,
        } => {
            let limit = limit.unwrap_or(cfg.retrieval.default_limit);
            if !cfg.answer.is_enabled() {
                anyhow::bail!(
                    "answer.provider is disabled; configure an answering service to use `ask`"
                );
            }
            // Query paths use the process-local handle cache; provision
            // the tenant first so an on-disk collection is reachable.
            if registry.tenant_path(tenant_id).exists() {
                registry.get_or_create(tenant_id).await?;
            }
            let answerer = OpenRouterAnswerer::new(&cfg.answer)?;
            let reply = answer::ask(&registry, &answerer, tenant_id, &question, limit).await?;
            println!("{}", reply);
        }
        Commands::Stats { tenant_id } => {
            let stats = registry.stats(tenant_id).await?;
            println!("codebase {}", tenant_id);
            if stats.exists {
                println!("  documents: {}", stats.document_count);
            } else {
                println!("  documents: 0 (no collection on disk)");
            }
        }
        Commands::List => {
            let ids = registry.list_provisioned();
            if ids.is_empty() {
                println!("no codebases provisioned under {}", cfg.storage.base_dir.display());
            } else {
                for id in ids {
                    println!("codebase_{}", id);
                }
            }
        }
        Commands::Destroy { tenant_id } => {
            let outcome = registry.destroy(tenant_id, &CancelToken::new()).await?;
            match outcome {
                ReclaimOutcome::Removed => {
                    println!("destroyed codebase {}", tenant_id);
                }
                ReclaimOutcome::Relocated(backup) => {
                    println!(
                        "destroyed codebase {} (directory was locked; relocated to {})",
                        tenant_id,
                        backup.display()
                    );
                }
            }
        }
    }

    Ok(())
}

async fn run_ingest(
    cfg: &Config,
    registry: &StoreRegistry,
    tenant_id: i64,
    url: &str,
    ephemeral: bool,
    dest: Option<PathBuf>,
    full: bool,
) -> Result<()> {
    let source = GitRepoSource;
    let pipeline = IngestPipeline::new(
        registry,
        &source,
        &NullCatalog,
        cfg.chunking.splitter(),
        cfg.repo.clone(),
    );
    let cancel = CancelToken::new();

    let report = if ephemeral {
        pipeline.ingest_ephemeral(tenant_id, url, &cancel).await?
    } else {
        let dest = dest.unwrap_or_else(|| {
            cfg.repo
                .root
                .join(codequarry::registry::collection_name(tenant_id))
        });
        pipeline
            .ingest_persistent(tenant_id, url, &dest, full, &cancel)
            .await?
    };

    println!("ingest codebase {}", tenant_id);
    println!("  revision: {}", report.revision);
    println!("  files: {}", report.file_count);
    println!("  chunks: {}", report.chunk_count);
    if report.placeholder {
        println!("  note: no processable source files; stored a placeholder chunk");
    }
    println!("ok");
    Ok(())
}
