use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::SplitterConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub repo: RepoConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Base directory holding one `codebase_<id>` subdirectory per tenant.
    pub base_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_lines")]
    pub window_lines: usize,
    #[serde(default = "default_overlap_lines")]
    pub overlap_lines: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_lines: default_window_lines(),
            overlap_lines: default_overlap_lines(),
        }
    }
}

impl ChunkingConfig {
    pub fn splitter(&self) -> SplitterConfig {
        SplitterConfig {
            window: self.window_lines,
            overlap: self.overlap_lines,
        }
    }
}

fn default_window_lines() -> usize {
    40
}
fn default_overlap_lines() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepoConfig {
    /// Directory for persistent-mode clones, one subdirectory per codebase.
    #[serde(default = "default_repo_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            root: default_repo_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_repo_root() -> PathBuf {
    PathBuf::from("./repos")
}

fn default_include_globs() -> Vec<String> {
    [
        "**/*.rs", "**/*.py", "**/*.js", "**/*.ts", "**/*.java", "**/*.go", "**/*.c", "**/*.h",
        "**/*.hpp", "**/*.cpp", "**/*.cc", "**/*.cs", "**/*.rb", "**/*.php", "**/*.swift",
        "**/*.kt", "**/*.scala", "**/*.sh", "**/*.sql", "**/*.md", "**/*.txt", "**/*.rst",
        "**/*.yaml", "**/*.yml", "**/*.toml", "**/*.json", "**/*.xml", "**/*.html", "**/*.css",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "deepseek/deepseek-chat".to_string()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

impl AnswerConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking up front — a degenerate window/overlap pair would
    // otherwise stall the splitter.
    config.chunking.splitter().validate()?;

    // Validate retrieval
    if config.retrieval.default_limit == 0 {
        anyhow::bail!("retrieval.default_limit must be >= 1");
    }

    // Validate answering
    match config.answer.provider.as_str() {
        "disabled" | "openrouter" => {}
        other => anyhow::bail!(
            "Unknown answer provider: '{}'. Must be disabled or openrouter.",
            other
        ),
    }

    Ok(config)
}
