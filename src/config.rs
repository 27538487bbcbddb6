use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Per-installation root; each project gets its own index dir below it.
    pub root_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Semicolon-separated inclusion substrings; empty means "index all".
    #[serde(default)]
    pub include_patterns: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_staleness_days")]
    pub staleness_days: i64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            include_patterns: String::new(),
            batch_size: default_batch_size(),
            staleness_days: default_staleness_days(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}
fn default_staleness_days() -> i64 {
    7
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Total caret-window size in characters.
    #[serde(default = "default_focus_window_chars")]
    pub focus_window_chars: usize,
    #[serde(default = "default_min_snippet_chars")]
    pub min_snippet_chars: usize,
    #[serde(default = "default_max_attached_file_bytes")]
    pub max_attached_file_bytes: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            focus_window_chars: default_focus_window_chars(),
            min_snippet_chars: default_min_snippet_chars(),
            max_attached_file_bytes: default_max_attached_file_bytes(),
        }
    }
}

fn default_max_results() -> usize {
    12
}
fn default_focus_window_chars() -> usize {
    8000
}
fn default_min_snippet_chars() -> usize {
    30
}
fn default_max_attached_file_bytes() -> u64 {
    200 * 1024
}

impl Config {
    /// The dedicated vector-index directory for one project.
    pub fn project_index_dir(&self, project_id: &str) -> PathBuf {
        self.store.root_dir.join(project_id).join("knowledge_index")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.indexing.batch_size == 0 {
        anyhow::bail!("indexing.batch_size must be > 0");
    }
    if config.indexing.staleness_days < 1 {
        anyhow::bail!("indexing.staleness_days must be >= 1");
    }
    if config.retrieval.max_results < 1 {
        anyhow::bail!("retrieval.max_results must be >= 1");
    }
    if config.retrieval.focus_window_chars == 0 {
        anyhow::bail!("retrieval.focus_window_chars must be > 0");
    }

    Ok(config)
}
