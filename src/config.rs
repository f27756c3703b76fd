//! TOML configuration for the retrieval engine.
//!
//! Every section is optional; a missing section takes the defaults shown
//! below, so an empty file is a valid configuration.
//!
//! ```toml
//! [index]
//! dir = "./data/index"
//!
//! [retrieval]
//! hybrid_weight = 0.5
//! oversample = 2
//! bm25_k1 = 1.5
//! bm25_b = 0.75
//! final_limit = 8
//!
//! [multi_hop]
//! max_hops = 3
//!
//! [embedding]
//! provider = "ollama"          # disabled | ollama | local
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [expansion]
//! synonyms_path = "config/synonyms.toml"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use recall_core::expand::SynonymTable;
use recall_core::lexical::Bm25Params;
use recall_core::search::SearchParams;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub multi_hop: MultiHopConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub expansion: ExpansionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding `corpus.json` and `embeddings.json`.
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./data/index")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_hybrid_weight")]
    pub hybrid_weight: f64,
    /// Shortlist multiplier applied before reranking.
    #[serde(default = "default_oversample")]
    pub oversample: usize,
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f64,
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f64,
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_weight: default_hybrid_weight(),
            oversample: default_oversample(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            final_limit: default_final_limit(),
        }
    }
}

impl RetrievalConfig {
    pub fn bm25_params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.bm25_k1,
            b: self.bm25_b,
        }
    }

    pub fn search_params(&self, top_k: usize) -> SearchParams {
        SearchParams {
            hybrid_weight: self.hybrid_weight,
            top_k,
        }
    }
}

fn default_hybrid_weight() -> f64 {
    0.5
}
fn default_oversample() -> usize {
    2
}
fn default_bm25_k1() -> f64 {
    1.5
}
fn default_bm25_b() -> f64 {
    0.75
}
fn default_final_limit() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct MultiHopConfig {
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
}

impl Default for MultiHopConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
        }
    }
}

fn default_max_hops() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            url: None,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExpansionConfig {
    /// TOML file with a `[synonyms]` table. Relative paths resolve against
    /// the config file's directory.
    #[serde(default)]
    pub synonyms_path: Option<PathBuf>,
}

impl ExpansionConfig {
    /// Load the configured synonym table, or an empty one when unset.
    pub fn load_synonyms(&self) -> Result<SynonymTable> {
        let Some(path) = &self.synonyms_path else {
            return Ok(SynonymTable::new());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read synonym table: {}", path.display()))?;
        let table = SynonymTable::from_toml_str(&content)
            .with_context(|| format!("Failed to parse synonym table: {}", path.display()))?;
        Ok(table)
    }
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;

    if let Some(base) = path.parent() {
        if let Some(synonyms) = &config.expansion.synonyms_path {
            if synonyms.is_relative() {
                config.expansion.synonyms_path = Some(base.join(synonyms));
            }
        }
    }

    Ok(config)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check value ranges and provider requirements.
pub fn validate(config: &Config) -> Result<()> {
    // Validate retrieval
    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }

    if config.retrieval.oversample < 1 {
        anyhow::bail!("retrieval.oversample must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.retrieval.hybrid_weight) {
        anyhow::bail!("retrieval.hybrid_weight must be in [0.0, 1.0]");
    }

    if !(0.0..=1.0).contains(&config.retrieval.bm25_b) {
        anyhow::bail!("retrieval.bm25_b must be in [0.0, 1.0]");
    }

    if !config.retrieval.bm25_k1.is_finite() || config.retrieval.bm25_k1 < 0.0 {
        anyhow::bail!("retrieval.bm25_k1 must be >= 0");
    }

    if config.multi_hop.max_hops < 1 {
        anyhow::bail!("multi_hop.max_hops must be >= 1");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, or local.",
            other
        ),
    }

    Ok(())
}
