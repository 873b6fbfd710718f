//! Pipeline configuration and output layout.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors. Surfaced before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Parameters of one build run.
///
/// ```toml
/// input_dir = "raw/xd"
/// output_dir = "dataset"
/// limit = 1000
/// workers = 4
/// snapshot_every = 100
/// source = "xd"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Process only the first N files in sorted order.
    pub limit: Option<usize>,
    /// Reprocess files that already have a success entry.
    pub force: bool,
    /// Parser threads. 0 lets rayon pick.
    pub workers: usize,
    /// Ledger snapshot interval, in processed files.
    pub snapshot_every: usize,
    /// Provenance tag stamped on every record.
    pub source: String,
    /// File extension of raw puzzle files, without the dot.
    pub extension: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("raw"),
            output_dir: PathBuf::from("dataset"),
            limit: None,
            force: false,
            workers: 0,
            snapshot_every: 100,
            source: "xd".into(),
            extension: "xd".into(),
        }
    }
}

impl PipelineConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string. Missing keys take defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_every == 0 {
            return Err(ConfigError::Invalid("snapshot_every must be at least 1".into()));
        }
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::Invalid("extension must not be empty".into()));
        }
        if self.limit == Some(0) {
            return Err(ConfigError::Invalid("limit must be at least 1 when set".into()));
        }
        Ok(())
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_dir)
    }

    /// Worker count handed to the thread pool builder.
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            rayon::current_num_threads()
        } else {
            self.workers
        }
    }
}

/// Every artifact path under the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub const DATASET: &'static str = "puzzles.jsonl";
    pub const LEDGER: &'static str = "ledger.json";
    pub const FAILURES: &'static str = "failures.log";
    pub const SUMMARY: &'static str = "puzzles_summary.csv";
    pub const STATS: &'static str = "stats.json";
    pub const VALIDATION: &'static str = "validation.json";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset(&self) -> PathBuf {
        self.root.join(Self::DATASET)
    }

    pub fn ledger(&self) -> PathBuf {
        self.root.join(Self::LEDGER)
    }

    pub fn failures(&self) -> PathBuf {
        self.root.join(Self::FAILURES)
    }

    pub fn summary(&self) -> PathBuf {
        self.root.join(Self::SUMMARY)
    }

    pub fn stats(&self) -> PathBuf {
        self.root.join(Self::STATS)
    }

    pub fn validation(&self) -> PathBuf {
        self.root.join(Self::VALIDATION)
    }
}
