use crate::error::Result;
use crate::reports::DEFAULT_INTERVAL_PAIRS;
use crate::scanner::default_patterns;
use crate::stats::DEFAULT_ITERATIONS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime settings. Every field is optional in the YAML file.
///
/// ```yaml
/// dataset_dir: datasets
/// patterns: ["data/*.xlsx"]
/// output_dir: out
/// bootstrap_iterations: 3000
/// bootstrap_seed: 42
/// interval_pairs: [[2021, 2022], [2022, 2023]]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub dataset_dir: PathBuf,
    /// Empty means the default patterns under `dataset_dir`.
    pub patterns: Vec<String>,
    pub output_dir: PathBuf,
    pub bootstrap_iterations: usize,
    pub bootstrap_seed: Option<u64>,
    pub interval_pairs: Vec<(i32, i32)>,
    pub preview_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            dataset_dir: PathBuf::from("datasets"),
            patterns: Vec::new(),
            output_dir: PathBuf::from("."),
            bootstrap_iterations: DEFAULT_ITERATIONS,
            bootstrap_seed: None,
            interval_pairs: DEFAULT_INTERVAL_PAIRS.to_vec(),
            preview_rows: 5,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn effective_patterns(&self) -> Vec<String> {
        if self.patterns.is_empty() {
            default_patterns(&self.dataset_dir)
        } else {
            self.patterns.clone()
        }
    }
}
