//! Application configuration for the injury classifier.
//!
//! User config lives at `~/.injuryclass/injuryclass.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{InjuryClassError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "injuryclass.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".injuryclass";

// ---------------------------------------------------------------------------
// Config structs (matching injuryclass.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Dataset and model locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Random forest hyperparameters.
    #[serde(default)]
    pub forest: ForestConfig,

    /// Hold-out evaluation settings.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

/// `[paths]` section. Relative paths resolve against the working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Mandatory labeled dataset.
    #[serde(default = "default_base_dataset")]
    pub base_dataset: PathBuf,

    /// Optional datasets appended after the base one (e.g. newly collected cases).
    #[serde(default = "default_supplementary")]
    pub supplementary: Vec<PathBuf>,

    /// Where the trained model artifact is written and read.
    #[serde(default = "default_model")]
    pub model: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dataset: default_base_dataset(),
            supplementary: default_supplementary(),
            model: default_model(),
        }
    }
}

fn default_base_dataset() -> PathBuf {
    "data/dataset.csv".into()
}
fn default_supplementary() -> Vec<PathBuf> {
    vec!["data/dataset_soccerprev_nuevos.csv".into()]
}
fn default_model() -> PathBuf {
    "model/modelo.json".into()
}

/// How training samples are weighted per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// `n_samples / (n_classes * n_class_samples)` so rare classes are not starved.
    #[default]
    Balanced,
    /// Every sample counts once.
    Uniform,
}

/// `[forest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the ensemble.
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Seed for bootstrap and feature sampling.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Maximum tree depth (unlimited when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    /// Minimum samples a node needs before it may be split.
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,

    /// Per-class sample weighting.
    #[serde(default)]
    pub class_weight: ClassWeight,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: default_n_estimators(),
            seed: default_seed(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            class_weight: ClassWeight::Balanced,
        }
    }
}

fn default_n_estimators() -> usize {
    300
}
fn default_seed() -> u64 {
    42
}
fn default_min_samples_split() -> usize {
    2
}

/// `[evaluation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Fraction of each class held out for the classification report.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    /// Seed for the stratified split.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            seed: default_seed(),
        }
    }
}

fn default_test_fraction() -> f64 {
    0.2
}

impl AppConfig {
    /// Reject values the training pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.forest.n_estimators == 0 {
            return Err(InjuryClassError::config("forest.n_estimators must be at least 1"));
        }
        if self.forest.min_samples_split < 2 {
            return Err(InjuryClassError::config(
                "forest.min_samples_split must be at least 2",
            ));
        }
        let fraction = self.evaluation.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(InjuryClassError::config(format!(
                "evaluation.test_fraction must be in (0, 1), got {fraction}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.injuryclass/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| InjuryClassError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.injuryclass/injuryclass.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| InjuryClassError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        InjuryClassError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| InjuryClassError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| InjuryClassError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| InjuryClassError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
