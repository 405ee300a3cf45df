//! Shared types, error model, and configuration for the injury classifier.
//!
//! This crate is the foundation depended on by all other crates in the workspace.
//! It provides:
//! - [`InjuryClassError`]: the unified error type
//! - Domain types ([`InjuryLabel`], [`ModelId`], [`ArtifactHeader`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClassWeight, EvaluationConfig, ForestConfig, PathsConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{InjuryClassError, Result};
pub use types::{ARTIFACT_FORMAT, ArtifactHeader, CURRENT_SCHEMA_VERSION, InjuryLabel, ModelId};
