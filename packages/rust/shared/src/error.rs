//! Error types for the injury classifier.
//!
//! Library crates use [`InjuryClassError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all training and inference operations.
#[derive(Debug, thiserror::Error)]
pub enum InjuryClassError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Training data is missing, unreadable, or unusable.
    #[error("dataset error: {message}")]
    Dataset { message: String },

    /// Malformed CSV content.
    #[error("CSV error: {0}")]
    Csv(String),

    /// Data validation error (shape mismatch, invalid parameter, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Model artifact missing, corrupt, or incompatible.
    #[error("artifact error: {message}")]
    Artifact { message: String },

    /// An inference payload could not be interpreted as a record.
    #[error("invalid input: {message}")]
    Input { message: String },

    /// Classification failed for an otherwise valid record.
    #[error("prediction error: {0}")]
    Prediction(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, InjuryClassError>;

impl InjuryClassError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a dataset error from any displayable message.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an artifact error from any displayable message.
    pub fn artifact(msg: impl Into<String>) -> Self {
        Self::Artifact {
            message: msg.into(),
        }
    }

    /// Create an input error from any displayable message.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
