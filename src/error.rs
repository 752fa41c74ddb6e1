//! Error types for metric computation and statistical tests.
//!
//! Every variant is fatal: the pipeline is an offline batch tool and aborts on
//! the first inconsistency it detects.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    /// Missing or mistyped options, class-name mismatch, missing files/directories.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input data (response columns, labels, empty files).
    #[error("Input error in [{path}]: {reason}")]
    Input { path: PathBuf, reason: String },

    /// Cached pairwise scores do not line up with the expected pair count.
    #[error("Cache error in [{path}]: {reason}")]
    Cache { path: PathBuf, reason: String },

    /// External scorer failures (missing tool directory, process failure).
    #[error("External scorer error at [{path}]: {reason}")]
    External { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    pub fn input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Input {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn cache(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Cache {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn external(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::External {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
