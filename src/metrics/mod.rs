//! Diversity and similarity metrics over response sets.
//!
//! Set-level metrics implement [`DiversityMetric`]; pairwise metrics implement
//! [`SimilarityMetric`] and are lifted to set level by
//! [`adapters::Similarity2Diversity`]. Metrics scored by an external batch
//! process go through [`from_file::SimilarityFromFile`], which looks scores up
//! by row index instead of by text.

pub mod adapters;
pub mod config;
pub mod from_file;
pub mod ngram;
pub mod registry;
pub mod scorers;

use crate::error::{EvalError, Result};
use from_file::SimilarityFromFile;
use serde::Serialize;

/// Scores how varied a whole response set is.
pub trait DiversityMetric {
    fn diversity(&self, response_set: &[String]) -> f64;
}

/// Scores how alike two responses are, in [0, 1].
pub trait SimilarityMetric {
    fn similarity(&self, resp_a: &str, resp_b: &str) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricKind {
    Diversity,
    Similarity2Diversity,
    Similarity2DiversityFromFile,
}

/// What a metric is fed per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequiredInput {
    ResponseSet,
    SetIndex,
}

impl MetricKind {
    pub fn required_input(self) -> RequiredInput {
        match self {
            MetricKind::Similarity2DiversityFromFile => RequiredInput::SetIndex,
            _ => RequiredInput::ResponseSet,
        }
    }
}

/// A constructed, ready-to-score metric.
pub enum Metric {
    Set(Box<dyn DiversityMetric>),
    FromFile(SimilarityFromFile),
}

impl Metric {
    /// Score one row. `row_index` is the row's ordinal in its file.
    pub fn score(&self, row_index: usize, response_set: &[String]) -> Result<f64> {
        match self {
            Metric::Set(metric) => Ok(metric.diversity(response_set)),
            Metric::FromFile(metric) => metric.diversity_at(row_index),
        }
    }

    pub fn as_file_backed_mut(&mut self) -> Option<&mut SimilarityFromFile> {
        match self {
            Metric::FromFile(metric) => Some(metric),
            Metric::Set(_) => None,
        }
    }
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Set(_) => f.write_str("Metric::Set"),
            Metric::FromFile(metric) => f.debug_tuple("Metric::FromFile").field(metric).finish(),
        }
    }
}

pub(crate) fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(EvalError::config(reason()))
    }
}
