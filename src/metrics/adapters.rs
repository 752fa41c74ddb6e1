//! Adapters that derive set-level diversity from other metrics.

use super::config::{ConfigValue, MetricConfig};
use super::{DiversityMetric, SimilarityMetric, ensure};
use crate::error::Result;
use crate::statistics::mean;

/// Diversity as one minus the mean similarity over all unordered pairs.
#[derive(Debug, Clone)]
pub struct Similarity2Diversity<S> {
    similarity: S,
}

impl<S: SimilarityMetric> Similarity2Diversity<S> {
    pub fn new(similarity: S) -> Self {
        Self { similarity }
    }
}

impl<S: SimilarityMetric> DiversityMetric for Similarity2Diversity<S> {
    fn diversity(&self, response_set: &[String]) -> f64 {
        let mut similarities = Vec::new();
        for i in 0..response_set.len() {
            for j in 0..i {
                similarities.push(self.similarity.similarity(&response_set[i], &response_set[j]));
            }
        }
        // fewer than two responses carry no pairwise signal
        mean(&similarities).map_or(0.0, |m| 1.0 - m)
    }
}

/// Largest number of n values one averaged metric may sweep.
pub const MAX_N_SWEEP: usize = 16;

/// Mean score of a metric family over an inclusive range of n.
pub struct AveragedNgram {
    members: Vec<Box<dyn DiversityMetric>>,
}

impl AveragedNgram {
    /// Build one member per n in `[n_min, n_max]` by passing `{"n": n}` to `build`.
    pub fn new<F>(config: &MetricConfig, build: F) -> Result<Self>
    where
        F: Fn(&MetricConfig) -> Result<Box<dyn DiversityMetric>>,
    {
        let n_min = config.uint("n_min")?;
        let n_max = config.uint("n_max")?;
        ensure(n_min <= n_max, || format!("n_min ({}) must not exceed n_max ({})", n_min, n_max))?;
        ensure(n_max - n_min < MAX_N_SWEEP, || {
            format!("n range {}..={} spans more than {} values", n_min, n_max, MAX_N_SWEEP)
        })?;

        let members = (n_min..=n_max)
            .map(|n| build(&MetricConfig::new().with("n", ConfigValue::Int(n as i64))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { members })
    }
}

impl DiversityMetric for AveragedNgram {
    fn diversity(&self, response_set: &[String]) -> f64 {
        let scores: Vec<f64> = self.members.iter().map(|m| m.diversity(response_set)).collect();
        mean(&scores).unwrap_or(0.0)
    }
}
