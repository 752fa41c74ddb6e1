//! N-gram based metrics.

use super::config::MetricConfig;
use super::{DiversityMetric, SimilarityMetric};
use crate::error::Result;
use crate::utils::{self, Ngram};
use std::collections::{HashMap, HashSet};

/// Portion of unique n-grams out of all n-grams in a response set.
#[derive(Debug, Clone)]
pub struct DistinctNgrams {
    n: usize,
}

impl DistinctNgrams {
    pub fn new(config: &MetricConfig) -> Result<Self> {
        Ok(Self { n: config.uint("n")? })
    }

    /// Value in (0, 1], or 0 when no n-grams were produced.
    pub fn normalized_unique_ngrams(ngram_lists: &[Vec<Ngram>]) -> f64 {
        let all: Vec<&Ngram> = ngram_lists.iter().flatten().collect();
        if all.is_empty() {
            return 0.0;
        }
        let unique: HashSet<&Ngram> = all.iter().copied().collect();
        unique.len() as f64 / all.len() as f64
    }
}

impl DiversityMetric for DistinctNgrams {
    fn diversity(&self, response_set: &[String]) -> f64 {
        Self::normalized_unique_ngrams(&utils::lines_to_ngrams(response_set, self.n))
    }
}

/// Cosine similarity of two responses in n-gram count space.
#[derive(Debug, Clone)]
pub struct CosineSimilarity {
    n: usize,
}

impl CosineSimilarity {
    pub fn new(config: &MetricConfig) -> Result<Self> {
        Ok(Self { n: config.uint("n")? })
    }

    /// Cosine distance between two n-gram lists. Disjoint lists (including
    /// empty ones) are at distance 1 without vectorizing.
    pub fn ngram_cosine_distance(ngrams_a: &[Ngram], ngrams_b: &[Ngram]) -> f64 {
        let counts_a = counts(ngrams_a);
        let counts_b = counts(ngrams_b);
        if !counts_a.keys().any(|gram| counts_b.contains_key(gram)) {
            return 1.0;
        }

        let dot: f64 = counts_a
            .iter()
            .filter_map(|(gram, a)| counts_b.get(gram).map(|b| a * b))
            .sum();
        let norm_a = counts_a.values().map(|c| c * c).sum::<f64>().sqrt();
        let norm_b = counts_b.values().map(|c| c * c).sum::<f64>().sqrt();

        1.0 - dot / (norm_a * norm_b)
    }
}

fn counts(ngrams: &[Ngram]) -> HashMap<&Ngram, f64> {
    let mut counts = HashMap::new();
    for gram in ngrams {
        *counts.entry(gram).or_insert(0.0) += 1.0;
    }
    counts
}

impl SimilarityMetric for CosineSimilarity {
    fn similarity(&self, resp_a: &str, resp_b: &str) -> f64 {
        let ngrams = utils::lines_to_ngrams(&[resp_a, resp_b], self.n);
        1.0 - Self::ngram_cosine_distance(&ngrams[0], &ngrams[1])
    }
}
