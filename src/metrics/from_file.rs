//! Similarity-to-diversity over scores produced by an external batch process.
//!
//! Pairs of every response set in an input file are enumerated in a fixed
//! order (set, then sample `i`, then `j < i`), scored once in bulk, and cached.
//! Row `r` of the file owns the contiguous window of `C(k, 2)` cached scores
//! starting at `r * C(k, 2)`.

use super::config::{ConfigValue, IGNORE_CACHE, MetricConfig};
use super::scorers::{self, ExternalScorer, PairwiseScorer, ResponsePair};
use crate::error::{EvalError, Result};
use crate::statistics::mean;
use crate::utils::{camel_to_snake_case, pair_count};
use std::path::{Component, Path, PathBuf};

pub const INPUT_PATH: &str = "input_path";
pub const NUM_SETS: &str = "num_sets";
pub const SAMPLES_PER_SET: &str = "samples_per_set";
pub const CACHE_FILE: &str = "cache_file";
pub const INPUT_TSV: &str = "input_tsv";

/// Fill the per-file options of a file-backed metric. Cache and pairwise TSV
/// live under `cache_dir/<metric>/`, named after the input path.
pub fn bind_file_config(
    config: &mut MetricConfig,
    metric_name: &str,
    input_path: &Path,
    num_sets: usize,
    samples_per_set: usize,
    cache_dir: &Path,
) {
    let key = cache_key(input_path);
    let dir = cache_dir.join(camel_to_snake_case(metric_name));

    config.set(INPUT_PATH, ConfigValue::Text(input_path.display().to_string()));
    config.set(NUM_SETS, ConfigValue::Int(num_sets as i64));
    config.set(SAMPLES_PER_SET, ConfigValue::Int(samples_per_set as i64));
    config.set(CACHE_FILE, ConfigValue::Text(dir.join(format!("{}.txt", key)).display().to_string()));
    config.set(INPUT_TSV, ConfigValue::Text(dir.join(format!("{}.tsv", key)).display().to_string()));
}

/// `data/raw/story.csv` -> `data__raw__story`. Components are joined with
/// `__`; `_`, `%` and `:` inside a component are percent-escaped so distinct
/// paths never share a key. `..` stays as `..` and a root gives a leading
/// empty component.
fn cache_key(input_path: &Path) -> String {
    let stem = input_path.with_extension("");
    stem.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(escape_key_part(&part.to_string_lossy())),
            Component::Prefix(prefix) => Some(escape_key_part(&prefix.as_os_str().to_string_lossy())),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir => Some(String::new()),
            Component::CurDir => None,
        })
        .collect::<Vec<_>>()
        .join("__")
}

fn escape_key_part(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for ch in part.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            '_' => escaped.push_str("%5F"),
            ':' => escaped.push_str("%3A"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Enumerate all pairs of all sets in cache order.
pub fn enumerate_pairs(response_sets: &[Vec<String>]) -> Vec<ResponsePair> {
    let mut pairs = Vec::new();
    for (context, set) in response_sets.iter().enumerate() {
        for sample_i in 0..set.len() {
            for sample_j in 0..sample_i {
                pairs.push(ResponsePair {
                    index: pairs.len(),
                    context,
                    sample_i,
                    sample_j,
                    sentence1: set[sample_i].clone(),
                    sentence2: set[sample_j].clone(),
                });
            }
        }
    }
    pairs
}

#[derive(Debug)]
pub struct SimilarityFromFile {
    name: String,
    input_path: PathBuf,
    num_sets: usize,
    samples_per_set: usize,
    cache_file: PathBuf,
    input_tsv: PathBuf,
    ignore_cache: bool,
    scorer: ExternalScorer,
    scores: Option<Vec<f64>>,
}

impl SimilarityFromFile {
    pub fn new(name: &str, config: &MetricConfig, scorer: ExternalScorer) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            input_path: config.path(INPUT_PATH)?,
            num_sets: config.uint(NUM_SETS)?,
            samples_per_set: config.uint(SAMPLES_PER_SET)?,
            cache_file: config.path(CACHE_FILE)?,
            input_tsv: config.path(INPUT_TSV)?,
            ignore_cache: config.flag(IGNORE_CACHE)?,
            scorer,
            scores: None,
        })
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    fn expected_scores(&self) -> usize {
        self.num_sets * pair_count(self.samples_per_set)
    }

    /// Make cached scores available, computing them with the wired scorer if
    /// needed.
    pub async fn prepare(&mut self, response_sets: &[Vec<String>]) -> Result<()> {
        let scorer = self.scorer.clone();
        self.prepare_with(&scorer, response_sets).await
    }

    pub async fn prepare_with<S: PairwiseScorer>(&mut self, scorer: &S, response_sets: &[Vec<String>]) -> Result<()> {
        if response_sets.len() != self.num_sets {
            return Err(EvalError::input(
                &self.input_path,
                format!("expected {} response sets, got {}", self.num_sets, response_sets.len()),
            ));
        }
        if let Some(set) = response_sets.iter().find(|s| s.len() != self.samples_per_set) {
            return Err(EvalError::input(
                &self.input_path,
                format!("expected {} samples per set, got {}", self.samples_per_set, set.len()),
            ));
        }

        if self.ignore_cache || !self.cache_file.is_file() {
            let pairs = enumerate_pairs(response_sets);
            scorers::write_pairs_tsv(&self.input_tsv, &pairs)?;
            tracing::info!(metric = %self.name, pairs = pairs.len(), tsv = %self.input_tsv.display(), "Computing pairwise scores");

            let scores = scorer.score_pairs(&pairs).await?;
            scorers::write_scores(&self.cache_file, &scores)?;
        } else {
            tracing::debug!(metric = %self.name, cache = %self.cache_file.display(), "Using cached scores");
        }

        let scores = scorers::read_scores(&self.cache_file)?;
        if scores.len() != self.expected_scores() {
            return Err(EvalError::cache(
                &self.cache_file,
                format!(
                    "expected {} scores ({} sets x {} pairs), found {}",
                    self.expected_scores(),
                    self.num_sets,
                    pair_count(self.samples_per_set),
                    scores.len()
                ),
            ));
        }

        self.scores = Some(scores);
        Ok(())
    }

    /// Diversity of the set at `set_index`: one minus its mean pair score.
    pub fn diversity_at(&self, set_index: usize) -> Result<f64> {
        let scores = self
            .scores
            .as_ref()
            .ok_or_else(|| EvalError::cache(&self.cache_file, format!("{} scores were not prepared", self.name)))?;
        if set_index >= self.num_sets {
            return Err(EvalError::input(
                &self.input_path,
                format!("set index {} out of range ({} sets)", set_index, self.num_sets),
            ));
        }

        let window = pair_count(self.samples_per_set);
        let start = set_index * window;
        Ok(mean(&scores[start..start + window]).map_or(0.0, |m| 1.0 - m))
    }
}
