//! Static table of the metrics the runner can compute.

use super::adapters::{AveragedNgram, Similarity2Diversity};
use super::config::{ConfigValue, IGNORE_CACHE, MetricConfig};
use super::from_file::SimilarityFromFile;
use super::ngram::{CosineSimilarity, DistinctNgrams};
use super::scorers::{CommandScorer, EmbeddingScorer, ExternalScorer};
use super::{DiversityMetric, Metric, MetricKind, RequiredInput};
use crate::config::ScorerSettings;
use crate::error::{EvalError, Result};
use crate::utils::metric_field_name;
use serde::Serialize;
use std::collections::BTreeMap;

type Build = fn(&str, &MetricConfig, &ScorerSettings) -> Result<Metric>;

#[derive(Serialize)]
pub struct MetricEntry {
    pub name: &'static str,
    pub kind: MetricKind,
    /// Computed when no metrics are named explicitly
    pub use_by_default: bool,
    #[serde(skip)]
    default_config: fn() -> MetricConfig,
    #[serde(skip)]
    build: Build,
}

impl MetricEntry {
    pub fn field_name(&self) -> String {
        metric_field_name(self.name)
    }

    pub fn required_input(&self) -> RequiredInput {
        self.kind.required_input()
    }

    pub fn default_config(&self) -> MetricConfig {
        (self.default_config)()
    }

    /// Default configuration overlaid with user overrides and the cache flag.
    pub fn config_with(&self, overrides: &BTreeMap<String, MetricConfig>, ignore_cache: bool) -> MetricConfig {
        let mut config = self.default_config();
        if let Some(user) = overrides.get(self.name) {
            config.merge(user);
        }
        if ignore_cache {
            config.set(IGNORE_CACHE, ConfigValue::Bool(true));
        }
        config
    }

    pub fn build(&self, config: &MetricConfig, scorers: &ScorerSettings) -> Result<Metric> {
        (self.build)(self.name, config, scorers)
            .map_err(|e| match e {
                EvalError::Config(reason) => EvalError::config(format!("{}: {}", self.name, reason)),
                other => other,
            })
    }
}

fn n_config() -> MetricConfig {
    MetricConfig::new().with("n", ConfigValue::Int(3))
}

fn n_range_config() -> MetricConfig {
    MetricConfig::new()
        .with("n_min", ConfigValue::Int(1))
        .with("n_max", ConfigValue::Int(5))
}

fn distinct_ngrams(config: &MetricConfig) -> Result<Box<dyn DiversityMetric>> {
    Ok(Box::new(DistinctNgrams::new(config)?))
}

fn cosine_similarity_2_diversity(config: &MetricConfig) -> Result<Box<dyn DiversityMetric>> {
    Ok(Box::new(Similarity2Diversity::new(CosineSimilarity::new(config)?)))
}

pub static METRICS: &[MetricEntry] = &[
    MetricEntry {
        name: "DistinctNgrams",
        kind: MetricKind::Diversity,
        use_by_default: false,
        default_config: n_config,
        build: |_, config, _| Ok(Metric::Set(distinct_ngrams(config)?)),
    },
    MetricEntry {
        name: "AveragedDistinctNgrams",
        kind: MetricKind::Diversity,
        use_by_default: true,
        default_config: n_range_config,
        build: |_, config, _| Ok(Metric::Set(Box::new(AveragedNgram::new(config, distinct_ngrams)?))),
    },
    MetricEntry {
        name: "CosineSimilarity2Diversity",
        kind: MetricKind::Similarity2Diversity,
        use_by_default: false,
        default_config: n_config,
        build: |_, config, _| Ok(Metric::Set(cosine_similarity_2_diversity(config)?)),
    },
    MetricEntry {
        name: "AveragedCosineSimilarity",
        kind: MetricKind::Similarity2Diversity,
        use_by_default: true,
        default_config: n_range_config,
        build: |_, config, _| {
            Ok(Metric::Set(Box::new(AveragedNgram::new(config, cosine_similarity_2_diversity)?)))
        },
    },
    MetricEntry {
        name: "BertScore",
        kind: MetricKind::Similarity2DiversityFromFile,
        use_by_default: true,
        default_config: MetricConfig::new,
        build: |name, config, scorers| {
            let scorer = ExternalScorer::Command(CommandScorer::new(scorers.bert_score.clone()));
            Ok(Metric::FromFile(SimilarityFromFile::new(name, config, scorer)?))
        },
    },
    MetricEntry {
        name: "BertSts",
        kind: MetricKind::Similarity2DiversityFromFile,
        use_by_default: true,
        default_config: MetricConfig::new,
        build: |name, config, scorers| {
            let scorer = ExternalScorer::Command(CommandScorer::new(scorers.bert_sts.clone()));
            Ok(Metric::FromFile(SimilarityFromFile::new(name, config, scorer)?))
        },
    },
    MetricEntry {
        name: "SentBert",
        kind: MetricKind::Similarity2DiversityFromFile,
        use_by_default: true,
        default_config: MetricConfig::new,
        build: |name, config, scorers| {
            let scorer = ExternalScorer::Embedding(EmbeddingScorer::new(scorers.embedding.clone()));
            Ok(Metric::FromFile(SimilarityFromFile::new(name, config, scorer)?))
        },
    },
];

pub fn lookup(name: &str) -> Result<&'static MetricEntry> {
    METRICS
        .iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| EvalError::config(format!("unknown metric '{}'", name)))
}

/// Resolve a comma-separated list of metric names; an empty list selects
/// every metric enabled by default.
pub fn select(names: &str) -> Result<Vec<&'static MetricEntry>> {
    if names.trim().is_empty() {
        return Ok(METRICS.iter().filter(|entry| entry.use_by_default).collect());
    }

    let mut selected: Vec<&'static MetricEntry> = Vec::new();
    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let entry = lookup(name)?;
        if !selected.iter().any(|e| e.name == entry.name) {
            selected.push(entry);
        }
    }
    if selected.is_empty() {
        return Err(EvalError::config("No metrics to calculate."));
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_selection() {
        let names: Vec<&str> = select("").unwrap().iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec!["AveragedDistinctNgrams", "AveragedCosineSimilarity", "BertScore", "BertSts", "SentBert"]
        );
    }

    #[test]
    fn test_explicit_selection_dedupes() {
        let selected = select("DistinctNgrams, DistinctNgrams,BertSts").unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[1].required_input(), RequiredInput::SetIndex);
    }

    #[test]
    fn test_unknown_metric() {
        assert!(matches!(select("NoSuchMetric"), Err(EvalError::Config(_))));
        assert!(matches!(select(" , "), Err(EvalError::Config(_))));
    }

    #[test]
    fn test_field_names() {
        assert_eq!(lookup("AveragedCosineSimilarity").unwrap().field_name(), "metric_averaged_cosine_similarity");
        assert_eq!(lookup("BertSts").unwrap().field_name(), "metric_bert_sts");
    }

    #[test]
    fn test_config_with_overrides_and_cache_flag() {
        let entry = lookup("AveragedDistinctNgrams").unwrap();
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "AveragedDistinctNgrams".to_string(),
            MetricConfig::new().with("n_max", ConfigValue::Int(2)),
        );

        let config = entry.config_with(&overrides, true);
        assert_eq!(config.uint("n_min").unwrap(), 1);
        assert_eq!(config.uint("n_max").unwrap(), 2);
        assert!(config.flag(IGNORE_CACHE).unwrap());
    }

    #[test]
    fn test_build_set_metrics() {
        let scorers = ScorerSettings::default();
        let responses = set(&["i am going", "i am going", "lets go i i"]);

        let distinct = lookup("DistinctNgrams").unwrap();
        let metric = distinct.build(&distinct.default_config(), &scorers).unwrap();
        assert_eq!(distinct.required_input(), RequiredInput::ResponseSet);
        assert!((metric.score(0, &responses).unwrap() - 0.75).abs() < 1e-9);

        let cosine = lookup("CosineSimilarity2Diversity").unwrap();
        let metric = cosine.build(&cosine.default_config(), &scorers).unwrap();
        assert!((metric.score(0, &responses).unwrap() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_build_reports_metric_name_on_bad_config() {
        let entry = lookup("DistinctNgrams").unwrap();
        let config = MetricConfig::new().with("n", ConfigValue::Int(-3));
        let err = entry.build(&config, &ScorerSettings::default()).unwrap_err();
        assert!(err.to_string().contains("DistinctNgrams"));
    }

    #[test]
    fn test_file_backed_metric_requires_binding() {
        let entry = lookup("SentBert").unwrap();
        let result = entry.build(&entry.default_config(), &ScorerSettings::default());
        assert!(matches!(result, Err(EvalError::Config(_))));
    }
}
