use crate::error::EvalError;
use crate::metrics::config::MetricConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_URL: &str = "http://diversity-eval.s3-us-west-2.amazonaws.com/data.zip";

/// Settings for an OpenAI-compatible embeddings endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingSettings {
    /// API endpoint
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    #[serde(default = "default_env_var_api_key")]
    pub env_var_api_key: String,
    /// Embedding model
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Number of responses sent per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            env_var_api_key: default_env_var_api_key(),
            model: default_embedding_model(),
            batch_size: default_batch_size(),
        }
    }
}

/// Settings for a script-driven scorer living in its own tool directory
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandSettings {
    /// Directory holding the scoring script
    pub dir: PathBuf,
    /// Script run with `bash <script> -i <run_dir> -o <run_dir>`
    #[serde(default = "default_script")]
    pub script: String,
}

impl CommandSettings {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            script: default_script(),
        }
    }
}

/// External pairwise scorers used by file-backed metrics
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScorerSettings {
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default = "default_bert_sts")]
    pub bert_sts: CommandSettings,
    #[serde(default = "default_bert_score")]
    pub bert_score: CommandSettings,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self {
            embedding: EmbeddingSettings::default(),
            bert_sts: default_bert_sts(),
            bert_score: default_bert_score(),
        }
    }
}

fn default_api_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_env_var_api_key() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_batch_size() -> usize {
    64
}

fn default_script() -> String {
    "infer_sts.sh".to_string()
}

fn default_bert_sts() -> CommandSettings {
    CommandSettings::new("../bert-sts")
}

fn default_bert_score() -> CommandSettings {
    CommandSettings {
        dir: PathBuf::from("../bert-score"),
        script: "infer_score.sh".to_string(),
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_raw_data_dir() -> PathBuf {
    PathBuf::from("data").join("raw")
}

fn default_metrics_data_dir() -> PathBuf {
    PathBuf::from("data").join("with_metrics")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_experiments_dir() -> PathBuf {
    PathBuf::from("experiments")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data").join("cache")
}

fn default_data_url() -> String {
    DEFAULT_DATA_URL.to_string()
}

/// Root settings, optionally loaded from a TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Directory whose absence triggers the dataset download
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Default location of raw response CSVs
    #[serde(default = "default_raw_data_dir")]
    pub raw_data_dir: PathBuf,
    /// Where augmented CSVs are written
    #[serde(default = "default_metrics_data_dir")]
    pub metrics_data_dir: PathBuf,
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default = "default_experiments_dir")]
    pub experiments_dir: PathBuf,
    /// Pairwise TSVs and score caches of file-backed metrics
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Dataset archive fetched on first run
    #[serde(default = "default_data_url")]
    pub data_url: String,
    /// Per-metric option overrides, keyed by metric name
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricConfig>,
    #[serde(default)]
    pub scorers: ScorerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            raw_data_dir: default_raw_data_dir(),
            metrics_data_dir: default_metrics_data_dir(),
            results_dir: default_results_dir(),
            experiments_dir: default_experiments_dir(),
            cache_dir: default_cache_dir(),
            data_url: default_data_url(),
            metrics: BTreeMap::new(),
            scorers: ScorerSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Shared part of an experiment definition file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    pub class_name: String,
}

/// Experiment definition: a test class and its sub-experiment inputs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExperimentDefinition {
    pub global_config: GlobalConfig,
    /// Sub-experiment name -> input CSV path
    pub experiments: BTreeMap<String, PathBuf>,
}

impl ExperimentDefinition {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read experiment file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse experiment JSON: {}", path.display()))
    }
}

/// Configuration of one sub-experiment run through a statistical test
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SubExperimentConfig {
    pub exp_name: String,
    pub sub_exp_name: String,
    pub input_csv: PathBuf,
    pub out_dir: PathBuf,
    pub global_results_json: PathBuf,
    pub class_name: String,
    pub publish_plots: bool,
    pub publish_results: bool,
}

impl SubExperimentConfig {
    /// Build from a loose JSON mapping. Missing keys and non-boolean publish
    /// flags are configuration errors.
    pub fn from_value(value: serde_json::Value) -> std::result::Result<Self, EvalError> {
        serde_json::from_value(value).map_err(|e| EvalError::config(format!("invalid sub-experiment config: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sub-experiment config: {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse sub-experiment config: {}", path.display()))?;

        Ok(Self::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::config::ConfigValue;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_settings_parsing() {
        let toml_content = r#"
results_dir = "out/results"
cache_dir = "/tmp/cache"

[metrics.AveragedDistinctNgrams]
n_min = 2
n_max = 4

[scorers.embedding]
model = "all-mpnet"
batch_size = 16

[scorers.bert_sts]
dir = "/opt/bert-sts"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let settings = Settings::from_file(temp_file.path()).unwrap();
        assert_eq!(settings.results_dir, PathBuf::from("out/results"));
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/cache"));
        let overrides = &settings.metrics["AveragedDistinctNgrams"];
        assert_eq!(overrides.get("n_min"), Some(&ConfigValue::Int(2)));
        assert_eq!(settings.scorers.embedding.model, "all-mpnet");
        assert_eq!(settings.scorers.embedding.batch_size, 16);
        assert_eq!(settings.scorers.bert_sts.dir, PathBuf::from("/opt/bert-sts"));
        assert_eq!(settings.scorers.bert_sts.script, "infer_sts.sh");
    }

    #[test]
    fn test_settings_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "").unwrap();

        let settings = Settings::from_file(temp_file.path()).unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("data"));
        assert_eq!(settings.raw_data_dir, PathBuf::from("data/raw"));
        assert_eq!(settings.metrics_data_dir, PathBuf::from("data/with_metrics"));
        assert_eq!(settings.data_url, DEFAULT_DATA_URL);
        assert!(settings.metrics.is_empty());
        assert_eq!(settings.scorers.embedding.env_var_api_key, "OPENAI_API_KEY");
        assert_eq!(settings.scorers.bert_score.dir, PathBuf::from("../bert-score"));
    }

    #[test]
    fn test_settings_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "results_dir = [").unwrap();
        assert!(Settings::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_experiment_definition_parsing() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(
            temp_file,
            r#"{{"global_config": {{"class_name": "ConTest"}}, "experiments": {{"story": "data/story.csv", "prompt": "data/prompt.csv"}}}}"#
        )
        .unwrap();

        let definition = ExperimentDefinition::from_file(temp_file.path()).unwrap();
        assert_eq!(definition.global_config.class_name, "ConTest");
        assert_eq!(definition.experiments.len(), 2);
        assert_eq!(definition.experiments["story"], PathBuf::from("data/story.csv"));
    }

    fn sub_config_json() -> serde_json::Value {
        json!({
            "exp_name": "exp",
            "sub_exp_name": "sub",
            "input_csv": "in.csv",
            "out_dir": "out",
            "global_results_json": "out/results.json",
            "class_name": "DecTest",
            "publish_plots": false,
            "publish_results": true,
        })
    }

    #[test]
    fn test_sub_experiment_config_from_value() {
        let config = SubExperimentConfig::from_value(sub_config_json()).unwrap();
        assert_eq!(config.class_name, "DecTest");
        assert!(!config.publish_plots);
        assert!(config.publish_results);
    }

    #[test]
    fn test_sub_experiment_config_missing_key() {
        let mut value = sub_config_json();
        value.as_object_mut().unwrap().remove("out_dir");
        let result = SubExperimentConfig::from_value(value);
        assert!(matches!(result, Err(EvalError::Config(_))));
    }

    #[test]
    fn test_sub_experiment_config_non_boolean_flag() {
        let mut value = sub_config_json();
        value["publish_plots"] = json!("yes");
        let result = SubExperimentConfig::from_value(value);
        assert!(matches!(result, Err(EvalError::Config(_))));
    }
}
