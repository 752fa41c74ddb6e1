use crate::config::{ExperimentDefinition, Settings, SubExperimentConfig};
use crate::error::EvalError;
use crate::experiment::{MetricsTest, run_test, tests_by_class_name};
use crate::models::SubExperimentReport;
use crate::utils::parse_path_list;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Options of one `experiments` invocation
#[derive(Debug, Clone)]
pub struct ExperimentsRequest {
    /// Comma-separated definition files or directories; empty means the experiments directory
    pub input_json: String,
    pub publish_plots: bool,
    pub publish_results: bool,
}

impl Default for ExperimentsRequest {
    fn default() -> Self {
        Self {
            input_json: String::new(),
            publish_plots: true,
            publish_results: true,
        }
    }
}

/// Runs every sub-experiment of the selected experiment definitions
pub struct ExperimentRunner<'a> {
    settings: &'a Settings,
    request: ExperimentsRequest,
    tests: BTreeMap<&'static str, Box<dyn MetricsTest>>,
}

impl<'a> ExperimentRunner<'a> {
    pub fn new(settings: &'a Settings, request: ExperimentsRequest) -> Self {
        Self {
            settings,
            request,
            tests: tests_by_class_name(),
        }
    }

    pub fn run(&self) -> Result<Vec<SubExperimentReport>> {
        let paths = parse_path_list(&self.request.input_json, &self.settings.experiments_dir, "json")?;
        tracing::info!(experiments = paths.len(), "Running experiments");

        let mut reports = Vec::new();
        for path in paths {
            let configs = self
                .sub_experiment_configs(&path)
                .with_context(|| format!("Failed to load experiment: {}", path.display()))?;
            for config in configs {
                std::fs::create_dir_all(&config.out_dir)
                    .with_context(|| format!("Failed to create directory: {}", config.out_dir.display()))?;
                reports.push(self.run_config(&config)?);
            }
        }
        Ok(reports)
    }

    /// Expand a definition file into one config per sub-experiment.
    /// Experiment name is the file stem.
    pub fn sub_experiment_configs(&self, path: &Path) -> Result<Vec<SubExperimentConfig>> {
        let definition = ExperimentDefinition::from_file(path)?;
        let exp_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| EvalError::config(format!("[{}] has no file name", path.display())))?;
        let exp_dir = self.settings.results_dir.join(&exp_name);

        Ok(definition
            .experiments
            .into_iter()
            .map(|(sub_exp_name, input_csv)| SubExperimentConfig {
                exp_name: exp_name.clone(),
                out_dir: exp_dir.join(&sub_exp_name),
                sub_exp_name,
                input_csv,
                global_results_json: exp_dir.join("results.json"),
                class_name: definition.global_config.class_name.clone(),
                publish_plots: self.request.publish_plots,
                publish_results: self.request.publish_results,
            })
            .collect())
    }

    /// Route a single sub-experiment config to its test and run it.
    /// `out_dir` must already exist.
    pub fn run_config(&self, config: &SubExperimentConfig) -> Result<SubExperimentReport> {
        let test = self
            .tests
            .get(config.class_name.as_str())
            .ok_or_else(|| EvalError::config(format!("unknown test class '{}'", config.class_name)))?;

        tracing::info!(exp = %config.exp_name, sub = %config.sub_exp_name, class = %config.class_name, "Running test");
        let results = run_test(test.as_ref(), config)
            .with_context(|| format!("Failed to run {} / {}", config.exp_name, config.sub_exp_name))?;

        Ok(SubExperimentReport {
            exp_name: config.exp_name.clone(),
            sub_exp_name: config.sub_exp_name.clone(),
            class_name: config.class_name.clone(),
            results,
        })
    }
}

/// Run a standalone sub-experiment config file
pub fn run_config_file(settings: &Settings, path: &Path) -> Result<SubExperimentReport> {
    let config = SubExperimentConfig::from_file(path)?;
    ExperimentRunner::new(settings, ExperimentsRequest::default()).run_config(&config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    const DEC_CSV: &str = "label_name,label_value,metric_a\n\
                           temperature,0.2,0.1\n\
                           temperature,0.5,0.3\n\
                           temperature,0.8,0.2\n";

    fn setup(root: &Path, class_name: &str) -> Settings {
        let data = root.join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("low.csv"), DEC_CSV).unwrap();
        fs::write(data.join("high.csv"), DEC_CSV).unwrap();

        let experiments_dir = root.join("experiments");
        fs::create_dir_all(&experiments_dir).unwrap();
        let definition = json!({
            "global_config": {"class_name": class_name},
            "experiments": {
                "low": data.join("low.csv"),
                "high": data.join("high.csv"),
            }
        });
        fs::write(experiments_dir.join("dec_story.json"), definition.to_string()).unwrap();

        Settings {
            experiments_dir,
            results_dir: root.join("results"),
            ..Settings::default()
        }
    }

    #[test]
    fn test_run_all_sub_experiments() {
        let temp_dir = tempdir().unwrap();
        let settings = setup(temp_dir.path(), "DecTest");

        let reports = ExperimentRunner::new(&settings, ExperimentsRequest::default()).run().unwrap();
        let names: Vec<&str> = reports.iter().map(|r| r.sub_exp_name.as_str()).collect();
        assert_eq!(names, vec!["high", "low"]);
        assert!(reports.iter().all(|r| r.exp_name == "dec_story"));

        let exp_dir = temp_dir.path().join("results").join("dec_story");
        assert!(exp_dir.join("low").join("dec_story_low_a.json").exists());
        assert!(exp_dir.join("results.json").exists());
        let csv = fs::read_to_string(exp_dir.join("dec_story_spearman_cor.csv")).unwrap();
        assert_eq!(csv.lines().next(), Some(",high,low"));
    }

    #[test]
    fn test_publish_flags_propagate() {
        let temp_dir = tempdir().unwrap();
        let settings = setup(temp_dir.path(), "DecTest");
        let request = ExperimentsRequest {
            publish_plots: false,
            publish_results: false,
            ..ExperimentsRequest::default()
        };

        let reports = ExperimentRunner::new(&settings, request).run().unwrap();
        assert_eq!(reports.len(), 2);
        let exp_dir = temp_dir.path().join("results").join("dec_story");
        assert!(!exp_dir.join("results.json").exists());
        assert!(!exp_dir.join("low").join("dec_story_low_a.json").exists());
    }

    #[test]
    fn test_unknown_class_name() {
        let temp_dir = tempdir().unwrap();
        let settings = setup(temp_dir.path(), "NoSuchTest");

        let err = ExperimentRunner::new(&settings, ExperimentsRequest::default()).run().unwrap_err();
        assert!(matches!(err.downcast_ref::<EvalError>(), Some(EvalError::Config(_))));
    }

    #[test]
    fn test_run_config_file() {
        let temp_dir = tempdir().unwrap();
        let settings = setup(temp_dir.path(), "DecTest");
        let out_dir = temp_dir.path().join("single");
        fs::create_dir_all(&out_dir).unwrap();
        let config = json!({
            "exp_name": "single",
            "sub_exp_name": "only",
            "input_csv": temp_dir.path().join("data").join("low.csv"),
            "out_dir": out_dir,
            "global_results_json": temp_dir.path().join("single.json"),
            "class_name": "DecTest",
            "publish_plots": false,
            "publish_results": true,
        });
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, config.to_string()).unwrap();

        let report = run_config_file(&settings, &config_path).unwrap();
        assert_eq!(report.sub_exp_name, "only");
        assert!(report.results.contains_key("metric_a"));
        assert!(temp_dir.path().join("single.json").exists());
    }

    #[test]
    fn test_run_config_file_missing_out_dir() {
        let temp_dir = tempdir().unwrap();
        let settings = setup(temp_dir.path(), "DecTest");
        let out_dir = temp_dir.path().join("missing");
        let config = json!({
            "exp_name": "single",
            "sub_exp_name": "only",
            "input_csv": temp_dir.path().join("data").join("low.csv"),
            "out_dir": out_dir,
            "global_results_json": temp_dir.path().join("single.json"),
            "class_name": "DecTest",
            "publish_plots": true,
            "publish_results": true,
        });
        let config_path = temp_dir.path().join("config.json");
        fs::write(&config_path, config.to_string()).unwrap();

        let err = run_config_file(&settings, &config_path).unwrap_err();
        assert!(matches!(err.downcast_ref::<EvalError>(), Some(EvalError::Config(_))));
        assert!(!out_dir.exists());
        assert!(!temp_dir.path().join("single.json").exists());
    }

    #[test]
    fn test_run_config_file_rejects_non_boolean_flag() {
        let temp_dir = tempdir().unwrap();
        let settings = Settings::default();
        let config_path = temp_dir.path().join("config.json");
        fs::write(
            &config_path,
            json!({
                "exp_name": "e", "sub_exp_name": "s", "input_csv": "x.csv", "out_dir": "o",
                "global_results_json": "g.json", "class_name": "DecTest",
                "publish_plots": "yes", "publish_results": true
            })
            .to_string(),
        )
        .unwrap();

        let err = run_config_file(&settings, &config_path).unwrap_err();
        assert!(matches!(err.downcast_ref::<EvalError>(), Some(EvalError::Config(_))));
    }
}
