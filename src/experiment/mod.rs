//! Statistical tests validating metrics against human labels.
//!
//! A test runs five stages in a fixed order: check-config, collect-data, run,
//! visualize, export. [`MetricsTest`] exposes one method per stage with the
//! shared behavior as its default; concrete tests that extend a stage call
//! the shared function first. [`run_test`] is the only driver.

pub mod classification;
pub mod correlation;

use crate::config::SubExperimentConfig;
use crate::error::{EvalError, Result};
use crate::models::{Chart, Results, TestData};
use crate::statistics;
use crate::store::GlobalResultsStore;
use crate::utils::{LABEL_NAME_FIELD, LABEL_PREFIX, LABEL_VAL_FIELD, METRIC_FIELD_PREFIX};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use classification::ConTest;
pub use correlation::DecTest;

pub const SPEARMAN: &str = "spearman_cor";
pub const PEARSON: &str = "pearson_cor";

pub trait MetricsTest {
    /// Name experiment definitions use to route configs to this test
    fn class_name(&self) -> &'static str;

    fn check_config(&self, config: &SubExperimentConfig) -> Result<()> {
        check_config(self.class_name(), config)
    }

    fn collect_data(&self, config: &SubExperimentConfig) -> Result<TestData> {
        collect_data(&config.input_csv)
    }

    fn run(&self, _config: &SubExperimentConfig, data: &TestData) -> Result<Results> {
        Ok(correlations(data))
    }

    fn visualize(&self, config: &SubExperimentConfig, data: &TestData, results: &Results) -> Result<()>;

    fn export(&self, config: &SubExperimentConfig, _data: &TestData, results: &Results) -> Result<()> {
        export_results(config, results)
    }
}

/// Drive one sub-experiment through all five stages
pub fn run_test(test: &dyn MetricsTest, config: &SubExperimentConfig) -> Result<Results> {
    test.check_config(config)?;
    let data = test.collect_data(config)?;
    let results = test.run(config, &data)?;
    test.visualize(config, &data, &results)?;
    test.export(config, &data, &results)?;
    Ok(results)
}

/// Every available test, instantiated once
pub fn all_tests() -> Vec<Box<dyn MetricsTest>> {
    vec![Box::new(ConTest::new()), Box::new(DecTest::new())]
}

/// Tests keyed by class name
pub fn tests_by_class_name() -> BTreeMap<&'static str, Box<dyn MetricsTest>> {
    all_tests().into_iter().map(|t| (t.class_name(), t)).collect()
}

pub fn check_config(class_name: &str, config: &SubExperimentConfig) -> Result<()> {
    if config.exp_name.is_empty() || config.sub_exp_name.is_empty() {
        return Err(EvalError::config("experiment and sub-experiment names must not be empty"));
    }
    if !config.input_csv.is_file() {
        return Err(EvalError::config(format!("input csv [{}] not found", config.input_csv.display())));
    }
    if !config.out_dir.is_dir() {
        return Err(EvalError::config(format!("output directory [{}] not found", config.out_dir.display())));
    }
    if config.class_name != class_name {
        return Err(EvalError::config(format!(
            "config routed to {} but declares class_name {}",
            class_name, config.class_name
        )));
    }
    Ok(())
}

/// Load label and metric columns of a test CSV
pub fn collect_data(path: &Path) -> Result<TestData> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let fields: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, f)| f.starts_with(LABEL_PREFIX) || f.starts_with(METRIC_FIELD_PREFIX))
        .map(|(i, f)| (i, f.to_string()))
        .collect();

    for required in [LABEL_NAME_FIELD, LABEL_VAL_FIELD] {
        if !fields.iter().any(|(_, f)| f == required) {
            return Err(EvalError::input(path, format!("missing {} field", required)));
        }
    }
    if let Some((_, extra)) = fields
        .iter()
        .find(|(_, f)| f.starts_with(LABEL_PREFIX) && f != LABEL_NAME_FIELD && f != LABEL_VAL_FIELD)
    {
        return Err(EvalError::input(path, format!("unexpected label field {}", extra)));
    }
    if !fields.iter().any(|(_, f)| f.starts_with(METRIC_FIELD_PREFIX)) {
        return Err(EvalError::input(path, "no metric fields"));
    }

    let mut label_names: Vec<String> = Vec::new();
    let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        for (col, field) in &fields {
            let raw = record.get(*col).unwrap_or("");
            if field == LABEL_NAME_FIELD {
                label_names.push(raw.to_string());
                continue;
            }
            let value = raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    EvalError::input(path, format!("row {}: {} value '{}' is not a finite number", row_idx, field, raw))
                })?;
            columns.entry(field.clone()).or_default().push(value);
        }
    }

    let label_name = match label_names.first() {
        Some(first) => first.clone(),
        None => return Err(EvalError::input(path, "no rows in file")),
    };
    if let Some(other) = label_names.iter().find(|n| **n != label_name) {
        return Err(EvalError::input(
            path,
            format!("{} is not uniform ('{}' vs '{}')", LABEL_NAME_FIELD, label_name, other),
        ));
    }

    let label_values = columns.remove(LABEL_VAL_FIELD).unwrap_or_default();
    Ok(TestData {
        label_name,
        label_values,
        fields: columns,
    })
}

/// Spearman and Pearson correlation of each metric against the labels.
/// Undefined correlations are reported as 0.
pub fn correlations(data: &TestData) -> Results {
    let mut results = Results::new();
    for field in data.metric_fields() {
        let values = data.values(field).unwrap_or_default();
        let mut stats = BTreeMap::new();
        for (name, value) in [
            (SPEARMAN, statistics::spearman(&data.label_values, values)),
            (PEARSON, statistics::pearson(&data.label_values, values)),
        ] {
            let value = value.unwrap_or_else(|| {
                tracing::warn!(metric = %field, statistic = name, "Correlation undefined, reporting 0");
                0.0
            });
            stats.insert(name.to_string(), value);
        }
        results.insert(field.clone(), stats);
    }
    results
}

/// Merge results into the global store and rebuild the summary CSVs
pub fn export_results(config: &SubExperimentConfig, results: &Results) -> Result<()> {
    if !config.publish_results {
        return Ok(());
    }
    let mut store = GlobalResultsStore::open(&config.global_results_json)?;
    store.merge(&config.sub_exp_name, results.clone());
    store.save()?;
    let written = store.write_summary_csvs(&config.exp_name, results)?;
    tracing::debug!(store = %config.global_results_json.display(), csvs = written.len(), "Exported results");
    Ok(())
}

/// Metric field without its `metric_` prefix
pub fn display_name(field: &str) -> &str {
    field.strip_prefix(METRIC_FIELD_PREFIX).unwrap_or(field)
}

/// Write chart data for one metric to `<out_dir>/<exp>_<sub>_<metric>.json`
pub fn write_chart(config: &SubExperimentConfig, field: &str, chart: &Chart) -> Result<PathBuf> {
    let path = config.out_dir.join(format!(
        "{}_{}_{}.json",
        config.exp_name,
        config.sub_exp_name,
        display_name(field)
    ));
    std::fs::write(&path, serde_json::to_string_pretty(chart)?)?;
    Ok(path)
}


#[cfg(test)]
mod tests {
    use super::test_support::sub_config;
    use super::*;
    use tempfile::tempdir;

    const CSV: &str = "sample_id,label_name,label_value,metric_a,metric_a_std\n\
                       0,temperature,0.2,0.1,0.01\n\
                       1,temperature,0.5,0.4,0.02\n\
                       2,temperature,0.8,0.9,0.03\n";

    #[test]
    fn test_collect_data() {
        let temp_dir = tempdir().unwrap();
        let config = sub_config(temp_dir.path(), "DecTest", CSV);

        let data = collect_data(&config.input_csv).unwrap();
        assert_eq!(data.label_name, "temperature");
        assert_eq!(data.label_values, vec![0.2, 0.5, 0.8]);
        assert_eq!(data.values("metric_a").unwrap(), &[0.1, 0.4, 0.9]);
        assert!(data.values("sample_id").is_none());
        assert_eq!(data.metric_fields().count(), 1);
    }

    #[test]
    fn test_collect_data_non_uniform_label_name() {
        let temp_dir = tempdir().unwrap();
        let csv = "label_name,label_value,metric_a\ntemperature,0.1,0.5\ntopk,0.2,0.6\n";
        let config = sub_config(temp_dir.path(), "DecTest", csv);
        assert!(matches!(collect_data(&config.input_csv), Err(EvalError::Input { .. })));
    }

    #[test]
    fn test_collect_data_rejects_bad_inputs() {
        let cases = [
            "label_name,label_value,metric_a\n",
            "label_value,metric_a\n0.1,0.5\n",
            "label_name,label_value\ntemperature,0.1\n",
            "label_name,label_value,metric_a\ntemperature,0.1,abc\n",
            "label_name,label_value,label_extra,metric_a\ntemperature,0.1,1,0.5\n",
            "label_name,label_value,metric_a\ntemperature,0.1,nan\n",
            "label_name,label_value,metric_a\ntemperature,inf,0.5\n",
        ];
        for csv in cases {
            let temp_dir = tempdir().unwrap();
            let config = sub_config(temp_dir.path(), "DecTest", csv);
            assert!(
                matches!(collect_data(&config.input_csv), Err(EvalError::Input { .. })),
                "expected input error for {:?}",
                csv
            );
        }
    }

    #[test]
    fn test_check_config_class_name_mismatch() {
        let temp_dir = tempdir().unwrap();
        let config = sub_config(temp_dir.path(), "ConTest", CSV);
        assert!(check_config("ConTest", &config).is_ok());
        assert!(matches!(check_config("DecTest", &config), Err(EvalError::Config(_))));
    }

    #[test]
    fn test_check_config_missing_paths() {
        let temp_dir = tempdir().unwrap();
        let mut config = sub_config(temp_dir.path(), "DecTest", CSV);
        config.out_dir = temp_dir.path().join("missing");
        assert!(matches!(check_config("DecTest", &config), Err(EvalError::Config(_))));

        let mut config = sub_config(temp_dir.path(), "DecTest", CSV);
        config.input_csv = temp_dir.path().join("missing.csv");
        assert!(matches!(check_config("DecTest", &config), Err(EvalError::Config(_))));
    }

    #[test]
    fn test_correlations_skip_std_fields() {
        let temp_dir = tempdir().unwrap();
        let config = sub_config(temp_dir.path(), "DecTest", CSV);
        let data = collect_data(&config.input_csv).unwrap();

        let results = correlations(&data);
        assert_eq!(results.len(), 1);
        assert!((results["metric_a"][SPEARMAN] - 1.0).abs() < 1e-9);
        assert!(results["metric_a"][PEARSON] > 0.9);
    }

    #[test]
    fn test_correlations_constant_metric_reports_zero() {
        let temp_dir = tempdir().unwrap();
        let csv = "label_name,label_value,metric_flat\nt,0.1,0.5\nt,0.2,0.5\nt,0.3,0.5\n";
        let config = sub_config(temp_dir.path(), "DecTest", csv);
        let data = collect_data(&config.input_csv).unwrap();

        let results = correlations(&data);
        assert_eq!(results["metric_flat"][SPEARMAN], 0.0);
        assert_eq!(results["metric_flat"][PEARSON], 0.0);
    }

    #[test]
    fn test_export_respects_publish_flag() {
        let temp_dir = tempdir().unwrap();
        let mut config = sub_config(temp_dir.path(), "DecTest", CSV);
        let data = collect_data(&config.input_csv).unwrap();
        let results = correlations(&data);

        config.publish_results = false;
        export_results(&config, &results).unwrap();
        assert!(!config.global_results_json.exists());

        config.publish_results = true;
        export_results(&config, &results).unwrap();
        assert!(config.global_results_json.exists());
        assert!(temp_dir.path().join("exp").join("exp_spearman_cor.csv").exists());
    }

    #[test]
    fn test_nan_metric_cell_leaves_store_readable() {
        let temp_dir = tempdir().unwrap();
        let good = sub_config(temp_dir.path(), "DecTest", CSV);
        run_test(&DecTest::new(), &good).unwrap();

        let csv = "label_name,label_value,metric_a\nt,0.1,nan\nt,0.2,0.5\nt,0.3,0.7\n";
        let bad = sub_config(temp_dir.path(), "DecTest", csv);
        for _ in 0..2 {
            let result = run_test(&DecTest::new(), &bad);
            assert!(matches!(result, Err(EvalError::Input { .. })));
        }

        let store = GlobalResultsStore::open(&good.global_results_json).unwrap();
        assert!(store.entries()["sub"]["metric_a"][PEARSON].is_finite());
        let good = sub_config(temp_dir.path(), "DecTest", CSV);
        run_test(&DecTest::new(), &good).unwrap();
    }

    #[test]
    fn test_tests_by_class_name() {
        let tests = tests_by_class_name();
        assert_eq!(tests.keys().copied().collect::<Vec<_>>(), vec!["ConTest", "DecTest"]);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("metric_bert_sts"), "bert_sts");
        assert_eq!(display_name("other"), "other");
    }
}
