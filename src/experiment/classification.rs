use super::{MetricsTest, SPEARMAN, collect_data, correlations, display_name, write_chart};
use crate::config::SubExperimentConfig;
use crate::error::{EvalError, Result};
use crate::models::{Chart, HistogramSeries, Results, TestData};
use crate::statistics::{histogram, min_max, optimal_classification_accuracy};

pub const OCA: &str = "oca";
const HISTOGRAM_BINS: usize = 20;

/// Content test: label 1 marks diverse content, label 0 constant content.
/// Adds the optimal classification accuracy of each metric to the
/// correlations.
#[derive(Debug, Default)]
pub struct ConTest;

impl ConTest {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsTest for ConTest {
    fn class_name(&self) -> &'static str {
        "ConTest"
    }

    fn collect_data(&self, config: &SubExperimentConfig) -> Result<TestData> {
        let data = collect_data(&config.input_csv)?;
        if let Some(label) = data.label_values.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(EvalError::input(
                &config.input_csv,
                format!("label values must be 0 or 1, found {}", label),
            ));
        }
        Ok(data)
    }

    fn run(&self, _config: &SubExperimentConfig, data: &TestData) -> Result<Results> {
        let mut results = correlations(data);
        for (field, stats) in results.iter_mut() {
            let (diverse, constant) = data.split_by_binary_label(field);
            let (accuracy, threshold) = optimal_classification_accuracy(&diverse, &constant);
            tracing::debug!(metric = %field, accuracy, threshold, "Optimal classifier");
            stats.insert(OCA.to_string(), accuracy);
        }
        Ok(results)
    }

    fn visualize(&self, config: &SubExperimentConfig, data: &TestData, results: &Results) -> Result<()> {
        if !config.publish_plots {
            return Ok(());
        }
        for field in data.metric_fields() {
            let Some((low, high)) = data.values(field).and_then(min_max) else {
                continue;
            };
            let (diverse, constant) = data.split_by_binary_label(field);
            let stats = results.get(field);
            let stat = |name: &str| stats.and_then(|s| s.get(name)).copied().unwrap_or(0.0);

            let chart = Chart::Histogram {
                title: format!(
                    "{} - {} - {}\n Optimal Classifier Accuracy [{:.2}], s_cor [{:.2}]",
                    config.exp_name,
                    config.sub_exp_name,
                    display_name(field),
                    stat(OCA),
                    stat(SPEARMAN)
                ),
                x_label: "Metric Values".to_string(),
                y_label: "Bin Count".to_string(),
                range: (low, high),
                series: vec![
                    HistogramSeries {
                        label: format!("diverse content ({})", diverse.len()),
                        counts: histogram(&diverse, low, high, HISTOGRAM_BINS),
                    },
                    HistogramSeries {
                        label: format!("constant content ({})", constant.len()),
                        counts: histogram(&constant, low, high, HISTOGRAM_BINS),
                    },
                ],
            };
            let path = write_chart(config, field, &chart)?;
            tracing::debug!(chart = %path.display(), "Wrote histogram");
        }
        Ok(())
    }
}
