use super::{MetricsTest, PEARSON, SPEARMAN, display_name, write_chart};
use crate::config::SubExperimentConfig;
use crate::error::Result;
use crate::models::{Chart, ErrorBarPoint, Results, TestData};
use crate::utils::STD_SUFFIX;

/// Decoding test: label values are a decoding parameter (temperature,
/// top-k, ...) and each metric is correlated against it.
#[derive(Debug, Default)]
pub struct DecTest;

impl DecTest {
    pub fn new() -> Self {
        Self
    }
}

/// `_std` companion of a metric field: `metric_x_mean` -> `metric_x_std`
pub fn std_field(field: &str) -> String {
    format!("{}{}", field.replace("_mean", ""), STD_SUFFIX)
}

impl MetricsTest for DecTest {
    fn class_name(&self) -> &'static str {
        "DecTest"
    }

    fn visualize(&self, config: &SubExperimentConfig, data: &TestData, results: &Results) -> Result<()> {
        if !config.publish_plots {
            return Ok(());
        }
        let x_scale = if data.label_name == "topk" { "log" } else { "linear" };

        for field in data.metric_fields() {
            let Some(values) = data.values(field) else {
                continue;
            };
            let stds = data.values(&std_field(field));
            let points = values
                .iter()
                .zip(&data.label_values)
                .enumerate()
                .map(|(i, (&y, &x))| ErrorBarPoint {
                    x,
                    y,
                    err: stds.and_then(|s| s.get(i)).copied().unwrap_or(0.0),
                })
                .collect();

            let stats = results.get(field);
            let stat = |name: &str| stats.and_then(|s| s.get(name)).copied().unwrap_or(0.0);
            let chart = Chart::ErrorBar {
                title: format!(
                    "{} - {} - {}\n pearson-cor [{:.2}], spearman-cor [{:.2}]",
                    config.exp_name,
                    config.sub_exp_name,
                    display_name(field),
                    stat(PEARSON),
                    stat(SPEARMAN)
                ),
                x_label: data.label_name.clone(),
                y_label: "Score".to_string(),
                x_scale: x_scale.to_string(),
                points,
            };
            let path = write_chart(config, field, &chart)?;
            tracing::debug!(chart = %path.display(), "Wrote error-bar chart");
        }
        Ok(())
    }
}
