use crate::utils::{METRIC_FIELD_PREFIX, STD_SUFFIX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named statistics of one metric (e.g. "spearman_cor" -> 0.81)
pub type MetricResults = BTreeMap<String, f64>;

/// Statistics of every metric field of a sub-experiment
pub type Results = BTreeMap<String, MetricResults>;

/// Columnar data of a test input CSV
#[derive(Debug, Clone, PartialEq)]
pub struct TestData {
    /// Constant label name of every row (e.g. "temperature", "topk")
    pub label_name: String,
    /// Per-row label values
    pub label_values: Vec<f64>,
    /// Metric columns, including `_std` companions
    pub fields: BTreeMap<String, Vec<f64>>,
}

impl TestData {
    /// Metric fields to test, leaving out `_std` companions
    pub fn metric_fields(&self) -> impl Iterator<Item = &String> {
        self.fields
            .keys()
            .filter(|f| f.starts_with(METRIC_FIELD_PREFIX) && !f.ends_with(STD_SUFFIX))
    }

    pub fn values(&self, field: &str) -> Option<&[f64]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Split a field's values into (label == 1.0, label == 0.0) groups
    pub fn split_by_binary_label(&self, field: &str) -> (Vec<f64>, Vec<f64>) {
        let mut positives = Vec::new();
        let mut negatives = Vec::new();
        if let Some(values) = self.values(field) {
            for (&value, &label) in values.iter().zip(&self.label_values) {
                if label == 1.0 {
                    positives.push(value);
                } else if label == 0.0 {
                    negatives.push(value);
                }
            }
        }
        (positives, negatives)
    }
}

/// Results of one sub-experiment, as printed after a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubExperimentReport {
    pub exp_name: String,
    pub sub_exp_name: String,
    pub class_name: String,
    pub results: Results,
}

/// One labelled series of a dual histogram
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistogramSeries {
    pub label: String,
    pub counts: Vec<usize>,
}

/// A point with a symmetric error bar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBarPoint {
    pub x: f64,
    pub y: f64,
    pub err: f64,
}

/// Chart data handed to an external renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chart {
    Histogram {
        title: String,
        x_label: String,
        y_label: String,
        range: (f64, f64),
        series: Vec<HistogramSeries>,
    },
    ErrorBar {
        title: String,
        x_label: String,
        y_label: String,
        x_scale: String,
        points: Vec<ErrorBarPoint>,
    },
}
