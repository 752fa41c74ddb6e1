use crate::config::Settings;
use crate::error::{EvalError, Result as EvalResult};
use crate::metrics::RequiredInput;
use crate::metrics::from_file::bind_file_config;
use crate::metrics::registry::{self, MetricEntry};
use crate::utils::{SAMPLE_ID_FIELD, parse_path_list, resp_field_index};
use anyhow::{Context, Result};
use csv::StringRecord;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Options of one `metrics` invocation
#[derive(Debug, Clone, Default)]
pub struct MetricsRequest {
    /// Comma-separated CSV files or directories; empty means the raw data directory
    pub input_csv: String,
    /// Comma-separated metric names; empty means every default metric
    pub metrics: String,
    pub ignore_cache: bool,
    pub override_existing: bool,
}

/// What happened to one input file
#[derive(Debug, Clone, Serialize)]
pub struct MetricsFileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Fields added to the output; empty when the file was skipped
    pub added_fields: Vec<String>,
    pub skipped: bool,
}

/// A validated response CSV, held fully in memory
struct InputFile {
    path: PathBuf,
    headers: StringRecord,
    records: Vec<StringRecord>,
    /// Column index of `resp_0`, `resp_1`, ...
    resp_columns: Vec<usize>,
}

impl InputFile {
    fn load(path: &Path) -> EvalResult<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();

        if !headers.iter().any(|f| f == SAMPLE_ID_FIELD) {
            return Err(EvalError::input(path, format!("missing {} field", SAMPLE_ID_FIELD)));
        }

        let mut resp_fields: Vec<(usize, usize)> = headers
            .iter()
            .enumerate()
            .filter_map(|(col, f)| resp_field_index(f).map(|idx| (idx, col)))
            .collect();
        if resp_fields.is_empty() {
            return Err(EvalError::input(path, "no resp_<i> fields"));
        }
        resp_fields.sort_unstable();
        for (expected, (idx, _)) in resp_fields.iter().enumerate() {
            if *idx != expected {
                return Err(EvalError::input(
                    path,
                    format!("resp_<i> fields must be numbered 0..{}, found resp_{}", resp_fields.len(), idx),
                ));
            }
        }

        let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        if records.is_empty() {
            return Err(EvalError::input(path, "no rows in file"));
        }

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            records,
            resp_columns: resp_fields.into_iter().map(|(_, col)| col).collect(),
        })
    }

    fn num_sets(&self) -> usize {
        self.records.len()
    }

    fn samples_per_set(&self) -> usize {
        self.resp_columns.len()
    }

    fn has_field(&self, field: &str) -> bool {
        self.headers.iter().any(|f| f == field)
    }

    fn response_sets(&self) -> Vec<Vec<String>> {
        self.records
            .iter()
            .map(|record| {
                self.resp_columns
                    .iter()
                    .map(|&col| record.get(col).unwrap_or("").to_string())
                    .collect()
            })
            .collect()
    }
}

/// Where the augmented copy of `input` is written: the raw data directory in
/// its path is swapped for the metrics directory, otherwise the file lands
/// directly in the metrics directory.
pub fn output_path(input: &Path, raw_data_dir: &Path, metrics_data_dir: &Path) -> PathBuf {
    let input_str = input.to_string_lossy();
    let raw = raw_data_dir.to_string_lossy();
    if !raw.is_empty() && input_str.contains(raw.as_ref()) {
        return PathBuf::from(input_str.replacen(raw.as_ref(), &metrics_data_dir.to_string_lossy(), 1));
    }
    match input.file_name() {
        Some(name) => metrics_data_dir.join(name),
        None => metrics_data_dir.to_path_buf(),
    }
}

/// Computes diversity metrics for response CSVs and writes augmented copies
pub struct MetricRunner<'a> {
    settings: &'a Settings,
    entries: Vec<&'static MetricEntry>,
    request: MetricsRequest,
}

impl<'a> MetricRunner<'a> {
    pub fn new(settings: &'a Settings, request: MetricsRequest) -> Result<Self> {
        let entries = registry::select(&request.metrics)?;
        Ok(Self {
            settings,
            entries,
            request,
        })
    }

    /// Validate every input file, then augment each one in turn
    pub async fn run(&self) -> Result<Vec<MetricsFileReport>> {
        let paths = parse_path_list(&self.request.input_csv, &self.settings.raw_data_dir, "csv")?;
        tracing::info!(
            files = paths.len(),
            metrics = ?self.entries.iter().map(|e| e.name).collect::<Vec<_>>(),
            "Calculating metrics"
        );

        let inputs = paths
            .iter()
            .map(|path| InputFile::load(path).with_context(|| format!("Failed to load input: {}", path.display())))
            .collect::<Result<Vec<_>>>()?;

        let mut reports = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let report = self
                .process_file(input)
                .await
                .with_context(|| format!("Failed to calculate metrics for: {}", input.path.display()))?;
            reports.push(report);
        }
        Ok(reports)
    }

    async fn process_file(&self, input: &InputFile) -> Result<MetricsFileReport> {
        let output = output_path(&input.path, &self.settings.raw_data_dir, &self.settings.metrics_data_dir);
        if output.exists() && !self.request.override_existing {
            tracing::info!(output = %output.display(), "Output exists, skipping");
            return Ok(MetricsFileReport {
                input: input.path.clone(),
                output,
                added_fields: Vec::new(),
                skipped: true,
            });
        }

        let pending: Vec<&MetricEntry> = self
            .entries
            .iter()
            .copied()
            .filter(|entry| {
                let present = input.has_field(&entry.field_name());
                if present {
                    tracing::info!(metric = entry.name, file = %input.path.display(), "Metric already present, skipping");
                }
                !present
            })
            .collect();

        let response_sets = input.response_sets();
        let mut columns: Vec<(String, Vec<String>)> = Vec::with_capacity(pending.len());
        for entry in pending {
            tracing::info!(metric = entry.name, file = %input.path.display(), "Calculating metric");
            let values = self.compute(entry, input, &response_sets).await?;
            columns.push((entry.field_name(), values));
        }

        write_augmented(&output, input, &columns)
            .with_context(|| format!("Failed to write output: {}", output.display()))?;
        tracing::info!(output = %output.display(), added = columns.len(), "Wrote metrics");

        Ok(MetricsFileReport {
            input: input.path.clone(),
            output,
            added_fields: columns.into_iter().map(|(field, _)| field).collect(),
            skipped: false,
        })
    }

    async fn compute(
        &self,
        entry: &MetricEntry,
        input: &InputFile,
        response_sets: &[Vec<String>],
    ) -> Result<Vec<String>> {
        let mut config = entry.config_with(&self.settings.metrics, self.request.ignore_cache);
        if entry.required_input() == RequiredInput::SetIndex {
            bind_file_config(
                &mut config,
                entry.name,
                &input.path,
                input.num_sets(),
                input.samples_per_set(),
                &self.settings.cache_dir,
            );
        }

        let mut metric = entry.build(&config, &self.settings.scorers)?;
        if let Some(file_backed) = metric.as_file_backed_mut() {
            file_backed.prepare(response_sets).await?;
            tracing::debug!(metric = entry.name, cache = %file_backed.cache_file().display(), "Pairwise scores ready");
        }

        response_sets
            .iter()
            .enumerate()
            .map(|(row, set)| Ok(format!("{:.3}", metric.score(row, set)?)))
            .collect()
    }
}

fn write_augmented(output: &Path, input: &InputFile, columns: &[(String, Vec<String>)]) -> EvalResult<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(output)?;

    let mut header = input.headers.clone();
    for (field, _) in columns {
        header.push_field(field);
    }
    writer.write_record(&header)?;

    for (row, record) in input.records.iter().enumerate() {
        let mut record = record.clone();
        for (_, values) in columns {
            record.push_field(&values[row]);
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
