//! Cross-run accumulator of sub-experiment results.
//!
//! The store is a JSON file mapping sub-experiment name to its results. Each
//! export reads it, merges one sub-experiment in, writes it back, and rebuilds
//! the per-statistic CSV tables from the full contents. A single writer is
//! assumed; concurrent exports to the same file would lose updates.

use crate::error::Result;
use crate::models::Results;
use crate::utils::METRIC_FIELD_PREFIX;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub struct GlobalResultsStore {
    path: PathBuf,
    entries: BTreeMap<String, Results>,
}

impl GlobalResultsStore {
    /// Open the store at `path`; an absent file is an empty store
    pub fn open(path: &Path) -> Result<Self> {
        let entries = if path.is_file() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn entries(&self) -> &BTreeMap<String, Results> {
        &self.entries
    }

    /// Replace the results of one sub-experiment, keeping all others
    pub fn merge(&mut self, sub_exp_name: &str, results: Results) {
        self.entries.insert(sub_exp_name.to_string(), results);
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }

    /// Rebuild `<exp_name>_<stat>.csv` next to the store for every statistic
    /// of `results`. Rows are the metrics of `results`, columns every stored
    /// sub-experiment. Returns the written paths.
    pub fn write_summary_csvs(&self, exp_name: &str, results: &Results) -> Result<Vec<PathBuf>> {
        let score_types: BTreeSet<&String> = results.values().flat_map(|stats| stats.keys()).collect();
        let csv_dir = self.path.parent().unwrap_or_else(|| Path::new(""));
        let sub_exps: Vec<&String> = self.entries.keys().collect();

        let mut written = Vec::new();
        for score_type in score_types {
            let csv_path = csv_dir.join(format!("{}_{}.csv", exp_name, score_type));
            let mut writer = csv::Writer::from_path(&csv_path)?;

            let mut header = vec![String::new()];
            header.extend(sub_exps.iter().map(|s| s.to_string()));
            writer.write_record(&header)?;

            for metric in results.keys() {
                let mut row = vec![metric.strip_prefix(METRIC_FIELD_PREFIX).unwrap_or(metric).to_string()];
                for sub in &sub_exps {
                    let cell = self.entries[*sub]
                        .get(metric)
                        .and_then(|stats| stats.get(score_type))
                        .map(|v| format!("{:.2}", v))
                        .unwrap_or_default();
                    row.push(cell);
                }
                writer.write_record(&row)?;
            }
            writer.flush()?;
            written.push(csv_path);
        }
        Ok(written)
    }
}
