use crate::metrics::registry::MetricEntry;
use crate::models::SubExperimentReport;
use crate::runner::MetricsFileReport;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print sub-experiment results in the specified format
pub fn print_reports(reports: &[SubExperimentReport], format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_reports_plain(reports),
        OutputFormat::Json => print_json(reports),
    }
}

/// Print the outcome of a metrics run
pub fn print_metrics_run(reports: &[MetricsFileReport], format: OutputFormat) {
    match format {
        OutputFormat::Plain => {
            for report in reports {
                if report.skipped {
                    println!("{} -> {} (exists, skipped)", report.input.display(), report.output.display());
                } else {
                    println!(
                        "{} -> {} [{}]",
                        report.input.display(),
                        report.output.display(),
                        report.added_fields.join(", ")
                    );
                }
            }
        }
        OutputFormat::Json => print_json(reports),
    }
}

/// Print the metric registry
pub fn print_metric_entries(entries: &[MetricEntry], format: OutputFormat) {
    match format {
        OutputFormat::Plain => {
            println!("{:<28} {:<30} {:<8}", "Metric", "Kind", "Default");
            println!("{}", "-".repeat(68));
            for entry in entries {
                println!(
                    "{:<28} {:<30} {:<8}",
                    entry.name,
                    format!("{:?}", entry.kind),
                    if entry.use_by_default { "yes" } else { "no" }
                );
            }
        }
        OutputFormat::Json => print_json(entries),
    }
}

fn print_reports_plain(reports: &[SubExperimentReport]) {
    if reports.is_empty() {
        println!("No experiments run.");
        return;
    }
    for report in reports {
        println!("=== {} / {} ({}) ===", report.exp_name, report.sub_exp_name, report.class_name);
        println!("{}", format_results_table(report));
    }
}

/// Metric rows by statistic columns, values to 3 decimals
fn format_results_table(report: &SubExperimentReport) -> String {
    let stats: Vec<&String> = report
        .results
        .values()
        .next()
        .map(|first| first.keys().collect())
        .unwrap_or_default();

    if stats.is_empty() {
        return "No results available.".to_string();
    }

    let mut lines = Vec::new();
    let mut header = format!("{:<40}", "Metric");
    for stat in &stats {
        header.push_str(&format!(" {:<12}", stat));
    }
    lines.push(header);
    lines.push("-".repeat(40 + 13 * stats.len()));

    for (metric, values) in &report.results {
        let mut line = format!("{:<40}", metric);
        for stat in &stats {
            match values.get(*stat) {
                Some(value) => line.push_str(&format!(" {:<12.3}", value)),
                None => line.push_str(&format!(" {:<12}", "-")),
            }
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results to JSON: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry::METRICS;
    use crate::models::{MetricResults, Results};

    fn report() -> SubExperimentReport {
        let mut stats = MetricResults::new();
        stats.insert("pearson_cor".to_string(), 0.41234);
        stats.insert("spearman_cor".to_string(), -0.5);
        let mut results = Results::new();
        results.insert("metric_bert_sts".to_string(), stats);
        SubExperimentReport {
            exp_name: "dec_story".to_string(),
            sub_exp_name: "temperature".to_string(),
            class_name: "DecTest".to_string(),
            results,
        }
    }

    #[test]
    fn test_results_table() {
        let table = format_results_table(&report());
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("Metric"));
        assert!(lines[0].contains("pearson_cor"));
        assert!(lines[2].starts_with("metric_bert_sts"));
        assert!(lines[2].contains("0.412"));
        assert!(lines[2].contains("-0.500"));
    }

    #[test]
    fn test_results_table_empty() {
        let mut report = report();
        report.results.clear();
        assert_eq!(format_results_table(&report), "No results available.");
    }

    #[test]
    fn test_json_output() {
        let reports = vec![report()];
        // serialization must not panic for reports or registry entries
        print_reports(&reports, OutputFormat::Json);
        print_metric_entries(METRICS, OutputFormat::Json);

        let json = serde_json::to_value(&reports).unwrap();
        assert_eq!(json[0]["results"]["metric_bert_sts"]["spearman_cor"], -0.5);
        let entries = serde_json::to_value(METRICS).unwrap();
        assert_eq!(entries[0]["name"], "DistinctNgrams");
        assert!(entries[0].get("build").is_none());
    }
}
