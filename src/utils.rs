use crate::error::{EvalError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SAMPLE_ID_FIELD: &str = "sample_id";
pub const RESP_FIELD_PREFIX: &str = "resp_";
pub const METRIC_FIELD_PREFIX: &str = "metric_";
pub const LABEL_PREFIX: &str = "label_";
pub const LABEL_NAME_FIELD: &str = "label_name";
pub const LABEL_VAL_FIELD: &str = "label_value";
pub const STD_SUFFIX: &str = "_std";

/// An n-gram is an owned window of tokens.
pub type Ngram = Vec<String>;

/// Resolve a comma-separated list of files and directories into the files
/// carrying the given extension. Directories are walked recursively. An empty
/// list falls back to `default_path`.
pub fn parse_path_list(path_str: &str, default_path: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let inputs: Vec<PathBuf> = if path_str.trim().is_empty() {
        vec![default_path.to_path_buf()]
    } else {
        path_str
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect()
    };

    let mut paths = Vec::new();
    for input in inputs {
        if input.is_file() && has_extension(&input, extension) {
            paths.push(input);
        } else if input.is_dir() {
            for entry in WalkDir::new(&input).sort_by_file_name() {
                let entry = entry.map_err(|e| EvalError::config(format!("[{}] walk failed: {}", input.display(), e)))?;
                let path = entry.path();
                if path.is_file() && has_extension(path, extension) {
                    paths.push(path.to_path_buf());
                }
            }
        } else {
            return Err(EvalError::config(format!("[{}] not exists.", input.display())));
        }
    }

    Ok(paths)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}

/// `AveragedDistinctNgrams` -> `averaged_distinct_ngrams`
pub fn camel_to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Column name under which a metric's values are stored.
pub fn metric_field_name(metric_name: &str) -> String {
    format!("{}{}", METRIC_FIELD_PREFIX, camel_to_snake_case(metric_name))
}

/// Index of a `resp_<i>` field, if the suffix is an integer.
pub fn resp_field_index(field: &str) -> Option<usize> {
    field.strip_prefix(RESP_FIELD_PREFIX)?.parse().ok()
}

/// Tokenize one response: drop periods, split on whitespace.
///
/// Newlines count as whitespace, so `going\nhome` is two tokens rather than
/// `goinghome`; n-gram scores of multi-line responses depend on this.
pub fn tokenize(line: &str) -> Vec<String> {
    line.replace('.', "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Sliding windows of `n` tokens. A response shorter than `n` yields nothing.
pub fn ngrams(tokens: &[String], n: usize) -> Vec<Ngram> {
    if tokens.len() + 1 < n {
        return Vec::new();
    }
    (0..tokens.len() + 1 - n)
        .map(|i| tokens[i..i + n].to_vec())
        .collect()
}

/// One n-gram list per input line.
pub fn lines_to_ngrams<S: AsRef<str>>(lines: &[S], n: usize) -> Vec<Vec<Ngram>> {
    lines.iter().map(|line| ngrams(&tokenize(line.as_ref()), n)).collect()
}

/// Number of unordered pairs in a set of `k` samples.
pub fn pair_count(k: usize) -> usize {
    k * k.saturating_sub(1) / 2
}
