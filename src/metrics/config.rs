//! Option maps owned by metrics.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const IGNORE_CACHE: &str = "ignore_cache";

/// A single option value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Mapping of option name to value, validated by the metric that owns it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MetricConfig(BTreeMap<String, ConfigValue>);

impl MetricConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: ConfigValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    /// Overlay `other` on top of this configuration.
    pub fn merge(&mut self, other: &MetricConfig) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// A required non-negative integer option.
    pub fn uint(&self, key: &str) -> Result<usize> {
        match self.get(key) {
            Some(ConfigValue::Int(value)) if *value >= 0 => Ok(*value as usize),
            Some(ConfigValue::Int(value)) => Err(EvalError::config(format!(
                "option '{}' must be non-negative, got {}",
                key, value
            ))),
            Some(other) => Err(EvalError::config(format!(
                "option '{}' must be an integer, got {:?}",
                key, other
            ))),
            None => Err(EvalError::config(format!("missing option '{}'", key))),
        }
    }

    /// A required path option.
    pub fn path(&self, key: &str) -> Result<PathBuf> {
        match self.get(key) {
            Some(ConfigValue::Text(value)) => Ok(PathBuf::from(value)),
            Some(other) => Err(EvalError::config(format!(
                "option '{}' must be a path, got {:?}",
                key, other
            ))),
            None => Err(EvalError::config(format!("missing option '{}'", key))),
        }
    }

    /// An optional flag, false when absent.
    pub fn flag(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            Some(ConfigValue::Bool(value)) => Ok(*value),
            Some(other) => Err(EvalError::config(format!(
                "option '{}' must be a boolean, got {:?}",
                key, other
            ))),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint_accepts_non_negative() {
        let config = MetricConfig::new().with("n", ConfigValue::Int(3));
        assert_eq!(config.uint("n").unwrap(), 3);
    }

    #[test]
    fn test_uint_rejects_negative_missing_and_mistyped() {
        let config = MetricConfig::new()
            .with("neg", ConfigValue::Int(-1))
            .with("float", ConfigValue::Float(2.5))
            .with("text", ConfigValue::Text("3".to_string()));

        assert!(matches!(config.uint("neg"), Err(EvalError::Config(_))));
        assert!(matches!(config.uint("float"), Err(EvalError::Config(_))));
        assert!(matches!(config.uint("text"), Err(EvalError::Config(_))));
        assert!(matches!(config.uint("missing"), Err(EvalError::Config(_))));
    }

    #[test]
    fn test_flag_defaults_to_false() {
        let config = MetricConfig::new();
        assert!(!config.flag(IGNORE_CACHE).unwrap());

        let config = config.with(IGNORE_CACHE, ConfigValue::Bool(true));
        assert!(config.flag(IGNORE_CACHE).unwrap());

        let config = MetricConfig::new().with(IGNORE_CACHE, ConfigValue::Int(1));
        assert!(config.flag(IGNORE_CACHE).is_err());
    }

    #[test]
    fn test_merge_overrides() {
        let mut config = MetricConfig::new()
            .with("n_min", ConfigValue::Int(1))
            .with("n_max", ConfigValue::Int(5));
        let overrides = MetricConfig::new().with("n_max", ConfigValue::Int(3));

        config.merge(&overrides);
        assert_eq!(config.uint("n_min").unwrap(), 1);
        assert_eq!(config.uint("n_max").unwrap(), 3);
    }

    #[test]
    fn test_untagged_deserialization() {
        let config: MetricConfig = serde_json::from_str(r#"{"n": 2, "ignore_cache": true, "cache_file": "c.txt"}"#).unwrap();
        assert_eq!(config.get("n"), Some(&ConfigValue::Int(2)));
        assert_eq!(config.get("ignore_cache"), Some(&ConfigValue::Bool(true)));
        assert_eq!(config.path("cache_file").unwrap(), PathBuf::from("c.txt"));
    }
}
