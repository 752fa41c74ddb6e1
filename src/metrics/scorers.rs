//! External batch scorers for pairwise similarity.
//!
//! A scorer receives every response pair of an input file at once and returns
//! one similarity per pair, in the same order.

use crate::config::{CommandSettings, EmbeddingSettings};
use crate::error::{EvalError, Result};
use async_openai::{Client, config::OpenAIConfig, types::CreateEmbeddingRequestArgs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

const RUN_DIR: &str = "tmp_run";
const RUN_INPUT: &str = "test.tsv";
const RUN_OUTPUT: &str = "test_results.tsv";

/// One row of the flat pairwise format: sample `i` of set `context` against
/// an earlier sample `j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePair {
    pub index: usize,
    pub context: usize,
    pub sample_i: usize,
    pub sample_j: usize,
    pub sentence1: String,
    pub sentence2: String,
}

/// Batch pairwise scorer capability.
pub trait PairwiseScorer {
    async fn score_pairs(&self, pairs: &[ResponsePair]) -> Result<Vec<f64>>;
}

/// Write pairs as a tab-separated file with a header row.
pub fn write_pairs_tsv(path: &Path, pairs: &[ResponsePair]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    for pair in pairs {
        writer.serialize(pair)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write scores one per line with five decimals.
pub fn write_scores(path: &Path, scores: &[f64]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content: String = scores.iter().map(|s| format!("{:.5}\n", s)).collect();
    std::fs::write(path, content)?;
    Ok(())
}

/// Read newline-delimited scores. Only the first tab-separated field of each
/// line is used; blank lines are skipped.
pub fn read_scores(path: &Path) -> Result<Vec<f64>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            let field = line.split('\t').next().unwrap_or(line);
            field
                .trim()
                .parse::<f64>()
                .map_err(|e| EvalError::cache(path, format!("line {}: '{}' is not a score ({})", i + 1, line, e)))
        })
        .collect()
}

/// Embeds responses through an OpenAI-compatible endpoint and scores pairs by
/// cosine similarity of their embeddings.
#[derive(Debug, Clone)]
pub struct EmbeddingScorer {
    settings: EmbeddingSettings,
}

impl EmbeddingScorer {
    pub fn new(settings: EmbeddingSettings) -> Self {
        Self { settings }
    }

    fn endpoint(&self) -> PathBuf {
        PathBuf::from(&self.settings.api_endpoint)
    }

    fn create_client(&self) -> Result<Client<OpenAIConfig>> {
        let api_key = std::env::var(&self.settings.env_var_api_key).map_err(|_| {
            EvalError::external(
                self.endpoint(),
                format!("Environment variable {} not found", self.settings.env_var_api_key),
            )
        })?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&self.settings.api_endpoint);

        Ok(Client::with_config(openai_config))
    }

    async fn embed(&self, client: &Client<OpenAIConfig>, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.settings.batch_size.max(1)) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.settings.model)
                .input(batch.to_vec())
                .build()
                .map_err(|e| EvalError::external(self.endpoint(), format!("Failed to build embedding request: {}", e)))?;

            let response = client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| EvalError::external(self.endpoint(), format!("Failed to embed responses: {}", e)))?;

            let mut data = response.data;
            if data.len() != batch.len() {
                return Err(EvalError::external(
                    self.endpoint(),
                    format!("expected {} embeddings, got {}", batch.len(), data.len()),
                ));
            }
            data.sort_by_key(|e| e.index);
            embeddings.extend(data.into_iter().map(|e| e.embedding));
        }
        Ok(embeddings)
    }
}

/// Cosine similarity of two vectors; 0 when either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl PairwiseScorer for EmbeddingScorer {
    async fn score_pairs(&self, pairs: &[ResponsePair]) -> Result<Vec<f64>> {
        // embed each distinct text once
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut texts = Vec::new();
        for pair in pairs {
            for text in [&pair.sentence1, &pair.sentence2] {
                if !positions.contains_key(text.as_str()) {
                    positions.insert(text.as_str(), texts.len());
                    texts.push(text.clone());
                }
            }
        }

        tracing::info!(texts = texts.len(), model = %self.settings.model, "Embedding responses");
        let client = self.create_client()?;
        let embeddings = self.embed(&client, &texts).await?;

        Ok(pairs
            .iter()
            .map(|pair| {
                cosine_similarity(
                    &embeddings[positions[pair.sentence1.as_str()]],
                    &embeddings[positions[pair.sentence2.as_str()]],
                )
            })
            .collect())
    }
}

/// Runs an inference script inside its tool directory on a scratch run
/// directory that is recreated for every invocation.
#[derive(Debug, Clone)]
pub struct CommandScorer {
    settings: CommandSettings,
}

impl CommandScorer {
    pub fn new(settings: CommandSettings) -> Self {
        Self { settings }
    }

    fn reset_run_dir(&self) -> Result<PathBuf> {
        let run_dir = self.settings.dir.join(RUN_DIR);
        if run_dir.is_dir() {
            std::fs::remove_dir_all(&run_dir)?;
        }
        std::fs::create_dir_all(&run_dir)?;
        Ok(run_dir)
    }
}

impl PairwiseScorer for CommandScorer {
    async fn score_pairs(&self, pairs: &[ResponsePair]) -> Result<Vec<f64>> {
        let dir = &self.settings.dir;
        if !dir.is_dir() {
            return Err(EvalError::external(dir, "tool directory not found"));
        }

        let run_dir = self.reset_run_dir()?;
        write_pairs_tsv(&run_dir.join(RUN_INPUT), pairs)?;

        tracing::info!(dir = %dir.display(), script = %self.settings.script, pairs = pairs.len(), "Running external scorer");
        let status = Command::new("bash")
            .arg(&self.settings.script)
            .args(["-i", RUN_DIR, "-o", RUN_DIR])
            .current_dir(dir)
            .status()
            .await
            .map_err(|e| EvalError::external(dir, format!("failed to spawn bash {}: {}", self.settings.script, e)))?;
        if !status.success() {
            return Err(EvalError::external(dir, format!("{} exited with {}", self.settings.script, status)));
        }

        let output = run_dir.join(RUN_OUTPUT);
        if !output.is_file() {
            return Err(EvalError::external(&output, "scorer produced no results file"));
        }
        let scores = read_scores(&output)?;
        std::fs::remove_dir_all(&run_dir)?;

        Ok(scores)
    }
}

/// The scorers a file-backed metric can be wired to.
#[derive(Debug, Clone)]
pub enum ExternalScorer {
    Embedding(EmbeddingScorer),
    Command(CommandScorer),
}

impl PairwiseScorer for ExternalScorer {
    async fn score_pairs(&self, pairs: &[ResponsePair]) -> Result<Vec<f64>> {
        match self {
            ExternalScorer::Embedding(scorer) => scorer.score_pairs(pairs).await,
            ExternalScorer::Command(scorer) => scorer.score_pairs(pairs).await,
        }
    }
}
