use crate::config::Settings;
use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Directory the dataset archive is unpacked into: the parent of the data
/// directory, since the archive carries the data directory itself.
fn extract_root(data_dir: &Path) -> PathBuf {
    match data_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Fetch and unpack the dataset archive when the data directory is absent.
/// Returns whether a download happened.
pub async fn download_and_place_data(settings: &Settings) -> Result<bool> {
    if settings.data_dir.exists() {
        tracing::debug!(data_dir = %settings.data_dir.display(), "Data directory present");
        return Ok(false);
    }

    tracing::info!(url = %settings.data_url, "Downloading dataset");
    let bytes = reqwest::get(&settings.data_url)
        .await
        .with_context(|| format!("Failed to download: {}", settings.data_url))?
        .error_for_status()
        .with_context(|| format!("Dataset request rejected: {}", settings.data_url))?
        .bytes()
        .await
        .context("Failed to read dataset archive")?;

    let root = extract_root(&settings.data_dir);
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("Failed to open dataset archive")?;
    archive
        .extract(&root)
        .with_context(|| format!("Failed to extract dataset into: {}", root.display()))?;

    tracing::info!(files = archive.len(), into = %root.display(), "Dataset ready");
    Ok(true)
}
