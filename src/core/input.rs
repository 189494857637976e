use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::core::diff_index::PrFile;
use crate::core::diff_parser::DiffParser;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} must contain a JSON array of files")]
    NotAnArray(PathBuf),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub async fn read_json(path: &Path) -> Result<Value, InputError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| InputError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Pull request file list (`gh api repos/{repo}/pulls/{pr}/files`).
pub async fn load_pr_files(path: &Path) -> Result<Vec<PrFile>, InputError> {
    match read_json(path).await? {
        Value::Array(values) => Ok(PrFile::from_values(values)),
        _ => Err(InputError::NotAnArray(path.to_path_buf())),
    }
}

/// Raw unified diff text, split per file.
pub async fn load_unified_diff(path: &Path) -> Result<Vec<PrFile>, InputError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| InputError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(DiffParser::split_unified_diff(&content))
}

/// Optional added-line reference; any problem just means "no reference".
pub async fn load_reference(path: &Path) -> Vec<Value> {
    match read_json(path).await {
        Ok(Value::Array(entries)) => entries,
        Ok(_) => {
            warn!("Ignoring added-lines reference {}: not a JSON array", path.display());
            Vec::new()
        }
        Err(err) => {
            warn!("Ignoring added-lines reference: {}", err);
            Vec::new()
        }
    }
}

pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, content)
        .await
        .map_err(|source| InputError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(())
}
