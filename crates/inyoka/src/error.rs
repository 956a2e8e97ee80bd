//! CLI error types.

use std::path::PathBuf;

use inyoka_config::ConfigError;
use inyoka_diff::MergeConflict;
use inyoka_storage::StorageError;
use inyoka_wiki::WikiError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("{0}")]
    Wiki(#[from] WikiError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("invalid pages directory: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// Strict merge failed.
    #[error("{0}")]
    Conflict(#[from] MergeConflict),
}

/// Read a UTF-8 file.
pub(crate) fn read_file(path: &std::path::Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}
