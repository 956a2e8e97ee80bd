use inyoka_diff::MergeConflict;
use inyoka_storage::StorageError;

use crate::acl::Privilege;

/// Errors of engine operations.
#[derive(Debug, thiserror::Error)]
pub enum WikiError {
    /// Persistence failures, passed through unchanged.
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("missing privilege `{privilege}` on page {page}")]
    PermissionDenied { privilege: Privilege, page: String },
    /// The edit changes metadata only managers may change.
    #[error("changing metadata `{key}` requires the manage privilege")]
    MetadataChangeRefused { key: String },
    /// The edit was based on an old revision and could not be merged.
    /// `merged` holds the text with conflict markers for the editor.
    #[error("edit conflicts with a newer revision: {conflict}")]
    EditConflict { merged: String, conflict: MergeConflict },
    #[error("invalid page name `{0}`")]
    InvalidPageName(String),
}

impl WikiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_not_found())
    }
}
