//! The page store contract.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{StorageError, StorageErrorKind};
use crate::model::{Author, NewRevision, Page, Revision, TagCount};

/// Metadata key of internal links.
pub const LINK_KEY: &str = "X-Link";
/// Metadata key of pages used by includes and templates.
pub const ATTACH_KEY: &str = "X-Attach";
/// Metadata key of page owners.
pub const OWNER_KEY: &str = "X-Owner";
/// Metadata key of tags.
pub const TAG_KEY: &str = "tag";

/// Pages, revisions, text bodies and the metadata index.
///
/// Implementations serialize writes per page. Derived queries (tag cloud,
/// orphans, missing pages) have default implementations on top of the
/// metadata index.
pub trait PageStore: Send + Sync {
    /// Head revision of a page. Deleted pages are `None` unless
    /// `include_deleted` is set.
    fn get_by_name(&self, name: &str, include_deleted: bool) -> Result<Option<Page>, StorageError>;

    fn get_by_name_and_rev(&self, name: &str, revision: u64) -> Result<Option<Page>, StorageError>;

    /// Names of existing pages in sorted order, optionally filtered by a
    /// glob pattern.
    fn list_pages(&self, filter: Option<&str>) -> Result<Vec<String>, StorageError>;

    /// Revisions of a page, newest first.
    fn revisions(&self, name: &str) -> Result<Vec<Revision>, StorageError>;

    /// The latest revisions across all pages, newest first.
    fn recent_revisions(&self, limit: usize) -> Result<Vec<Revision>, StorageError>;

    fn create_revision(&self, revision: NewRevision) -> Result<Revision, StorageError>;

    /// Text body by content hash.
    fn text(&self, hash: &str) -> Result<Option<String>, StorageError>;

    fn metadata(&self, name: &str) -> Result<Vec<(String, String)>, StorageError>;

    /// Replace all metadata of a page.
    fn set_metadata(&self, name: &str, entries: &[(String, String)]) -> Result<(), StorageError>;

    /// `(page, value)` pairs of every page carrying `key`.
    fn metadata_values(&self, key: &str) -> Result<Vec<(String, String)>, StorageError>;

    /// Attachment bytes stored with a revision.
    fn attachment_bytes(&self, revision: u64) -> Result<Option<Vec<u8>>, StorageError>;

    /// Attachment of the head revision.
    fn get_attachment_bytes(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.get_by_name(name, false)? {
            Some(page) if page.revision.attachment.is_some() => self.attachment_bytes(page.revision.id),
            _ => Ok(None),
        }
    }

    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.get_by_name(name, false)?.is_some())
    }

    /// Head revision, including deletions.
    fn latest(&self, name: &str) -> Result<Revision, StorageError> {
        self.revisions(name)?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::not_found(name))
    }

    /// Restore the text and attachment state of an old revision as a new
    /// head revision.
    fn revert(&self, revision: &Revision, note: &str, author: Author) -> Result<Revision, StorageError> {
        let text = self
            .text(&revision.text_hash)?
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound).with_page(revision.page.clone()))?;
        let mut new = NewRevision::new(revision.page.clone(), text, author).with_note(note);
        if let Some(attachment) = &revision.attachment {
            let data = self.attachment_bytes(revision.id)?.unwrap_or_default();
            new = new.with_attachment(attachment.mime_type.clone(), data);
        }
        tracing::debug!(page = %revision.page, revision = revision.id, "Reverting page");
        self.create_revision(new)
    }

    /// Names of pages whose `key` metadata matches `value`, or which carry
    /// `key` at all.
    fn find_by_metadata(&self, key: &str, value: Option<&str>) -> Result<Vec<String>, StorageError> {
        let names: BTreeSet<String> = self
            .metadata_values(key)?
            .into_iter()
            .filter(|(_, v)| value.is_none_or(|value| v == value))
            .map(|(page, _)| page)
            .collect();
        Ok(names.into_iter().collect())
    }

    /// The `max` most used tags, sorted by name.
    fn get_tagcloud(&self, max: usize) -> Result<Vec<TagCount>, StorageError> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for (_, tag) in self.metadata_values(TAG_KEY)? {
            *counts.entry(tag).or_default() += 1;
        }
        let mut tags: Vec<(String, usize)> = counts.into_iter().collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        tags.truncate(max);
        tags.sort_by_key(|(name, _)| name.to_lowercase());
        Ok(tags.into_iter().map(|(name, count)| TagCount::new(name, count)).collect())
    }

    /// Existing pages with a name similar to `name`.
    fn find_similar(&self, name: &str, n: usize) -> Result<Vec<String>, StorageError> {
        let pages = self.list_pages(None)?;
        Ok(inyoka_diff::get_close_matches(name, pages, n, 0.6))
    }

    /// Existing pages no other page links to.
    fn find_orphans(&self) -> Result<Vec<String>, StorageError> {
        let linked: HashSet<String> = self
            .metadata_values(LINK_KEY)?
            .into_iter()
            .filter(|(page, target)| page != target)
            .map(|(_, target)| target)
            .collect();
        Ok(self
            .list_pages(None)?
            .into_iter()
            .filter(|name| !linked.contains(name))
            .collect())
    }

    /// Link targets that do not exist, sorted.
    fn find_missing(&self) -> Result<Vec<String>, StorageError> {
        let existing: HashSet<String> = self.list_pages(None)?.into_iter().collect();
        let missing: BTreeSet<String> = self
            .metadata_values(LINK_KEY)?
            .into_iter()
            .map(|(_, target)| target)
            .filter(|target| !existing.contains(target))
            .collect();
        Ok(missing.into_iter().collect())
    }

    /// Principals listed as owners of a page.
    fn get_owners(&self, name: &str) -> Result<BTreeSet<String>, StorageError> {
        Ok(self
            .metadata(name)?
            .into_iter()
            .filter(|(key, _)| key == OWNER_KEY)
            .map(|(_, value)| value)
            .collect())
    }
}
