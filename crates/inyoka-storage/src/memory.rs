//! In-memory page store.
//!
//! Provides [`MemoryStore`] for tests and for the command line tool, which
//! renders files without a database behind it.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use inyoka_markup::normalize_pagename;

use crate::error::{StorageError, StorageErrorKind};
use crate::model::{Attachment, Author, NewRevision, Page, Revision, text_hash};
use crate::store::PageStore;

const BACKEND: &str = "Memory";

/// Page store keeping everything in memory.
///
/// # Example
///
/// ```
/// use inyoka_storage::{MemoryStore, PageStore};
///
/// let store = MemoryStore::new()
///     .with_page("Startseite", "Willkommen!")
///     .with_metadata("Startseite", "tag", "intro");
///
/// let page = store.get_by_name("Startseite", false).unwrap().unwrap();
/// assert_eq!(page.text, "Willkommen!");
/// assert_eq!(store.find_by_metadata("tag", Some("intro")).unwrap(), vec!["Startseite"]);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    revisions: RwLock<Vec<Revision>>,
    texts: RwLock<HashMap<String, String>>,
    metadata: RwLock<BTreeMap<String, Vec<(String, String)>>>,
    attachments: RwLock<HashMap<u64, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page revision authored by `System`.
    ///
    /// # Panics
    ///
    /// Panics if the name is not a normalized page name.
    #[must_use]
    pub fn with_page(self, name: &str, text: &str) -> Self {
        self.create_revision(NewRevision::new(name, text, Author::user("System")))
            .expect("invalid page name in MemoryStore::with_page");
        self
    }

    /// Add one metadata entry to a page.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_metadata(self, name: &str, key: &str, value: &str) -> Self {
        self.metadata
            .write()
            .unwrap()
            .entry(name.to_owned())
            .or_default()
            .push((key.to_owned(), value.to_owned()));
        self
    }

    fn head(&self, name: &str) -> Option<Revision> {
        self.revisions
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|revision| revision.page == name)
            .cloned()
    }

    fn page(&self, revision: Revision) -> Result<Page, StorageError> {
        let text = self
            .texts
            .read()
            .unwrap()
            .get(&revision.text_hash)
            .cloned()
            .ok_or_else(|| {
                StorageError::new(StorageErrorKind::Other)
                    .with_page(revision.page.clone())
                    .with_backend(BACKEND)
            })?;
        let metadata = self
            .metadata
            .read()
            .unwrap()
            .get(&revision.page)
            .cloned()
            .unwrap_or_default();
        Ok(Page {
            name: revision.page.clone(),
            revision,
            text,
            metadata,
        })
    }
}

impl PageStore for MemoryStore {
    fn get_by_name(&self, name: &str, include_deleted: bool) -> Result<Option<Page>, StorageError> {
        match self.head(name) {
            Some(revision) if include_deleted || !revision.deleted => self.page(revision).map(Some),
            _ => Ok(None),
        }
    }

    fn get_by_name_and_rev(&self, name: &str, revision: u64) -> Result<Option<Page>, StorageError> {
        let found = self
            .revisions
            .read()
            .unwrap()
            .iter()
            .find(|r| r.id == revision && r.page == name)
            .cloned();
        found.map(|revision| self.page(revision)).transpose()
    }

    fn list_pages(&self, filter: Option<&str>) -> Result<Vec<String>, StorageError> {
        let pattern = filter
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| StorageError::new(StorageErrorKind::Other).with_backend(BACKEND).with_source(e))?;
        let mut heads: BTreeMap<&str, bool> = BTreeMap::new();
        let revisions = self.revisions.read().unwrap();
        for revision in revisions.iter() {
            heads.insert(&revision.page, revision.deleted);
        }
        Ok(heads
            .into_iter()
            .filter(|(name, deleted)| !deleted && pattern.as_ref().is_none_or(|p| p.matches(name)))
            .map(|(name, _)| name.to_owned())
            .collect())
    }

    fn revisions(&self, name: &str) -> Result<Vec<Revision>, StorageError> {
        Ok(self
            .revisions
            .read()
            .unwrap()
            .iter()
            .rev()
            .filter(|revision| revision.page == name)
            .cloned()
            .collect())
    }

    fn recent_revisions(&self, limit: usize) -> Result<Vec<Revision>, StorageError> {
        let mut revisions = self.revisions.read().unwrap().clone();
        revisions.sort_by(|a, b| b.change_date.cmp(&a.change_date).then_with(|| b.id.cmp(&a.id)));
        revisions.truncate(limit);
        Ok(revisions)
    }

    fn create_revision(&self, new: NewRevision) -> Result<Revision, StorageError> {
        if new.page.is_empty() || normalize_pagename(&new.page) != new.page {
            return Err(StorageError::invalid_name(new.page).with_backend(BACKEND));
        }
        let mut revisions = self.revisions.write().unwrap();
        let hash = text_hash(&new.text);
        self.texts.write().unwrap().entry(hash.clone()).or_insert(new.text);
        let id = revisions.len() as u64 + 1;
        let attachment = new.attachment.map(|attachment| {
            let size = attachment.data.len();
            self.attachments.write().unwrap().insert(id, attachment.data);
            Attachment {
                mime_type: attachment.mime_type,
                size,
            }
        });
        let revision = Revision {
            id,
            page: new.page,
            text_hash: hash,
            author: new.author,
            change_date: new.change_date,
            note: new.note,
            deleted: new.deleted,
            attachment,
        };
        tracing::debug!(page = %revision.page, revision = id, "Created revision");
        revisions.push(revision.clone());
        Ok(revision)
    }

    fn text(&self, hash: &str) -> Result<Option<String>, StorageError> {
        Ok(self.texts.read().unwrap().get(hash).cloned())
    }

    fn metadata(&self, name: &str) -> Result<Vec<(String, String)>, StorageError> {
        Ok(self.metadata.read().unwrap().get(name).cloned().unwrap_or_default())
    }

    fn set_metadata(&self, name: &str, entries: &[(String, String)]) -> Result<(), StorageError> {
        let mut metadata = self.metadata.write().unwrap();
        if entries.is_empty() {
            metadata.remove(name);
        } else {
            metadata.insert(name.to_owned(), entries.to_vec());
        }
        Ok(())
    }

    fn metadata_values(&self, key: &str) -> Result<Vec<(String, String)>, StorageError> {
        Ok(self
            .metadata
            .read()
            .unwrap()
            .iter()
            .flat_map(|(page, entries)| {
                entries
                    .iter()
                    .filter(|(k, _)| k == key)
                    .map(|(_, value)| (page.clone(), value.clone()))
            })
            .collect())
    }

    fn attachment_bytes(&self, revision: u64) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.attachments.read().unwrap().get(&revision).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_page("Startseite", "Hallo")
            .with_page("Wiki/Hilfe", "Hilfe")
            .with_page("Startseite", "Hallo Welt")
    }

    #[test]
    fn test_head_revision() {
        let store = store();
        let page = store.get_by_name("Startseite", false).unwrap().unwrap();
        assert_eq!(page.text, "Hallo Welt");
        assert_eq!(page.revision.id, 3);
        assert_eq!(store.latest("Startseite").unwrap().id, 3);
        assert!(store.get_by_name("Fehlt", false).unwrap().is_none());
        assert!(store.latest("Fehlt").unwrap_err().is_not_found());
    }

    #[test]
    fn test_old_revision() {
        let store = store();
        let page = store.get_by_name_and_rev("Startseite", 1).unwrap().unwrap();
        assert_eq!(page.text, "Hallo");
        assert!(store.get_by_name_and_rev("Wiki/Hilfe", 1).unwrap().is_none());
    }

    #[test]
    fn test_deleted_pages_are_hidden() {
        let store = store();
        store
            .create_revision(NewRevision::new("Wiki/Hilfe", "", Author::user("ada")).with_deleted(true))
            .unwrap();
        assert!(store.get_by_name("Wiki/Hilfe", false).unwrap().is_none());
        assert!(store.get_by_name("Wiki/Hilfe", true).unwrap().unwrap().is_deleted());
        assert_eq!(store.list_pages(None).unwrap(), vec!["Startseite"]);
    }

    #[test]
    fn test_list_pages_with_glob() {
        let store = store();
        assert_eq!(store.list_pages(Some("Wiki/*")).unwrap(), vec!["Wiki/Hilfe"]);
        assert!(store.list_pages(Some("[")).is_err());
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let error = MemoryStore::new()
            .create_revision(NewRevision::new("Bad Name", "", Author::user("ada")))
            .unwrap_err();
        assert_eq!(error.kind, StorageErrorKind::InvalidName);
        assert_eq!(error.to_string(), "[Memory] Invalid page name (page: Bad Name)");
    }

    #[test]
    fn test_revert_restores_text_and_attachment() {
        let store = MemoryStore::new();
        let first = store
            .create_revision(
                NewRevision::new("Bild.png", "", Author::user("ada")).with_attachment("image/png", vec![1, 2, 3]),
            )
            .unwrap();
        store
            .create_revision(NewRevision::new("Bild.png", "kaputt", Author::user("bob")))
            .unwrap();
        assert_eq!(store.get_attachment_bytes("Bild.png").unwrap(), None);

        let reverted = store.revert(&first, "zurück", Author::user("ada")).unwrap();
        assert_eq!(reverted.id, 3);
        assert_eq!(reverted.note, "zurück");
        assert_eq!(store.get_attachment_bytes("Bild.png").unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_recent_revisions() {
        let ids: Vec<u64> = store().recent_revisions(2).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn test_derived_queries() {
        let store = MemoryStore::new()
            .with_page("A", "")
            .with_page("B", "")
            .with_page("C", "")
            .with_metadata("A", "X-Link", "B")
            .with_metadata("A", "X-Link", "Fehlt")
            .with_metadata("C", "X-Link", "C")
            .with_metadata("A", "tag", "ubuntu")
            .with_metadata("B", "tag", "ubuntu")
            .with_metadata("B", "tag", "Audio")
            .with_metadata("C", "X-Owner", "ada");

        assert_eq!(store.find_orphans().unwrap(), vec!["A", "C"]);
        assert_eq!(store.find_missing().unwrap(), vec!["Fehlt"]);
        assert_eq!(store.find_by_metadata("tag", None).unwrap(), vec!["A", "B"]);
        assert_eq!(store.get_owners("C").unwrap().into_iter().collect::<Vec<_>>(), vec!["ada"]);

        let cloud: Vec<(String, usize)> = store
            .get_tagcloud(10)
            .unwrap()
            .into_iter()
            .map(|tag| (tag.name, tag.count))
            .collect();
        assert_eq!(cloud, vec![("Audio".to_owned(), 1), ("ubuntu".to_owned(), 2)]);
        let top: Vec<String> = store.get_tagcloud(1).unwrap().into_iter().map(|tag| tag.name).collect();
        assert_eq!(top, vec!["ubuntu"]);
    }

    #[test]
    fn test_find_similar() {
        let store = MemoryStore::new()
            .with_page("Ubuntu", "")
            .with_page("Kubuntu", "")
            .with_page("Debian", "");
        assert_eq!(store.find_similar("ubunt", 2).unwrap(), vec!["Ubuntu", "Kubuntu"]);
    }
}
