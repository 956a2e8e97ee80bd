//! The wiki engine: rendering with a stream cache, edits, deletion, revert
//! and comparison of revisions.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use inyoka_cache::{Cache, CacheExt, NullCache};
use inyoka_diff::Diff;
use inyoka_markup::{Format, MarkupProcessor, Node, Stream, compile, normalize_pagename, render};
use inyoka_storage::{
    ATTACH_KEY, Author, LINK_KEY, NewRevision, NullSearchQueue, Page, PageStore, Revision, SearchQueue, StorageError,
    WIKI_PAGE,
};

use crate::acl::{Principal, Privilege, Privileges};
use crate::behaviors::{BEHAVE_KEY, Storages};
use crate::context::{StorePages, WikiContext};
use crate::error::WikiError;
use crate::macros::DATE_FORMAT;
use crate::metadata::{CACHE_TIME_KEY, REDIRECT_KEY, changed_restricted_key, extract_metadata};
use crate::settings::Settings;

/// Cache key of a compiled stream. Streams hold links resolved against
/// the page, so equal texts on different pages get different keys.
fn stream_key(page: &str, text_hash: &str, format: Format) -> String {
    format!("wiki/page/{page}/{text_hash}/{format}")
}

/// A new page text submitted by an editor.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub page: String,
    pub text: String,
    pub principal: Principal,
    pub note: String,
    /// Revision the editor started from. Older than the head means the
    /// text is merged with the changes made since.
    pub base_revision: Option<u64>,
    pub attachment: Option<(String, Vec<u8>)>,
    pub change_date: Option<DateTime<Utc>>,
}

impl EditRequest {
    pub fn new(page: impl Into<String>, text: impl Into<String>, principal: Principal) -> Self {
        Self {
            page: page.into(),
            text: text.into(),
            principal,
            note: String::new(),
            base_revision: None,
            attachment: None,
            change_date: None,
        }
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    #[must_use]
    pub fn with_base_revision(mut self, revision: u64) -> Self {
        self.base_revision = Some(revision);
        self
    }

    #[must_use]
    pub fn with_attachment(mut self, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.attachment = Some((mime_type.into(), data));
        self
    }

    #[must_use]
    pub fn with_change_date(mut self, date: DateTime<Utc>) -> Self {
        self.change_date = Some(date);
        self
    }
}

/// The wiki engine over a page store, a cache and a search queue.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use inyoka_markup::Format;
/// use inyoka_storage::MemoryStore;
/// use inyoka_wiki::{EditRequest, Principal, Wiki};
///
/// let wiki = Wiki::new(Arc::new(MemoryStore::new()));
/// let ada = Principal::user("ada");
/// wiki.edit(EditRequest::new("Start", "Hello '''world'''", ada.clone())).unwrap();
///
/// let html = wiki.render_page("Start", Format::Html, &ada).unwrap();
/// assert!(html.contains("Hello <strong>world</strong>"));
/// ```
pub struct Wiki {
    store: Arc<dyn PageStore>,
    cache: Arc<dyn Cache>,
    search: Arc<dyn SearchQueue>,
    settings: Settings,
    storages: Storages,
    processor: RwLock<Arc<MarkupProcessor>>,
}

impl Wiki {
    pub fn new(store: Arc<dyn PageStore>) -> Self {
        let settings = Settings::default();
        let storages = Storages::new();
        let processor = build_processor(&settings, &storages);
        Self {
            store,
            cache: Arc::new(NullCache),
            search: Arc::new(NullSearchQueue),
            settings,
            storages,
            processor: RwLock::new(Arc::new(processor)),
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn with_search(mut self, search: Arc<dyn SearchQueue>) -> Self {
        self.search = search;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self.processor = RwLock::new(Arc::new(build_processor(&self.settings, &self.storages)));
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn storages(&self) -> &Storages {
        &self.storages
    }

    pub fn store(&self) -> &dyn PageStore {
        self.store.as_ref()
    }

    /// Reload the behavior storages from their pages and rebuild the
    /// markup processor with the new smilies.
    pub fn reload(&self) -> Result<(), WikiError> {
        self.storages.reload(self.store.as_ref(), &self.settings.base_url)?;
        *self.processor.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(build_processor(&self.settings, &self.storages));
        Ok(())
    }

    fn processor(&self) -> Arc<MarkupProcessor> {
        Arc::clone(&self.processor.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// A render context for `page` using the current interwiki map.
    pub fn context<'a>(&'a self, page: Option<&str>, processor: &'a MarkupProcessor) -> WikiContext<'a> {
        let context = WikiContext::new(self.store.as_ref(), &self.settings, processor)
            .with_interwiki(self.storages.interwiki());
        match page {
            Some(page) => context.with_page(page),
            None => context,
        }
    }

    pub fn privileges(&self, principal: &Principal, page: &str) -> Privileges {
        self.storages.acl().privileges(principal, page, || {
            self.store.get_owners(page).unwrap_or_else(|error| {
                tracing::warn!(page, %error, "Could not load page owners");
                BTreeSet::new()
            })
        })
    }

    pub fn has_privilege(&self, principal: &Principal, page: &str, privilege: Privilege) -> bool {
        self.privileges(principal, page).contains(privilege)
    }

    fn require(&self, principal: &Principal, page: &str, privilege: Privilege) -> Result<Privileges, WikiError> {
        let privileges = self.privileges(principal, page);
        if privileges.contains(privilege) {
            Ok(privileges)
        } else {
            tracing::debug!(page, %privilege, principal = ?principal.name, "Permission denied");
            Err(WikiError::PermissionDenied {
                privilege,
                page: page.to_owned(),
            })
        }
    }

    fn parse(&self, processor: &MarkupProcessor, page: &str, text: &str) -> Node {
        let pages = StorePages(self.store.as_ref());
        processor.process_in(text, processor.context(Some(page)).with_pages(&pages))
    }

    /// Render the head revision of a page for a reader.
    pub fn render_page(&self, name: &str, format: Format, principal: &Principal) -> Result<String, WikiError> {
        let name = page_name(name)?;
        self.require(principal, &name, Privilege::Read)?;
        let page = self
            .store
            .get_by_name(&name, false)?
            .ok_or_else(|| StorageError::not_found(name.as_str()))?;
        let processor = self.processor();
        let stream = self.page_stream(&page, format, &processor);
        Ok(render(&stream, &self.context(Some(&page.name), &processor)))
    }

    /// Render arbitrary source, for previews. Nothing is cached.
    pub fn render_text(&self, text: &str, page: Option<&str>, format: Format) -> String {
        let processor = self.processor();
        let tree = match page {
            Some(page) => self.parse(&processor, page, text),
            None => processor.process(text, None),
        };
        let context = self.context(page, &processor);
        render(&compile(&tree, format, &context), &context)
    }

    /// The compiled stream of a page, from the cache when possible.
    pub fn page_stream(&self, page: &Page, format: Format, processor: &MarkupProcessor) -> Stream {
        let cacheable = self.settings.cached_formats.contains(&format);
        let key = stream_key(&page.name, &page.revision.text_hash, format);
        if cacheable {
            if let Some(stream) = self.cache.get_json::<Stream>(&key) {
                tracing::debug!(page = %page.name, %format, "Stream cache hit");
                return stream;
            }
            tracing::debug!(page = %page.name, %format, "Stream cache miss");
        }
        let tree = self.parse(processor, &page.name, &page.text);
        let stream = compile(&tree, format, &self.context(Some(&page.name), processor));
        if cacheable {
            self.cache.set_json(&key, &stream, Some(self.cache_ttl(page)));
        }
        stream
    }

    fn cache_ttl(&self, page: &Page) -> Duration {
        page.meta(CACHE_TIME_KEY)
            .find_map(|value| value.trim().parse().ok())
            .map_or(self.settings.cache_ttl, Duration::from_secs)
    }

    /// Save a new revision of a page.
    ///
    /// A stale base revision is merged with the head; if the changes
    /// overlap the edit fails with [`WikiError::EditConflict`] holding the
    /// text with conflict markers.
    pub fn edit(&self, request: EditRequest) -> Result<Revision, WikiError> {
        let name = page_name(&request.page)?;
        let head = self.store.get_by_name(&name, false)?;
        let privilege = if head.is_some() {
            Privilege::Edit
        } else {
            Privilege::Create
        };
        let privileges = self.require(&request.principal, &name, privilege)?;

        let mut text = request.text;
        if let (Some(head), Some(base)) = (&head, request.base_revision)
            && base != head.revision.id
        {
            text = self.merge_with_head(&name, head, base, text)?;
        }

        let processor = self.processor();
        let old_metadata = self.store.metadata(&name)?;
        let metadata = self.metadata_of(&processor, &name, &text);
        if !privileges.contains(Privilege::Manage)
            && let Some(key) = changed_restricted_key(&old_metadata, &metadata)
        {
            return Err(WikiError::MetadataChangeRefused { key });
        }

        let mut revision = NewRevision::new(name.clone(), text, author_of(&request.principal)).with_note(request.note);
        if let Some(date) = request.change_date {
            revision = revision.with_change_date(date);
        }
        if let Some((mime_type, data)) = request.attachment {
            revision = revision.with_attachment(mime_type, data);
        }
        let old_hash = head.map(|head| head.revision.text_hash);
        let revision = self.store.create_revision(revision)?;
        self.after_change(&name, old_hash, &old_metadata, &metadata)?;
        tracing::info!(page = %name, revision = revision.id, "Page edited");
        Ok(revision)
    }

    fn merge_with_head(&self, name: &str, head: &Page, base: u64, text: String) -> Result<String, WikiError> {
        let base_page = self
            .store
            .get_by_name_and_rev(name, base)?
            .ok_or_else(|| StorageError::not_found(name))?;
        let merger = self.settings.merger();
        match merger.clone().with_strict(true).merge(&base_page.text, &head.text, &text) {
            Ok(merged) => {
                tracing::debug!(page = name, base, head = head.revision.id, "Merged concurrent edit");
                Ok(merged)
            }
            Err(conflict) => {
                let merged = merger
                    .merge(&base_page.text, &head.text, &text)
                    .unwrap_or_else(|_| text.clone());
                tracing::debug!(page = name, line = conflict.left, "Edit conflict");
                Err(WikiError::EditConflict { merged, conflict })
            }
        }
    }

    /// Mark a page as deleted.
    pub fn delete(&self, name: &str, principal: &Principal, note: &str) -> Result<Revision, WikiError> {
        let name = page_name(name)?;
        self.require(principal, &name, Privilege::Delete)?;
        let head = self
            .store
            .get_by_name(&name, false)?
            .ok_or_else(|| StorageError::not_found(name.as_str()))?;
        let old_metadata = self.store.metadata(&name)?;
        let revision = self.store.create_revision(
            NewRevision::new(name.clone(), String::new(), author_of(principal))
                .with_note(note)
                .with_deleted(true),
        )?;
        self.after_change(&name, Some(head.revision.text_hash), &old_metadata, &[])?;
        tracing::info!(page = %name, revision = revision.id, "Page deleted");
        Ok(revision)
    }

    /// Restore the state of an old revision as the new head.
    pub fn revert(&self, name: &str, revision: u64, note: &str, principal: &Principal) -> Result<Revision, WikiError> {
        let name = page_name(name)?;
        let privileges = self.require(principal, &name, Privilege::Edit)?;
        let old = self
            .store
            .get_by_name_and_rev(&name, revision)?
            .ok_or_else(|| StorageError::not_found(name.as_str()))?;
        let head = self.store.latest(&name)?;
        let processor = self.processor();
        let old_metadata = self.store.metadata(&name)?;
        let metadata = self.metadata_of(&processor, &name, &old.text);
        if !privileges.contains(Privilege::Manage)
            && let Some(key) = changed_restricted_key(&old_metadata, &metadata)
        {
            return Err(WikiError::MetadataChangeRefused { key });
        }
        let reverted = self.store.revert(&old.revision, note, author_of(principal))?;
        self.after_change(&name, Some(head.text_hash), &old_metadata, &metadata)?;
        tracing::info!(page = %name, from = revision, revision = reverted.id, "Page reverted");
        Ok(reverted)
    }

    /// Diff of two revisions of a page; without `new` the head is used.
    pub fn compare(&self, name: &str, old: u64, new: Option<u64>) -> Result<Diff, WikiError> {
        let name = page_name(name)?;
        let load = |id: u64| -> Result<Page, WikiError> {
            Ok(self
                .store
                .get_by_name_and_rev(&name, id)?
                .ok_or_else(|| StorageError::not_found(name.as_str()))?)
        };
        let old = load(old)?;
        let new = match new {
            Some(id) => load(id)?,
            None => load(self.store.latest(&name)?.id)?,
        };
        let title = |page: &Page| format!("{} ({})", page.name, page.revision.change_date.format(DATE_FORMAT));
        Ok(Diff::new(&old.text, &new.text, &title(&old), &title(&new)))
    }

    /// Pages linking to `name`.
    pub fn backlinks(&self, name: &str) -> Result<Vec<String>, WikiError> {
        let name = page_name(name)?;
        let mut pages = self.store.find_by_metadata(LINK_KEY, Some(&name))?;
        pages.retain(|page| *page != name);
        Ok(pages)
    }

    /// Pages including or embedding `name`.
    pub fn embedders(&self, name: &str) -> Result<Vec<String>, WikiError> {
        let name = page_name(name)?;
        Ok(self.store.find_by_metadata(ATTACH_KEY, Some(&name))?)
    }

    /// Target of a redirect page.
    pub fn redirect_target(&self, name: &str) -> Result<Option<String>, WikiError> {
        let name = page_name(name)?;
        Ok(self
            .store
            .metadata(&name)?
            .into_iter()
            .find_map(|(key, value)| (key == REDIRECT_KEY).then_some(value)))
    }

    pub fn metadata(&self, name: &str) -> Result<Vec<(String, String)>, WikiError> {
        let name = page_name(name)?;
        Ok(self.store.metadata(&name)?)
    }

    fn metadata_of(&self, processor: &MarkupProcessor, name: &str, text: &str) -> Vec<(String, String)> {
        let pages = StorePages(self.store.as_ref());
        extract_metadata(processor, &pages, name, text)
    }

    /// Bookkeeping after a new revision: metadata, cache invalidation, the
    /// search queue and behavior storages.
    fn after_change(
        &self,
        name: &str,
        old_hash: Option<String>,
        old_metadata: &[(String, String)],
        metadata: &[(String, String)],
    ) -> Result<(), WikiError> {
        self.store.set_metadata(name, metadata)?;
        self.invalidate(name, old_hash)?;
        self.search.enqueue(WIKI_PAGE, name);
        let behaves = |entries: &[(String, String)]| entries.iter().any(|(key, _)| key == BEHAVE_KEY);
        if behaves(old_metadata) || behaves(metadata) {
            self.reload()?;
        }
        Ok(())
    }

    /// Drop cached streams of a page and of every page linking to or
    /// embedding it.
    fn invalidate(&self, name: &str, old_hash: Option<String>) -> Result<(), StorageError> {
        let mut pages = BTreeSet::from([name.to_owned()]);
        for key in [LINK_KEY, ATTACH_KEY] {
            pages.extend(
                self.store
                    .metadata_values(key)?
                    .into_iter()
                    .filter(|(_, target)| target == name)
                    .map(|(page, _)| page),
            );
        }
        let mut streams: BTreeSet<(String, String)> = old_hash.into_iter().map(|hash| (name.to_owned(), hash)).collect();
        for page in &pages {
            if let Some(page) = self.store.get_by_name(page, false)? {
                streams.insert((page.name, page.revision.text_hash));
            }
        }
        let keys: Vec<String> = streams
            .iter()
            .flat_map(|(page, hash)| Format::ALL.iter().map(move |format| stream_key(page, hash, *format)))
            .collect();
        tracing::debug!(page = name, pages = pages.len(), keys = keys.len(), "Invalidating cached streams");
        self.cache.delete_many(&keys);
        Ok(())
    }
}

fn build_processor(settings: &Settings, storages: &Storages) -> MarkupProcessor {
    MarkupProcessor::new()
        .with_template_base(settings.template_base.clone())
        .with_smilies(storages.smilies())
        .with_typography(settings.typography)
}

fn page_name(name: &str) -> Result<String, WikiError> {
    let normalized = normalize_pagename(name);
    if normalized.is_empty() {
        return Err(WikiError::InvalidPageName(name.to_owned()));
    }
    Ok(normalized)
}

fn author_of(principal: &Principal) -> Author {
    match &principal.name {
        Some(name) => Author::user(name.as_str()),
        None => Author::anonymous(principal.address.as_str()),
    }
}
