//! The live render context of the wiki.

use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use inyoka_markup::output::encode_path;
use inyoka_markup::{Format, LinkResolver, MacroCall, MarkupProcessor, Node, PageSource, RenderContext};
use inyoka_storage::PageStore;

use crate::behaviors::{InterwikiMap, expand_url};
use crate::macros;
use crate::settings::Settings;

/// Interwiki prefix of user profile links.
pub const USER_PREFIX: &str = "user";

/// Page texts for the parser, read from a store.
pub struct StorePages<'a>(pub &'a dyn PageStore);

impl PageSource for StorePages<'_> {
    fn page_text(&self, name: &str) -> Option<String> {
        match self.0.get_by_name(name, false) {
            Ok(page) => page.map(|page| page.text),
            Err(error) => {
                tracing::warn!(page = name, %error, "Could not load page for the parser");
                None
            }
        }
    }
}

/// Resolves links and expands dynamic macros against a page store.
///
/// A context renders one page; pages embedded with the include macro are
/// tracked so an include cycle ends in an error box.
pub struct WikiContext<'a> {
    store: &'a dyn PageStore,
    settings: &'a Settings,
    processor: &'a MarkupProcessor,
    interwiki: Arc<InterwikiMap>,
    page: Option<String>,
    active_tag: Option<String>,
    now: DateTime<Utc>,
    included: RefCell<HashSet<String>>,
}

impl<'a> WikiContext<'a> {
    pub fn new(store: &'a dyn PageStore, settings: &'a Settings, processor: &'a MarkupProcessor) -> Self {
        Self {
            store,
            settings,
            processor,
            interwiki: Arc::default(),
            page: None,
            active_tag: None,
            now: Utc::now(),
            included: RefCell::default(),
        }
    }

    /// The page being rendered.
    #[must_use]
    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        let page = page.into();
        self.included.get_mut().insert(page.clone());
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_interwiki(mut self, interwiki: Arc<InterwikiMap>) -> Self {
        self.interwiki = interwiki;
        self
    }

    /// Tag selected by the reader, shown by the tag cloud as a list.
    #[must_use]
    pub fn with_active_tag(mut self, tag: Option<String>) -> Self {
        self.active_tag = tag.filter(|tag| !tag.is_empty());
        self
    }

    /// Reference time of date based macros.
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    pub(crate) fn store(&self) -> &dyn PageStore {
        self.store
    }

    pub(crate) fn settings(&self) -> &Settings {
        self.settings
    }

    pub(crate) fn active_tag(&self) -> Option<&str> {
        self.active_tag.as_deref()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Parse the text of another page as it would be parsed on its own.
    pub(crate) fn parse_page(&self, name: &str, text: &str) -> Node {
        let pages = StorePages(self.store);
        let context = self.processor.context(Some(name)).with_pages(&pages);
        self.processor.process_in(text, context)
    }

    /// Mark a page as being included. `false` if it already is.
    pub(crate) fn enter_include(&self, name: &str) -> bool {
        self.included.borrow_mut().insert(name.to_owned())
    }

    pub(crate) fn leave_include(&self, name: &str) {
        self.included.borrow_mut().remove(name);
    }
}

impl LinkResolver for WikiContext<'_> {
    fn page_exists(&self, page: &str) -> bool {
        self.store.exists(page).unwrap_or_else(|error| {
            tracing::warn!(page, %error, "Could not check page existence");
            false
        })
    }

    fn page_url(&self, page: &str) -> String {
        format!("{}{}", self.settings.base_url, encode_path(page))
    }

    fn interwiki_url(&self, wiki: &str, page: &str) -> Option<String> {
        self.interwiki
            .url(wiki, page)
            .or_else(|| (wiki == USER_PREFIX).then(|| expand_url(&self.settings.user_url, page)))
    }

    fn is_local_host(&self, host: &str) -> bool {
        let domain = self.settings.base_domain.as_str();
        if domain.is_empty() {
            return false;
        }
        host == domain || host.strip_suffix(domain).is_some_and(|sub| sub.ends_with('.'))
    }
}

impl RenderContext for WikiContext<'_> {
    fn expand_macro(&self, call: &MacroCall, format: Format) -> Node {
        macros::expand(self, call, format)
    }
}
