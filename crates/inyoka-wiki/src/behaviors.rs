//! Services configured by behavior pages.
//!
//! A page whose `X-Behave` metadata names a behavior contributes its data
//! to that service. The data is the first preformatted block of the page,
//! or the whole text if it has none. Blank lines and lines starting with
//! `#` are ignored.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use inyoka_markup::output::encode_path;
use inyoka_markup::transformers::SmileyMap;
use inyoka_markup::{MarkupProcessor, NodeKind, is_external_target};
use inyoka_storage::{PageStore, StorageError};

use crate::acl::Acl;

/// Metadata key registering a behavior page.
pub const BEHAVE_KEY: &str = "X-Behave";
pub const ACL_BEHAVIOR: &str = "Access-Control-List";
pub const INTERWIKI_BEHAVIOR: &str = "Interwiki-Map";
pub const SMILEY_BEHAVIOR: &str = "Smiley-Map";
pub const STYLE_BEHAVIOR: &str = "Markup-Stylesheet";

/// URL templates of other wikis by prefix.
#[derive(Debug, Clone, Default)]
pub struct InterwikiMap {
    prefixes: HashMap<String, String>,
}

impl InterwikiMap {
    /// Parse `prefix = url` lines. `$PAGE` in the URL stands for the target.
    pub fn parse<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut prefixes = HashMap::new();
        for line in lines {
            match parse_assignment(line) {
                Some((prefix, url)) => {
                    prefixes.insert(prefix.to_owned(), url.to_owned());
                }
                None => tracing::warn!(line, "Skipping invalid interwiki line"),
            }
        }
        Self { prefixes }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>, template: impl Into<String>) -> Self {
        self.prefixes.insert(prefix.into(), template.into());
        self
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// URL of `page` in the wiki known as `prefix`.
    ///
    /// ```
    /// use inyoka_wiki::InterwikiMap;
    ///
    /// let map = InterwikiMap::default().with_prefix("wikipedia", "https://de.wikipedia.org/wiki/$PAGE");
    /// assert_eq!(map.url("wikipedia", "Rust (Programmiersprache)").as_deref(),
    ///            Some("https://de.wikipedia.org/wiki/Rust%20(Programmiersprache)"));
    /// assert_eq!(map.url("unknown", "x"), None);
    /// ```
    pub fn url(&self, prefix: &str, page: &str) -> Option<String> {
        self.prefixes.get(prefix).map(|template| expand_url(template, page))
    }
}

/// Substitute `$PAGE` in a URL template, or append the page if the
/// template has no placeholder.
pub fn expand_url(template: &str, page: &str) -> String {
    let quoted = encode_path(page);
    if template.contains("$PAGE") {
        template.replace("$PAGE", &quoted)
    } else {
        format!("{template}{quoted}")
    }
}

fn parse_assignment(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let (key, value) = (key.trim(), value.trim());
    (!key.is_empty() && !value.is_empty()).then_some((key, value))
}

/// Lines of the data block of a behavior page.
pub fn data_lines(text: &str) -> Vec<String> {
    let tree = MarkupProcessor::new().process(text, None);
    let block = tree
        .descendants()
        .find(|node| matches!(node.kind, NodeKind::Preformatted))
        .map_or_else(|| text.to_owned(), inyoka_markup::Node::text_content);
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

/// The ACL, interwiki, smiley and stylesheet services.
///
/// Readers get snapshots; [`reload`](Self::reload) swaps every service at
/// once.
#[derive(Debug, Default)]
pub struct Storages {
    acl: RwLock<Arc<Acl>>,
    interwiki: RwLock<Arc<InterwikiMap>>,
    smilies: RwLock<SmileyMap>,
    style: RwLock<Arc<String>>,
}

impl Storages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acl(&self) -> Arc<Acl> {
        Arc::clone(&self.acl.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn interwiki(&self) -> Arc<InterwikiMap> {
        Arc::clone(&self.interwiki.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn smilies(&self) -> SmileyMap {
        self.smilies.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn style(&self) -> Arc<String> {
        Arc::clone(&self.style.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Read all behavior pages from the store and replace the services.
    /// Smiley images that are page names become URLs below `base_url`.
    pub fn reload(&self, store: &dyn PageStore, base_url: &str) -> Result<(), StorageError> {
        let acl_lines = behavior_lines(store, ACL_BEHAVIOR)?;
        let acl = Acl::parse(acl_lines.iter().map(String::as_str));
        let interwiki_lines = behavior_lines(store, INTERWIKI_BEHAVIOR)?;
        let interwiki = InterwikiMap::parse(interwiki_lines.iter().map(String::as_str));
        let smilies = SmileyMap::new(behavior_lines(store, SMILEY_BEHAVIOR)?.iter().filter_map(|line| {
            let Some((code, image)) = parse_assignment(line) else {
                tracing::warn!(line, "Skipping invalid smiley line");
                return None;
            };
            let url = if is_external_target(image) {
                image.to_owned()
            } else {
                format!("{base_url}{}", encode_path(image))
            };
            Some((code.to_owned(), url))
        }));
        let style = behavior_lines(store, STYLE_BEHAVIOR)?.join("\n");

        tracing::info!(
            acl_rules = acl.len(),
            interwiki_prefixes = interwiki.len(),
            smilies = smilies.entries().len(),
            "Reloaded behavior storages"
        );
        *self.acl.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(acl);
        *self.interwiki.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(interwiki);
        *self.smilies.write().unwrap_or_else(PoisonError::into_inner) = smilies;
        *self.style.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(style);
        Ok(())
    }
}

fn behavior_lines(store: &dyn PageStore, behavior: &str) -> Result<Vec<String>, StorageError> {
    let mut lines = Vec::new();
    for name in store.find_by_metadata(BEHAVE_KEY, Some(behavior))? {
        if let Some(page) = store.get_by_name(&name, false)? {
            lines.extend(data_lines(&page.text));
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::acl::{Principal, Privilege};
    use inyoka_storage::MemoryStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_data_lines_prefer_preformatted_block() {
        let text = "# X-Behave: Interwiki-Map\nSome intro.\n{{{\n# comment\nwikipedia = https://de.wikipedia.org/wiki/$PAGE\n\nbug = https://bugs.example.org/\n}}}\n";
        assert_eq!(
            data_lines(text),
            vec![
                "wikipedia = https://de.wikipedia.org/wiki/$PAGE",
                "bug = https://bugs.example.org/"
            ]
        );
        assert_eq!(data_lines("a = b\n\n# c\n"), vec!["a = b"]);
    }

    #[test]
    fn test_interwiki_url_without_placeholder() {
        let map = InterwikiMap::parse(["bug = https://bugs.example.org/", "broken"]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.url("bug", "123").as_deref(), Some("https://bugs.example.org/123"));
    }

    #[test]
    fn test_poisoned_services_keep_serving() {
        let storages = Arc::new(Storages::new());
        let writer = Arc::clone(&storages);
        let result = std::thread::spawn(move || {
            let _guard = writer.style.write().unwrap();
            panic!("writer died");
        })
        .join();
        assert!(result.is_err());
        assert!(storages.style.is_poisoned());

        assert_eq!(storages.style().as_str(), "");
        let store = MemoryStore::new()
            .with_page("Wiki/Style", ".box { color: red; }")
            .with_metadata("Wiki/Style", BEHAVE_KEY, STYLE_BEHAVIOR);
        storages.reload(&store, "/").unwrap();
        assert_eq!(storages.style().as_str(), ".box { color: red; }");
    }

    #[test]
    fn test_reload_reads_behavior_pages() {
        let store = MemoryStore::new()
            .with_page("Wiki/ACL", "{{{\n* @All +read\n}}}")
            .with_metadata("Wiki/ACL", BEHAVE_KEY, ACL_BEHAVIOR)
            .with_page("Wiki/Interwiki", "ubuntu = https://ubuntu.com/$PAGE")
            .with_metadata("Wiki/Interwiki", BEHAVE_KEY, INTERWIKI_BEHAVIOR)
            .with_page("Wiki/Smilies", ":) = Wiki/Smilies/smile.png\n:D = https://example.org/grin.png")
            .with_metadata("Wiki/Smilies", BEHAVE_KEY, SMILEY_BEHAVIOR)
            .with_page("Wiki/Style", ".box { color: red; }")
            .with_metadata("Wiki/Style", BEHAVE_KEY, STYLE_BEHAVIOR);

        let storages = Storages::new();
        assert!(storages.acl().is_empty());
        storages.reload(&store, "/").unwrap();

        let privileges = storages.acl().privileges(&Principal::anonymous(), "X", BTreeSet::new);
        assert!(privileges.contains(Privilege::Read));
        assert!(!privileges.contains(Privilege::Edit));
        assert_eq!(
            storages.interwiki().url("ubuntu", "desktop").as_deref(),
            Some("https://ubuntu.com/desktop")
        );
        let smilies = storages.smilies();
        assert_eq!(smilies.get(":)"), Some("/Wiki/Smilies/smile.png"));
        assert_eq!(smilies.get(":D"), Some("https://example.org/grin.png"));
        assert_eq!(storages.style().as_str(), ".box { color: red; }");
    }
}
