//! Metadata extraction and the keys with special meaning.

use std::collections::BTreeSet;

use inyoka_markup::{MarkupProcessor, PageSource, collect_metadata};

/// Target of a redirect page.
pub const REDIRECT_KEY: &str = "X-Redirect";
/// Cache lifetime of the page's compiled output, in seconds.
pub const CACHE_TIME_KEY: &str = "X-Cache-Time";

/// Internal keys anyone with edit rights may change.
const LENIENT_KEYS: [&str; 3] = ["X-Link", "X-Attach", "X-Redirect"];

/// Metadata of a page text: authored `# Key: value` lines, `X-Link` for
/// every internal link and whatever macros emit. Link targets are absolute,
/// duplicates are dropped.
pub fn extract_metadata(
    processor: &MarkupProcessor,
    pages: &dyn PageSource,
    page: &str,
    text: &str,
) -> Vec<(String, String)> {
    let context = processor.context(Some(page)).with_pages(pages);
    collect_metadata(&processor.process_in(text, context))
}

/// Internal keys other than the lenient ones may only be changed by
/// managers.
pub fn is_restricted_key(key: &str) -> bool {
    key.starts_with("X-") && !LENIENT_KEYS.contains(&key)
}

/// The first restricted key whose values differ between two metadata
/// lists.
pub fn changed_restricted_key(old: &[(String, String)], new: &[(String, String)]) -> Option<String> {
    let restricted = |entries: &[(String, String)]| -> BTreeSet<(String, String)> {
        entries
            .iter()
            .filter(|(key, _)| is_restricted_key(key))
            .cloned()
            .collect()
    };
    let (old, new) = (restricted(old), restricted(new));
    old.symmetric_difference(&new).map(|(key, _)| key.clone()).min()
}
