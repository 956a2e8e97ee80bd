use inyoka_markup::nodes::error_box;
use inyoka_markup::{Node, PagePattern};

use super::{MacroResult, item_list, page_link, page_list as links};
use crate::context::WikiContext;
use crate::metadata::REDIRECT_KEY;

/// Similar pages shown at most.
const SIMILAR_LIMIT: usize = 10;

pub(super) fn page_count(context: &WikiContext<'_>) -> MacroResult {
    Ok(Node::text(context.store().list_pages(None)?.len().to_string()))
}

/// Pages matching a `*` pattern, all pages if it is empty.
pub(super) fn page_list(
    context: &WikiContext<'_>,
    pattern: &str,
    case_sensitive: bool,
    shorten_title: bool,
) -> MacroResult {
    let mut pages = context.store().list_pages(None)?;
    if !pattern.is_empty() {
        pages = PagePattern::new(pattern, case_sensitive).filter(pages);
    }
    Ok(links(&pages, !shorten_title))
}

/// Attachment pages below `page`, or below the current page.
pub(super) fn attachment_list(context: &WikiContext<'_>, page: &str) -> MacroResult {
    let parent = if page.is_empty() { context.page() } else { Some(page) };
    let prefix = parent.map(|parent| format!("{parent}/"));
    let store = context.store();
    let mut items = Vec::new();
    for name in store.list_pages(None)? {
        if prefix.as_deref().is_some_and(|prefix| !name.starts_with(prefix)) {
            continue;
        }
        let Some(attachment) = store.get_by_name(&name, false)?.and_then(|page| page.revision.attachment) else {
            continue;
        };
        items.push(vec![
            page_link(&name, parent.is_none()),
            Node::text(format!(" ({}, {} Bytes)", attachment.mime_type, attachment.size)),
        ]);
    }
    Ok(item_list(items))
}

/// Pages no other page links to, except the main page.
pub(super) fn orphaned_pages(context: &WikiContext<'_>) -> MacroResult {
    let main_page = &context.settings().main_page;
    let orphans: Vec<String> = context
        .store()
        .find_orphans()?
        .into_iter()
        .filter(|name| name != main_page)
        .collect();
    Ok(links(&orphans, true))
}

/// Link targets without a page.
pub(super) fn missing_pages(context: &WikiContext<'_>) -> MacroResult {
    let missing = context.store().find_missing()?;
    Ok(item_list(missing.iter().map(|page| {
        vec![Node::internal_link(page, Vec::new(), None)]
    })))
}

/// Redirect pages with their targets.
pub(super) fn redirect_pages(context: &WikiContext<'_>) -> MacroResult {
    let store = context.store();
    let mut redirects = store.metadata_values(REDIRECT_KEY)?;
    redirects.sort();
    Ok(item_list(redirects.into_iter().map(|(page, target)| {
        vec![
            page_link(&page, true),
            Node::text(" \u{2794} "),
            Node::internal_link(&target, Vec::new(), None),
        ]
    })))
}

/// Pages with a name similar to `page` or the current page.
pub(super) fn similar_pages(context: &WikiContext<'_>, page: &str) -> MacroResult {
    let Some(name) = (if page.is_empty() { context.page() } else { Some(page) }) else {
        return Ok(error_box(
            "Parameterfehler",
            "Du musst eine Seite angeben, wenn das Makro außerhalb des Wikis verwendet wird.",
        ));
    };
    let similar: Vec<String> = context
        .store()
        .find_similar(name, SIMILAR_LIMIT + 1)?
        .into_iter()
        .filter(|candidate| candidate != name)
        .take(SIMILAR_LIMIT)
        .collect();
    Ok(links(&similar, true))
}

#[cfg(test)]
mod tests {
    use crate::macros::testing::render_html;
    use inyoka_storage::{Author, MemoryStore, NewRevision, PageStore};
    use pretty_assertions::assert_eq;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_page("Startseite", "[:Ubuntu:]")
            .with_page("Ubuntu", "[:Ubuntu/Installation:] [:Fehlt:]")
            .with_page("Ubuntu/Installation", "x")
            .with_page("Kubuntu", "y")
            .with_page("Alter_Name", "# X-Redirect: Ubuntu\n")
            .with_metadata("Ubuntu", "X-Link", "Ubuntu/Installation")
            .with_metadata("Ubuntu", "X-Link", "Fehlt")
            .with_metadata("Startseite", "X-Link", "Ubuntu")
            .with_metadata("Alter_Name", "X-Redirect", "Ubuntu")
    }

    fn link_texts(html: &str) -> Vec<String> {
        html.split("<li>")
            .skip(1)
            .map(|item| {
                let start = item.find('>').unwrap() + 1;
                let end = item.find("</a>").unwrap();
                item[start..end].to_owned()
            })
            .collect()
    }

    #[test]
    fn test_page_count() {
        assert!(render_html(&store(), Some("Start"), "[[Seitenzahl]]").contains('5'));
    }

    #[test]
    fn test_page_list_with_pattern() {
        let html = render_html(&store(), Some("Start"), "[[Seitenliste(\"ubuntu*\", case_sensitive=nein)]]");
        assert_eq!(link_texts(&html), vec!["Ubuntu", "Ubuntu/Installation"]);
        let html = render_html(&store(), Some("Start"), "[[Seitenliste(\"Ubuntu/*\", shorten_title=ja)]]");
        assert_eq!(link_texts(&html), vec!["Installation"]);
    }

    #[test]
    fn test_orphaned_and_missing_pages() {
        let html = render_html(&store(), Some("Start"), "[[VerwaisteSeiten]]");
        assert_eq!(link_texts(&html), vec!["Alter Name", "Kubuntu"]);
        let html = render_html(&store(), Some("Start"), "[[FehlendeSeiten]]");
        assert!(html.contains(r#"<a href="/Fehlt" class="internal missing">Fehlt</a>"#), "{html}");
    }

    #[test]
    fn test_redirect_pages() {
        let html = render_html(&store(), Some("Start"), "[[Weiterleitungen]]");
        assert!(html.contains("Alter Name</a> \u{2794} <a href=\"/Ubuntu\""), "{html}");
    }

    #[test]
    fn test_similar_pages() {
        let html = render_html(&store(), Some("Ubuntu"), "[[ÄhnlicheSeiten]]");
        assert_eq!(link_texts(&html), vec!["Kubuntu"]);
        let html = render_html(&store(), None, "[[ÄhnlicheSeiten]]");
        assert!(html.contains(r#"<div class="error">"#), "{html}");
    }

    #[test]
    fn test_attachment_list() {
        let store = store();
        store
            .create_revision(
                NewRevision::new("Ubuntu/logo.png", "", Author::user("ada")).with_attachment("image/png", vec![0; 4]),
            )
            .unwrap();
        let html = render_html(&store, Some("Ubuntu"), "[[Anhänge]]");
        assert_eq!(link_texts(&html), vec!["logo.png"]);
        assert!(html.contains("(image/png, 4 Bytes)"), "{html}");
    }
}
