//! Output of the dynamic macros.
//!
//! The markup engine only declares these macros; their output depends on
//! the page store and is produced here while a stream is replayed.

mod changes;
mod date;
mod include;
mod lists;
mod tags;

use inyoka_markup::nodes::error_box;
use inyoka_markup::{Format, ListType, MacroCall, Node, NodeKind, get_title};
use inyoka_storage::StorageError;

use crate::context::WikiContext;

pub(crate) use date::DATE_FORMAT;

pub(crate) fn expand(context: &WikiContext<'_>, call: &MacroCall, format: Format) -> Node {
    tracing::debug!(id = %call.id, page = ?context.page(), %format, "Expanding dynamic macro");
    let result = match call.id.as_str() {
        "recent_changes" => changes::recent_changes(context, call.int_arg("per_page")),
        "new_pages" => changes::new_pages(context, call.int_arg("months")),
        "page_count" => lists::page_count(context),
        "page_list" => lists::page_list(
            context,
            call.str_arg("pattern"),
            call.bool_arg("case_sensitive"),
            call.bool_arg("shorten_title"),
        ),
        "attachment_list" => lists::attachment_list(context, call.str_arg("page")),
        "orphaned_pages" => lists::orphaned_pages(context),
        "missing_pages" => lists::missing_pages(context),
        "redirect_pages" => lists::redirect_pages(context),
        "similar_pages" => lists::similar_pages(context, call.str_arg("page")),
        "page_name" => Ok(Node::text(context.page().unwrap_or("Unbekannte Seite"))),
        "tag_cloud" => tags::tag_cloud(context, call.int_arg("max")),
        "tag_list" => tags::tag_list(context, call.str_arg("tag")),
        "date" => Ok(date::date(call.arg("date"), context.now())),
        "include" => include::include(context, call),
        _ => Ok(error_box(
            "Unbekanntes Makro",
            &format!("Das Makro „{}“ kann hier nicht dargestellt werden.", call.name),
        )),
    };
    result.unwrap_or_else(|error| {
        tracing::error!(id = %call.id, %error, "Dynamic macro failed");
        error_box("Fehler", &error.to_string())
    })
}

/// A link to an existing page, titled with its full name or its last
/// segment.
fn page_link(page: &str, full_title: bool) -> Node {
    Node::with_children(
        NodeKind::InternalLink {
            page: page.to_owned(),
            anchor: None,
            force_existing: true,
        },
        vec![Node::text(get_title(page, full_title))],
    )
}

/// An unordered list with one item per entry.
fn item_list(items: impl IntoIterator<Item = Vec<Node>>) -> Node {
    Node::with_children(
        NodeKind::List {
            list_type: ListType::Unordered,
        },
        items
            .into_iter()
            .map(|children| Node::with_children(NodeKind::ListItem, children))
            .collect(),
    )
}

/// Links to the given pages, one per list item.
fn page_list(pages: &[String], full_title: bool) -> Node {
    item_list(pages.iter().map(|page| vec![page_link(page, full_title)]))
}

type MacroResult = Result<Node, StorageError>;

#[cfg(test)]
pub(crate) mod testing {
    use inyoka_markup::{Format, MarkupProcessor, compile, render};
    use inyoka_storage::MemoryStore;

    use crate::context::WikiContext;
    use crate::settings::Settings;

    /// Render markup on a page as HTML with a context over `store`.
    pub(crate) fn render_html(store: &MemoryStore, page: Option<&str>, source: &str) -> String {
        render_with(store, page, source, |context| context)
    }

    pub(crate) fn render_with<F>(store: &MemoryStore, page: Option<&str>, source: &str, configure: F) -> String
    where
        F: for<'a> FnOnce(WikiContext<'a>) -> WikiContext<'a>,
    {
        let settings = Settings::default();
        let processor = MarkupProcessor::new();
        let mut context = WikiContext::new(store, &settings, &processor);
        if let Some(page) = page {
            context = context.with_page(page);
        }
        let context = configure(context);
        let tree = processor.process(source, page);
        render(&compile(&tree, Format::Html, &context), &context)
    }
}
