use inyoka_markup::{Node, NodeKind};
use inyoka_storage::{TAG_KEY, TagCount};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::{MacroResult, item_list, page_list};
use crate::context::WikiContext;

/// Relative URL selecting a tag.
fn tag_url(tag: &str) -> String {
    format!("?tag={}", utf8_percent_encode(tag, NON_ALPHANUMERIC))
}

fn tag_link(tag: &TagCount) -> Node {
    let title = if tag.count == 1 {
        "eine Seite".to_owned()
    } else {
        format!("{} Seiten", tag.count)
    };
    Node::with_children(
        NodeKind::Link {
            url: tag_url(&tag.name),
            title: Some(title),
            shorten: false,
        },
        vec![Node::text(tag.name.as_str())],
    )
}

/// The `max` most used tags sized by use. With a tag selected by the
/// reader the pages of that tag are listed instead.
pub(super) fn tag_cloud(context: &WikiContext<'_>, max: i64) -> MacroResult {
    if let Some(tag) = context.active_tag() {
        return tag_list(context, tag);
    }
    let max = usize::try_from(max).unwrap_or(0);
    let mut children = Vec::new();
    for tag in context.store().get_tagcloud(max)? {
        if !children.is_empty() {
            children.push(Node::text(" "));
        }
        children.push(tag_link(&tag).with_style(format!("font-size: {}%", tag.weight)));
    }
    Ok(Node::with_children(NodeKind::Layer, children).with_class("tagcloud"))
}

/// Pages tagged with `tag` or the selected tag, otherwise all tags.
pub(super) fn tag_list(context: &WikiContext<'_>, tag: &str) -> MacroResult {
    let store = context.store();
    let tag = if tag.is_empty() { context.active_tag() } else { Some(tag) };
    let list = match tag {
        Some(tag) => page_list(&store.find_by_metadata(TAG_KEY, Some(tag))?, true),
        None => item_list(
            store
                .get_tagcloud(usize::MAX)?
                .iter()
                .map(|tag| vec![tag_link(tag)]),
        ),
    };
    Ok(list.with_class("taglist"))
}
