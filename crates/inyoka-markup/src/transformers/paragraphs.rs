use std::sync::LazyLock;

use regex::Regex;

use super::Transformer;
use crate::nodes::{Node, NodeKind};

static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\s*?\n){2,}").unwrap());

/// Wraps inline runs in paragraphs and turns single newlines into line
/// breaks.
///
/// Only containers that allow paragraphs get them. Outside the document a
/// container with a single inline run keeps it unwrapped, so `<li>a</li>`
/// stays as it is.
#[derive(Debug, Clone, Copy)]
pub struct AutomaticParagraphs;

impl Transformer for AutomaticParagraphs {
    fn name(&self) -> &'static str {
        "paragraphs"
    }

    fn transform(&self, tree: &mut Node) {
        transform_node(tree);
    }
}

enum Chunk {
    Block(Node),
    Inline(Vec<Node>),
}

fn transform_node(node: &mut Node) {
    for child in &mut node.children {
        if !child.children.is_empty() && !child.is_raw() {
            transform_node(child);
        }
    }
    let children = joined_text(std::mem::take(&mut node.children));

    if !node.allows_paragraphs() {
        let mut result = Vec::with_capacity(children.len());
        for child in children {
            match child.kind {
                NodeKind::Text(text) => {
                    let lines = break_lines(&text, result.last());
                    result.extend(lines);
                }
                _ => result.push(child),
            }
        }
        node.children = result;
        return;
    }

    let mut chunks = vec![Chunk::Inline(Vec::new())];
    for child in children {
        if let NodeKind::Text(text) = &child.kind {
            let mut last = 0;
            for found in PARAGRAPH_BREAK.find_iter(text) {
                push_lines(&mut chunks, &text[last..found.start()]);
                chunks.push(Chunk::Inline(Vec::new()));
                last = found.end();
            }
            push_lines(&mut chunks, &text[last..]);
        } else if child.is_block_tag() {
            chunks.push(Chunk::Block(child));
            chunks.push(Chunk::Inline(Vec::new()));
        } else if let Some(Chunk::Inline(run)) = chunks.last_mut() {
            run.push(child);
        }
    }

    let runs: Vec<Chunk> = chunks
        .into_iter()
        .filter_map(|chunk| match chunk {
            Chunk::Inline(run) => {
                let run = trim_run(run);
                (!run.is_empty()).then_some(Chunk::Inline(run))
            }
            block => Some(block),
        })
        .collect();

    let inline_runs = runs.iter().filter(|chunk| matches!(chunk, Chunk::Inline(_))).count();
    let wrap = inline_runs > 1 || matches!(node.kind, NodeKind::Document);
    let mut result = Vec::with_capacity(runs.len());
    for chunk in runs {
        match chunk {
            Chunk::Block(block) => result.push(block),
            Chunk::Inline(run) if wrap => result.push(Node::paragraph(run)),
            Chunk::Inline(run) => result.extend(run),
        }
    }
    node.children = result;
}

fn push_lines(chunks: &mut [Chunk], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Chunk::Inline(run)) = chunks.last_mut() {
        let lines = break_lines(text, run.last());
        run.extend(lines);
    }
}

/// Merge adjacent text nodes.
fn joined_text(children: Vec<Node>) -> Vec<Node> {
    let mut result: Vec<Node> = Vec::with_capacity(children.len());
    for child in children {
        if let (Some(NodeKind::Text(last)), NodeKind::Text(text)) =
            (result.last_mut().map(|node| &mut node.kind), &child.kind)
        {
            last.push_str(text);
            continue;
        }
        if child.as_text() != Some("") {
            result.push(child);
        }
    }
    result
}

/// Split text on inner newlines. Newlines at the start of a run or after a
/// block are dropped; a trailing newline stays part of the text.
fn break_lines(text: &str, previous: Option<&Node>) -> Vec<Node> {
    let mut ignore_newline = previous.is_none_or(Node::is_block_tag);
    let mut result = Vec::new();
    let mut rest = text;
    while let Some(index) = rest.find('\n') {
        if index + 1 == rest.len() {
            break;
        }
        if index > 0 {
            result.push(Node::text(&rest[..index]));
            ignore_newline = false;
        }
        if !ignore_newline {
            result.push(Node::new(NodeKind::Newline));
        }
        rest = &rest[index + 1..];
    }
    if !rest.is_empty() {
        result.push(Node::text(rest));
    }
    result
}

/// Strip whitespace and line breaks at both ends of an inline run. A run
/// with nothing visible left is empty.
fn trim_run(mut run: Vec<Node>) -> Vec<Node> {
    while run
        .first()
        .is_some_and(|node| matches!(node.kind, NodeKind::Newline) || node.as_text().is_some_and(|t| t.trim().is_empty()))
    {
        run.remove(0);
    }
    while run
        .last()
        .is_some_and(|node| matches!(node.kind, NodeKind::Newline) || node.as_text().is_some_and(|t| t.trim().is_empty()))
    {
        run.pop();
    }
    if let Some(NodeKind::Text(text)) = run.first_mut().map(|node| &mut node.kind) {
        *text = text.trim_start().to_owned();
    }
    if let Some(NodeKind::Text(text)) = run.last_mut().map(|node| &mut node.kind) {
        *text = text.trim_end().to_owned();
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(children: Vec<Node>) -> Vec<Node> {
        let mut tree = Node::document(children);
        AutomaticParagraphs.transform(&mut tree);
        tree.children
    }

    #[test]
    fn test_paragraph_split() {
        assert_eq!(
            run(vec![Node::text("one\n\ntwo\n  \nthree")]),
            vec![
                Node::paragraph(vec![Node::text("one")]),
                Node::paragraph(vec![Node::text("two")]),
                Node::paragraph(vec![Node::text("three")]),
            ]
        );
    }

    #[test]
    fn test_single_newline_breaks_line() {
        assert_eq!(
            run(vec![Node::text("a\nb\n")]),
            vec![Node::paragraph(vec![
                Node::text("a"),
                Node::new(NodeKind::Newline),
                Node::text("b"),
            ])]
        );
    }

    #[test]
    fn test_blocks_split_paragraphs() {
        let headline = Node::with_children(NodeKind::Headline { level: 1 }, vec![Node::text("H")]);
        assert_eq!(
            run(vec![
                headline.clone(),
                Node::text("\n\nHello "),
                Node::strong(vec![Node::text("you")]),
                Node::text(".\n\n"),
                Node::new(NodeKind::Ruler),
            ]),
            vec![
                headline,
                Node::paragraph(vec![
                    Node::text("Hello "),
                    Node::strong(vec![Node::text("you")]),
                    Node::text("."),
                ]),
                Node::new(NodeKind::Ruler),
            ]
        );
    }

    #[test]
    fn test_single_run_in_list_item_is_not_wrapped() {
        let item = Node::with_children(NodeKind::ListItem, vec![Node::text("a")]);
        assert_eq!(run(vec![item.clone()]), vec![item]);
    }

    #[test]
    fn test_raw_nodes_are_untouched() {
        let pre = Node::with_children(NodeKind::Preformatted, vec![Node::text("a\n\nb\nc")]);
        assert_eq!(run(vec![pre.clone()]), vec![pre]);
    }

    #[test]
    fn test_whitespace_only_text_is_dropped() {
        assert_eq!(run(vec![Node::text("  \n ")]), Vec::<Node>::new());
    }
}
