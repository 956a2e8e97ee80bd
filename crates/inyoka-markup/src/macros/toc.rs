//! The table of contents tree macro.

use super::{Macro, MacroKind, Stage};
use crate::args::{ArgumentSpec, MacroCall};
use crate::nodes::{ListType, Node, NodeKind};

const LIST_TYPES: &[(&str, &str)] = &[
    ("unordered", "unordered"),
    ("arabic0", "arabiczero"),
    ("arabic", "arabic"),
    ("alphabeth", "alphalower"),
    ("ALPHABETH", "alphaupper"),
    ("roman", "romanlower"),
    ("ROMAN", "romanupper"),
];

const ARGUMENTS: &[ArgumentSpec] = &[
    ArgumentSpec::int("max_depth", 3),
    ArgumentSpec::choice("type", LIST_TYPES, "arabic"),
];

/// Nested list of links to the headlines of the document.
///
/// Runs after the transformers so headline ids are final.
#[derive(Debug, Clone, Copy)]
pub struct TableOfContents;

impl Macro for TableOfContents {
    fn id(&self) -> &'static str {
        "table_of_contents"
    }

    fn kind(&self) -> MacroKind {
        MacroKind::Tree(Stage::Final)
    }

    fn arguments(&self) -> &'static [ArgumentSpec] {
        ARGUMENTS
    }

    fn is_block_tag(&self) -> bool {
        true
    }

    fn expand_tree(&self, call: &MacroCall, tree: &Node) -> Node {
        let depth = usize::try_from(call.int_arg("max_depth")).unwrap_or(0);
        let list_type = ListType::from_name(call.str_arg("type")).unwrap_or(ListType::Arabic);

        let mut stack: Vec<Vec<Node>> = vec![Vec::new()];
        for headline in tree.descendants() {
            let NodeKind::Headline { level } = headline.kind else {
                continue;
            };
            let level = usize::from(level).max(1);
            if level > depth {
                continue;
            }
            while level > stack.len() {
                stack.push(Vec::new());
            }
            while level < stack.len() {
                close_level(&mut stack, list_type);
            }
            let target = format!("#{}", headline.attrs.id.as_deref().unwrap_or_default());
            let link = Node::link(target, vec![Node::text(headline.text_content().trim())]);
            if let Some(items) = stack.last_mut() {
                items.push(Node::with_children(NodeKind::ListItem, vec![link]));
            }
        }
        while stack.len() > 1 {
            close_level(&mut stack, list_type);
        }
        let items = stack.pop().unwrap_or_default();
        Node::with_children(NodeKind::List { list_type }, items).with_class("toc")
    }
}

/// Wrap the innermost level into a list attached to the last item above.
fn close_level(stack: &mut Vec<Vec<Node>>, list_type: ListType) {
    let Some(items) = stack.pop() else {
        return;
    };
    let list = Node::with_children(NodeKind::List { list_type }, items);
    let Some(parent) = stack.last_mut() else {
        return;
    };
    match parent.last_mut() {
        Some(item) => item.children.push(list),
        None => parent.push(Node::with_children(NodeKind::ListItem, vec![list])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{Arguments, bind_arguments};
    use pretty_assertions::assert_eq;

    fn headline(level: u8, text: &str, id: &str) -> Node {
        Node::with_children(NodeKind::Headline { level }, vec![Node::text(text)]).with_id(id)
    }

    fn call(depth: &str) -> MacroCall {
        let arguments = Arguments {
            positional: vec![depth.to_owned()],
            keyword: vec![("type".to_owned(), "unordered".to_owned())],
        };
        MacroCall {
            id: "table_of_contents".to_owned(),
            name: "Inhaltsverzeichnis".to_owned(),
            bound: bind_arguments(ARGUMENTS, &arguments),
            arguments,
            block: true,
        }
    }

    fn item(target: &str, text: &str, nested: Option<Node>) -> Node {
        let mut children = vec![Node::link(format!("#{target}"), vec![Node::text(text)])];
        children.extend(nested);
        Node::with_children(NodeKind::ListItem, children)
    }

    fn list(items: Vec<Node>) -> Node {
        Node::with_children(
            NodeKind::List {
                list_type: ListType::Unordered,
            },
            items,
        )
    }

    #[test]
    fn test_nested_headlines() {
        let tree = Node::document(vec![
            headline(1, "A", "a"),
            headline(2, "B", "b"),
            headline(3, "Deep", "deep"),
            headline(1, "C", "c"),
        ]);
        let toc = TableOfContents.expand_tree(&call("2"), &tree);
        let expected = list(vec![
            item("a", "A", Some(list(vec![item("b", "B", None)]))),
            item("c", "C", None),
        ])
        .with_class("toc");
        assert_eq!(toc, expected);
    }

    #[test]
    fn test_starting_below_top_level() {
        let tree = Node::document(vec![headline(2, "B", "b")]);
        let toc = TableOfContents.expand_tree(&call("3"), &tree);
        let expected = list(vec![Node::with_children(
            NodeKind::ListItem,
            vec![list(vec![item("b", "B", None)])],
        )])
        .with_class("toc");
        assert_eq!(toc, expected);
    }
}
