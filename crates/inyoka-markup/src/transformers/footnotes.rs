use super::Transformer;
use crate::nodes::{ListType, Node, NodeKind};

pub(crate) const FOOTNOTES_CLASS: &str = "footnotes";

/// Numbers footnotes in document order and lists their contents at the end
/// of the document, each entry linking back to its reference.
#[derive(Debug, Clone, Copy)]
pub struct FootnoteSupport;

impl Transformer for FootnoteSupport {
    fn name(&self) -> &'static str {
        "footnotes"
    }

    fn transform(&self, tree: &mut Node) {
        remove_footnote_lists(tree);

        let mut count = 0u32;
        tree.walk_mut(&mut |node| {
            if let NodeKind::Footnote { number } = &mut node.kind {
                count = count.saturating_add(1);
                *number = Some(count);
            }
        });

        // Nested footnotes are numbered before their outer note is copied.
        let items: Vec<Node> = tree
            .descendants()
            .filter_map(|node| match node.kind {
                NodeKind::Footnote { number: Some(id) } => {
                    let backlink =
                        Node::link(format!("#bfn-{id}"), vec![Node::text(id.to_string())]).with_id(format!("fn-{id}"));
                    let mut children = vec![backlink, Node::text(": ")];
                    children.extend(node.children.iter().cloned());
                    Some(Node::with_children(NodeKind::ListItem, children))
                }
                _ => None,
            })
            .collect();

        if !items.is_empty() {
            let list = Node::with_children(
                NodeKind::List {
                    list_type: ListType::Unordered,
                },
                items,
            )
            .with_class(FOOTNOTES_CLASS);
            tree.children.push(list);
        }
    }
}

pub(crate) fn is_footnote_list(node: &Node) -> bool {
    matches!(node.kind, NodeKind::List { .. }) && node.attrs.class.as_deref() == Some(FOOTNOTES_CLASS)
}

fn remove_footnote_lists(node: &mut Node) {
    node.children.retain(|child| !is_footnote_list(child));
    for child in &mut node.children {
        if matches!(child.kind, NodeKind::Section { .. }) {
            remove_footnote_lists(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn footnote(text: &str) -> Node {
        Node::with_children(NodeKind::Footnote { number: None }, vec![Node::text(text)])
    }

    #[test]
    fn test_numbering_and_list() {
        let mut tree = Node::document(vec![Node::paragraph(vec![
            Node::text("a"),
            footnote("first"),
            Node::text("b"),
            footnote("second"),
        ])]);
        FootnoteSupport.transform(&mut tree);

        let numbers: Vec<Option<u32>> = tree
            .descendants()
            .filter_map(|node| match node.kind {
                NodeKind::Footnote { number } => Some(number),
                _ => None,
            })
            .collect();
        assert_eq!(numbers, vec![Some(1), Some(2)]);

        let list = tree.children.last().unwrap();
        assert!(is_footnote_list(list));
        assert_eq!(
            list.children[1],
            Node::with_children(
                NodeKind::ListItem,
                vec![
                    Node::link("#bfn-2", vec![Node::text("2")]).with_id("fn-2"),
                    Node::text(": "),
                    Node::text("second"),
                ]
            )
        );
    }

    #[test]
    fn test_rerun_replaces_list() {
        let mut tree = Node::document(vec![Node::paragraph(vec![footnote("x")])]);
        FootnoteSupport.transform(&mut tree);
        let once = tree.clone();
        FootnoteSupport.transform(&mut tree);
        assert_eq!(tree, once);
    }

    #[test]
    fn test_nested_footnotes_are_numbered_in_list() {
        let outer = Node::with_children(NodeKind::Footnote { number: None }, vec![Node::text("a"), footnote("b")]);
        let mut tree = Node::document(vec![Node::paragraph(vec![outer])]);
        FootnoteSupport.transform(&mut tree);

        let list = tree.children.last().unwrap();
        assert_eq!(list.children.len(), 2);
        let listed: Vec<Option<u32>> = list
            .descendants()
            .filter_map(|node| match node.kind {
                NodeKind::Footnote { number } => Some(number),
                _ => None,
            })
            .collect();
        assert_eq!(listed, vec![Some(2)]);

        let once = tree.clone();
        FootnoteSupport.transform(&mut tree);
        assert_eq!(tree, once);
    }

    #[test]
    fn test_no_footnotes_no_list() {
        let mut tree = Node::document(vec![Node::paragraph(vec![Node::text("x")])]);
        FootnoteSupport.transform(&mut tree);
        assert_eq!(tree.children.len(), 1);
    }
}
