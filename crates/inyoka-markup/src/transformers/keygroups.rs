use super::Transformer;
use crate::nodes::{Node, NodeKind};

pub(crate) const KEY_CLASS: &str = "key";
const KEY_GROUP_CLASS: &str = "key-group";

/// Replaces paragraphs that hold nothing but keys (and `+` separators)
/// with a bare key group span.
#[derive(Debug, Clone, Copy)]
pub struct KeyGroups;

impl Transformer for KeyGroups {
    fn name(&self) -> &'static str {
        "key_groups"
    }

    fn transform(&self, tree: &mut Node) {
        transform_node(tree);
    }
}

fn has_class(node: &Node, class: &str) -> bool {
    matches!(node.kind, NodeKind::Span) && node.attrs.class.as_deref() == Some(class)
}

fn is_key_paragraph(node: &Node) -> bool {
    if !matches!(node.kind, NodeKind::Paragraph) {
        return false;
    }
    if let [only] = node.children.as_slice()
        && has_class(only, KEY_GROUP_CLASS)
    {
        return true;
    }
    node.children.iter().any(|child| has_class(child, KEY_CLASS))
        && node.children.iter().all(|child| {
            has_class(child, KEY_CLASS)
                || child
                    .as_text()
                    .is_some_and(|text| text.chars().all(|c| c.is_whitespace() || c == '+'))
        })
}

fn transform_node(node: &mut Node) {
    if node.is_raw() {
        return;
    }
    for child in &mut node.children {
        if is_key_paragraph(child) {
            let mut children = std::mem::take(&mut child.children);
            let regrouped = children.len() == 1 && has_class(&children[0], KEY_GROUP_CLASS);
            *child = match children.pop() {
                Some(group) if regrouped => group,
                last => {
                    children.extend(last);
                    Node::with_children(NodeKind::Span, children).with_class(KEY_GROUP_CLASS)
                }
            };
        } else {
            transform_node(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(label: &str) -> Node {
        Node::with_children(NodeKind::Span, vec![Node::text(label)]).with_class(KEY_CLASS)
    }

    #[test]
    fn test_key_paragraph_is_unwrapped() {
        let keys = vec![key("Strg"), Node::text(" + "), key("C")];
        let mut tree = Node::document(vec![Node::paragraph(keys.clone())]);
        KeyGroups.transform(&mut tree);
        assert_eq!(
            tree.children,
            vec![Node::with_children(NodeKind::Span, keys).with_class(KEY_GROUP_CLASS)]
        );

        let once = tree.clone();
        let mut rewrapped = Node::document(vec![Node::paragraph(tree.children)]);
        KeyGroups.transform(&mut rewrapped);
        assert_eq!(rewrapped, once);
    }

    #[test]
    fn test_mixed_paragraph_is_kept() {
        let paragraph = Node::paragraph(vec![Node::text("Press "), key("C")]);
        let mut tree = Node::document(vec![paragraph.clone()]);
        KeyGroups.transform(&mut tree);
        assert_eq!(tree.children, vec![paragraph]);
    }
}
