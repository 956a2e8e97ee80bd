use std::collections::HashMap;

use super::Transformer;
use super::footnotes::is_footnote_list;
use crate::nodes::{Node, NodeKind, slugify};

/// Gives every headline an id derived from its text, unique within the
/// document. Clashes get a numeric suffix: `intro`, `intro-2`, `intro-3`.
#[derive(Debug, Clone, Copy)]
pub struct HeadlineIds;

impl Transformer for HeadlineIds {
    fn name(&self) -> &'static str {
        "headline_ids"
    }

    fn transform(&self, tree: &mut Node) {
        let mut seen: HashMap<String, u32> = HashMap::new();
        tree.walk_mut(&mut |node| {
            if !matches!(node.kind, NodeKind::Headline { .. }) {
                return;
            }
            let text = node.text_content();
            let mut id = if text.trim().is_empty() {
                "empty-headline".to_owned()
            } else {
                slugify(&text)
            };
            loop {
                match seen.get_mut(&id) {
                    None => {
                        seen.insert(id.clone(), 1);
                        break;
                    }
                    Some(count) => {
                        *count += 1;
                        id = format!("{id}-{count}");
                    }
                }
            }
            node.attrs.id = Some(id);
        });
    }
}

/// Wraps each top level headline and the nodes up to the next headline of
/// the same or a higher level into a section of that level.
#[derive(Debug, Clone, Copy)]
pub struct AutomaticStructure;

impl Transformer for AutomaticStructure {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn transform(&self, tree: &mut Node) {
        if !tree
            .children
            .iter()
            .any(|child| matches!(child.kind, NodeKind::Headline { .. }))
        {
            return;
        }
        let mut children = std::mem::take(&mut tree.children);
        let footnotes = match children.last() {
            Some(last) if is_footnote_list(last) => children.pop(),
            _ => None,
        };

        // Open sections as (level, children); index 0 is the document.
        let mut stack: Vec<(u8, Vec<Node>)> = vec![(0, Vec::new())];
        for child in children {
            if let NodeKind::Headline { level } = child.kind {
                while usize::from(level) < stack.len() {
                    close_section(&mut stack);
                }
                while usize::from(level) > stack.len() - 1 {
                    let next = u8::try_from(stack.len()).unwrap_or(u8::MAX);
                    stack.push((next, Vec::new()));
                }
            }
            if let Some((_, current)) = stack.last_mut() {
                current.push(child);
            }
        }
        while stack.len() > 1 {
            close_section(&mut stack);
        }
        tree.children = stack.pop().map(|(_, children)| children).unwrap_or_default();
        tree.children.extend(footnotes);
    }
}

fn close_section(stack: &mut Vec<(u8, Vec<Node>)>) {
    if stack.len() < 2 {
        return;
    }
    if let Some((level, children)) = stack.pop() {
        let section = Node::with_children(NodeKind::Section { level }, children);
        if let Some((_, parent)) = stack.last_mut() {
            parent.push(section);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headline(level: u8, text: &str) -> Node {
        Node::with_children(NodeKind::Headline { level }, vec![Node::text(text)])
    }

    fn ids(tree: &Node) -> Vec<String> {
        tree.descendants()
            .filter_map(|node| match node.kind {
                NodeKind::Headline { .. } => node.attrs.id.clone(),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_unique_ids() {
        let mut tree = Node::document(vec![
            headline(1, "Intro"),
            headline(2, "Intro"),
            headline(2, "Intro"),
            headline(1, "  "),
            headline(1, "Über uns"),
        ]);
        HeadlineIds.transform(&mut tree);
        assert_eq!(
            ids(&tree),
            vec!["intro", "intro-2", "intro-3", "empty-headline", "ueber-uns"]
        );
    }

    #[test]
    fn test_sections_nest_by_level() {
        let mut tree = Node::document(vec![
            Node::text("lead"),
            headline(1, "A"),
            Node::text("a"),
            headline(2, "B"),
            Node::text("b"),
            headline(1, "C"),
        ]);
        AutomaticStructure.transform(&mut tree);
        let section = |level, children| Node::with_children(NodeKind::Section { level }, children);
        assert_eq!(
            tree.children,
            vec![
                Node::text("lead"),
                section(
                    1,
                    vec![
                        headline(1, "A"),
                        Node::text("a"),
                        section(2, vec![headline(2, "B"), Node::text("b")]),
                    ]
                ),
                section(1, vec![headline(1, "C")]),
            ]
        );
    }

    #[test]
    fn test_deep_headline_opens_intermediate_sections() {
        let mut tree = Node::document(vec![headline(3, "Deep")]);
        AutomaticStructure.transform(&mut tree);
        let deep = Node::with_children(NodeKind::Section { level: 3 }, vec![headline(3, "Deep")]);
        let middle = Node::with_children(NodeKind::Section { level: 2 }, vec![deep]);
        assert_eq!(
            tree.children,
            vec![Node::with_children(NodeKind::Section { level: 1 }, vec![middle])]
        );
    }
}
