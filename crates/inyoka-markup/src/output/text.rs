use super::{Emitter, Visitor};
use crate::nodes::{Node, NodeKind};
use crate::stream::Instruction;

/// Plain text output: the text projection of the tree, with placeholders
/// where dynamic nodes sit.
pub(crate) struct TextWriter;

impl Visitor for TextWriter {
    fn node(&mut self, node: &Node, out: &mut Emitter<'_>) {
        if !node.has_any(|node| node.kind.is_dynamic()) {
            out.push_str(&node.text_content());
            return;
        }
        match &node.kind {
            NodeKind::Macro(call) => out.placeholder(Instruction::Macro(call.clone())),
            NodeKind::Parser(call) => out.placeholder(Instruction::Parser(call.clone())),
            NodeKind::Paragraph => {
                self.children(node, out);
                out.push_str("\n\n");
            }
            NodeKind::DefinitionTerm { term } => {
                out.push_str(term);
                out.push_str("\n");
                self.children(node, out);
                out.push_str("\n");
            }
            kind => {
                self.children(node, out);
                if kind.is_block_tag() {
                    out.push_str("\n");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{Arguments, MacroCall};
    use crate::stream::NullContext;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_around_dynamic_nodes() {
        let call = MacroCall {
            id: "page_count".to_owned(),
            name: "Seitenzahl".to_owned(),
            arguments: Arguments::default(),
            bound: Vec::new(),
            block: false,
        };
        let tree = Node::document(vec![
            Node::paragraph(vec![Node::strong(vec![Node::text("Pages: ")]), Node::new(NodeKind::Macro(call.clone()))]),
            Node::paragraph(vec![Node::text("end")]),
        ]);
        let mut out = Emitter::new(&NullContext);
        TextWriter.node(&tree, &mut out);
        assert_eq!(
            out.finish(),
            vec![
                Instruction::Text("Pages: ".to_owned()),
                Instruction::Macro(call),
                Instruction::Text("\n\nend\n\n".to_owned()),
            ]
        );
    }
}
