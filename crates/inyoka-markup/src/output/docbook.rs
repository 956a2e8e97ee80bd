//! DocBook output. Covers sections, paragraphs, lists, tables, links,
//! images and literals; purely presentational nodes only write their
//! children and raw HTML is dropped.

use std::fmt::Write;

use super::{Emitter, Visitor, escape_html};
use crate::nodes::{ListType, Node, NodeKind};
use crate::stream::Instruction;

pub(crate) struct DocBookWriter;

impl DocBookWriter {
    fn wrap(&mut self, open: &str, close: &str, node: &Node, out: &mut Emitter<'_>) {
        out.push_str(open);
        self.children(node, out);
        out.push_str(close);
    }

    /// List items and definitions hold blocks; inline content gets a
    /// paragraph.
    fn block_content(&mut self, node: &Node, out: &mut Emitter<'_>) {
        if node.children.iter().any(Node::is_block_tag) {
            self.children(node, out);
        } else {
            self.wrap("<para>", "</para>", node, out);
        }
    }
}

impl Visitor for DocBookWriter {
    fn node(&mut self, node: &Node, out: &mut Emitter<'_>) {
        match &node.kind {
            NodeKind::Text(text) => out.text(text),
            NodeKind::Section { level } => {
                let level = (*level).clamp(1, 5);
                self.wrap(&format!("<sect{level}>"), &format!("</sect{level}>"), node, out);
            }
            NodeKind::Headline { .. } => self.wrap("<title>", "</title>", node, out),
            NodeKind::Paragraph => self.wrap("<para>", "</para>", node, out),
            NodeKind::Strong => self.wrap(r#"<emphasis role="bold">"#, "</emphasis>", node, out),
            NodeKind::Emphasized => self.wrap("<emphasis>", "</emphasis>", node, out),
            NodeKind::Underline => self.wrap(r#"<emphasis role="underline">"#, "</emphasis>", node, out),
            NodeKind::Stroke => self.wrap(r#"<emphasis role="strikethrough">"#, "</emphasis>", node, out),
            NodeKind::Code => self.wrap("<literal>", "</literal>", node, out),
            NodeKind::Sub => self.wrap("<subscript>", "</subscript>", node, out),
            NodeKind::Sup => self.wrap("<superscript>", "</superscript>", node, out),
            NodeKind::Newline => out.push_str("\n"),
            NodeKind::InternalLink { page, anchor, .. } => {
                let mut url = out.resolver().page_url(page);
                if let Some(anchor) = anchor {
                    url.push('#');
                    url.push_str(anchor);
                }
                write!(out, r#"<ulink url="{}">"#, escape_html(&url)).unwrap();
                self.children(node, out);
                out.push_str("</ulink>");
            }
            NodeKind::InterWikiLink { wiki, page, anchor } => {
                out.placeholder(Instruction::InterWikiBegin {
                    wiki: wiki.clone(),
                    page: page.clone(),
                    anchor: anchor.clone(),
                });
                self.children(node, out);
                out.placeholder(Instruction::InterWikiEnd);
            }
            NodeKind::Link { url, .. } => {
                write!(out, r#"<ulink url="{}">"#, escape_html(url)).unwrap();
                if node.children.is_empty() {
                    out.text(url);
                } else {
                    self.children(node, out);
                }
                out.push_str("</ulink>");
            }
            NodeKind::SourceLink { target } => write!(out, "[{target}]").unwrap(),
            NodeKind::Image { href, .. } => {
                write!(
                    out,
                    r#"<mediaobject><imageobject><imagedata fileref="{}"/></imageobject></mediaobject>"#,
                    escape_html(href)
                )
                .unwrap();
            }
            NodeKind::Quote => self.wrap("<blockquote>", "</blockquote>", node, out),
            NodeKind::Preformatted => self.wrap("<screen>", "</screen>", node, out),
            NodeKind::List { list_type } => {
                let numeration = match list_type {
                    ListType::Unordered => None,
                    ListType::Arabic | ListType::ArabicZero => Some("arabic"),
                    ListType::AlphaLower => Some("loweralpha"),
                    ListType::AlphaUpper => Some("upperalpha"),
                    ListType::RomanLower => Some("lowerroman"),
                    ListType::RomanUpper => Some("upperroman"),
                };
                match numeration {
                    Some(numeration) => self.wrap(
                        &format!(r#"<orderedlist numeration="{numeration}">"#),
                        "</orderedlist>",
                        node,
                        out,
                    ),
                    None => self.wrap("<itemizedlist>", "</itemizedlist>", node, out),
                }
            }
            NodeKind::ListItem => {
                out.push_str("<listitem>");
                self.block_content(node, out);
                out.push_str("</listitem>");
            }
            NodeKind::DefinitionList => self.wrap("<variablelist>", "</variablelist>", node, out),
            NodeKind::DefinitionTerm { term } => {
                out.push_str("<varlistentry><term>");
                out.text(term);
                out.push_str("</term><listitem>");
                self.block_content(node, out);
                out.push_str("</listitem></varlistentry>");
            }
            NodeKind::Table => {
                let cols = node
                    .children
                    .iter()
                    .flat_map(|child| match child.kind {
                        NodeKind::TableHeadSection | NodeKind::TableBodySection => child.children.iter().collect(),
                        _ => vec![child],
                    })
                    .map(|row| row.children.len())
                    .max()
                    .unwrap_or(1)
                    .max(1);
                write!(out, r#"<informaltable><tgroup cols="{cols}"><tbody>"#).unwrap();
                self.children(node, out);
                out.push_str("</tbody></tgroup></informaltable>");
            }
            NodeKind::TableRow => self.wrap("<row>", "</row>", node, out),
            NodeKind::TableCell(_) | NodeKind::TableHeader(_) => self.wrap("<entry>", "</entry>", node, out),
            NodeKind::Footnote { .. } => {
                out.push_str("<footnote>");
                self.block_content(node, out);
                out.push_str("</footnote>");
            }
            NodeKind::Box { title, .. } => {
                out.push_str("<sidebar>");
                if let Some(title) = title {
                    out.push_str("<title>");
                    out.text(title);
                    out.push_str("</title>");
                }
                self.children(node, out);
                out.push_str("</sidebar>");
            }
            NodeKind::Error => self.wrap("<caution>", "</caution>", node, out),
            NodeKind::Macro(call) => out.placeholder(Instruction::Macro(call.clone())),
            NodeKind::Parser(call) => out.placeholder(Instruction::Parser(call.clone())),
            NodeKind::Html { .. } | NodeKind::MetaData { .. } | NodeKind::ConflictMarker(_) | NodeKind::Ruler => {}
            NodeKind::Document
            | NodeKind::Container
            | NodeKind::Small
            | NodeKind::Big
            | NodeKind::Color { .. }
            | NodeKind::Size { .. }
            | NodeKind::Font { .. }
            | NodeKind::Span
            | NodeKind::Layer
            | NodeKind::TableHeadSection
            | NodeKind::TableBodySection => self.children(node, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::CellAttrs;
    use crate::stream::NullContext;
    use pretty_assertions::assert_eq;

    fn docbook(nodes: Vec<Node>) -> String {
        let mut out = Emitter::new(&NullContext);
        DocBookWriter.node(&Node::document(nodes), &mut out);
        match out.finish().as_slice() {
            [Instruction::Text(text)] => text.clone(),
            other => panic!("unexpected instructions: {other:?}"),
        }
    }

    #[test]
    fn test_section_and_paragraph() {
        let section = Node::with_children(
            NodeKind::Section { level: 1 },
            vec![
                Node::with_children(NodeKind::Headline { level: 1 }, vec![Node::text("A & B")]),
                Node::paragraph(vec![Node::strong(vec![Node::text("x")])]),
            ],
        );
        assert_eq!(
            docbook(vec![section]),
            r#"<sect1><title>A &amp; B</title><para><emphasis role="bold">x</emphasis></para></sect1>"#
        );
    }

    #[test]
    fn test_list_items_get_paragraphs() {
        let list = Node::with_children(
            NodeKind::List {
                list_type: ListType::AlphaLower,
            },
            vec![Node::with_children(NodeKind::ListItem, vec![Node::text("a")])],
        );
        assert_eq!(
            docbook(vec![list]),
            r#"<orderedlist numeration="loweralpha"><listitem><para>a</para></listitem></orderedlist>"#
        );
    }

    #[test]
    fn test_table_counts_columns() {
        let cell = |text: &str| Node::with_children(NodeKind::TableCell(CellAttrs::default()), vec![Node::text(text)]);
        let table = Node::with_children(
            NodeKind::Table,
            vec![
                Node::with_children(NodeKind::TableRow, vec![cell("a"), cell("b")]),
                Node::with_children(NodeKind::TableRow, vec![cell("c")]),
            ],
        );
        assert_eq!(
            docbook(vec![table]),
            concat!(
                r#"<informaltable><tgroup cols="2"><tbody>"#,
                "<row><entry>a</entry><entry>b</entry></row><row><entry>c</entry></row>",
                "</tbody></tgroup></informaltable>"
            )
        );
    }

    #[test]
    fn test_raw_html_is_dropped() {
        let html = Node::new(NodeKind::Html {
            html: "<form></form>".to_owned(),
            block: true,
        });
        assert_eq!(docbook(vec![html, Node::text("x")]), "x");
    }
}
