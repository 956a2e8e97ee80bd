//! XHTML compatible output.

use std::fmt::Write;

use super::highlight::highlight;
use super::{Emitter, Visitor, encode_anchor, escape_html, link_host};
use crate::nodes::{Attrs, CellAttrs, ConflictSide, ListType, Node, NodeKind};
use crate::stream::Instruction;

/// Font families written without quotes.
const GENERIC_FAMILIES: &[&str] = &["serif", "sans-serif", "monospace", "cursive", "fantasy"];

/// Captions of free links longer than this are collapsed.
const SHORTEN_AFTER: usize = 40;
const SHORTEN_KEEP: usize = 22;

/// An opening tag under construction.
///
/// Classes and styles of the node kind come first, the node's own `class`
/// and `style` attributes are appended.
struct Tag {
    name: &'static str,
    attrs: Vec<(&'static str, String)>,
    id: Option<String>,
    classes: Vec<String>,
    styles: Vec<String>,
}

impl Tag {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            attrs: Vec::new(),
            id: None,
            classes: Vec::new(),
            styles: Vec::new(),
        }
    }

    fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    fn style(mut self, style: impl Into<String>) -> Self {
        self.styles.push(style.into());
        self
    }

    fn node_attrs(mut self, attrs: &Attrs) -> Self {
        self.id.clone_from(&attrs.id);
        self.classes.extend(attrs.class.iter().cloned());
        self.styles.extend(attrs.style.iter().cloned());
        self
    }

    fn write(&self, out: &mut Emitter<'_>, void: bool) {
        write!(out, "<{}", self.name).unwrap();
        for (name, value) in &self.attrs {
            write!(out, r#" {name}="{}""#, escape_html(value)).unwrap();
        }
        if let Some(id) = &self.id {
            write!(out, r#" id="{}""#, escape_html(id)).unwrap();
        }
        if !self.classes.is_empty() {
            write!(out, r#" class="{}""#, escape_html(&self.classes.join(" "))).unwrap();
        }
        if !self.styles.is_empty() {
            write!(out, r#" style="{}""#, escape_html(&self.styles.join("; "))).unwrap();
        }
        out.push_str(if void { " />" } else { ">" });
    }
}

pub(crate) struct HtmlWriter;

impl HtmlWriter {
    /// Write the tag around the node's children.
    fn wrap(&mut self, tag: Tag, node: &Node, out: &mut Emitter<'_>) {
        tag.write(out, false);
        self.children(node, out);
        write!(out, "</{}>", tag.name).unwrap();
    }

    fn simple(&mut self, name: &'static str, node: &Node, out: &mut Emitter<'_>) {
        self.wrap(Tag::new(name).node_attrs(&node.attrs), node, out);
    }

    fn internal_link(&mut self, node: &Node, page: &str, anchor: Option<&str>, force_existing: bool, out: &mut Emitter<'_>) {
        let resolver = out.resolver();
        let mut href = resolver.page_url(page);
        if let Some(anchor) = anchor {
            href.push('#');
            href.push_str(&encode_anchor(anchor));
        }
        let mut tag = Tag::new("a").attr("href", href).class("internal");
        if !force_existing && !resolver.page_exists(page) {
            tag = tag.class("missing");
        }
        self.wrap(tag.node_attrs(&node.attrs), node, out);
    }

    fn link(&mut self, node: &Node, url: &str, title: Option<&str>, shorten: bool, out: &mut Emitter<'_>) {
        if url.starts_with("javascript:") {
            self.children(node, out);
            return;
        }
        let local = link_host(url).is_none_or(|host| out.resolver().is_local_host(host));
        let mut tag = Tag::new("a").attr("href", url);
        if !local {
            tag = tag.attr("rel", "nofollow");
        }
        match title {
            Some(title) => tag = tag.attr("title", title),
            None if node.children.is_empty() => tag = tag.attr("title", url),
            None => {}
        }
        let tag = tag
            .class(if local { "crosslink" } else { "external" })
            .node_attrs(&node.attrs);
        tag.write(out, false);
        if node.children.is_empty() {
            write_caption(url, shorten, out);
        } else {
            self.children(node, out);
        }
        out.push_str("</a>");
    }

    fn cell(&mut self, name: &'static str, node: &Node, cell: &CellAttrs, out: &mut Emitter<'_>) {
        let mut tag = Tag::new(name);
        if cell.colspan > 1 {
            tag = tag.attr("colspan", cell.colspan.to_string());
        }
        if cell.rowspan > 1 {
            tag = tag.attr("rowspan", cell.rowspan.to_string());
        }
        if let Some(align) = &cell.align {
            tag = tag.style(format!("text-align: {align}"));
        }
        if let Some(valign) = &cell.valign {
            tag = tag.style(format!("vertical-align: {valign}"));
        }
        self.wrap(tag.node_attrs(&node.attrs), node, out);
    }
}

impl Visitor for HtmlWriter {
    fn node(&mut self, node: &Node, out: &mut Emitter<'_>) {
        match &node.kind {
            NodeKind::Document | NodeKind::Container => self.children(node, out),
            NodeKind::Text(text) => out.text(text),
            NodeKind::Html { html, .. } => out.push_str(html),
            NodeKind::Section { level } => {
                let tag = Tag::new("div").class(format!("section_{level}"));
                self.wrap(tag.node_attrs(&node.attrs), node, out);
            }
            NodeKind::Paragraph => self.simple("p", node, out),
            NodeKind::Headline { level } => {
                let name = match level {
                    0 | 1 => "h2",
                    2 => "h3",
                    3 => "h4",
                    4 => "h5",
                    _ => "h6",
                };
                self.simple(name, node, out);
            }
            NodeKind::Strong => self.simple("strong", node, out),
            NodeKind::Emphasized => self.simple("em", node, out),
            NodeKind::Underline => {
                let tag = Tag::new("span").class("underline");
                self.wrap(tag.node_attrs(&node.attrs), node, out);
            }
            NodeKind::Stroke => self.simple("del", node, out),
            NodeKind::Code => self.simple("code", node, out),
            NodeKind::Small => self.simple("small", node, out),
            NodeKind::Big => self.simple("big", node, out),
            NodeKind::Sub => self.simple("sub", node, out),
            NodeKind::Sup => self.simple("sup", node, out),
            NodeKind::Color { value } => {
                let tag = Tag::new("span").style(format!("color: {value}"));
                self.wrap(tag.node_attrs(&node.attrs), node, out);
            }
            NodeKind::Size { size } => {
                let tag = Tag::new("span").style(format!("font-size: {size}%"));
                self.wrap(tag.node_attrs(&node.attrs), node, out);
            }
            NodeKind::Font { faces } => {
                let family = faces
                    .iter()
                    .map(|face| {
                        if GENERIC_FAMILIES.contains(&face.as_str()) {
                            face.clone()
                        } else {
                            format!("'{face}'")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let tag = Tag::new("span").style(format!("font-family: {family}"));
                self.wrap(tag.node_attrs(&node.attrs), node, out);
            }
            NodeKind::Span => self.simple("span", node, out),
            NodeKind::Layer => self.simple("div", node, out),
            NodeKind::Ruler => out.push_str("<hr />"),
            NodeKind::Newline => out.push_str("<br />"),
            NodeKind::InternalLink {
                page,
                anchor,
                force_existing,
            } => self.internal_link(node, page, anchor.as_deref(), *force_existing, out),
            NodeKind::InterWikiLink { wiki, page, anchor } => {
                out.placeholder(Instruction::InterWikiBegin {
                    wiki: wiki.clone(),
                    page: page.clone(),
                    anchor: anchor.clone(),
                });
                self.children(node, out);
                out.placeholder(Instruction::InterWikiEnd);
            }
            NodeKind::Link { url, title, shorten } => self.link(node, url, title.as_deref(), *shorten, out),
            NodeKind::SourceLink { target } => {
                Tag::new("sup").node_attrs(&node.attrs).write(out, false);
                write!(out, r##"<a href="#source-{target}">[{target}]</a></sup>"##).unwrap();
            }
            NodeKind::Image { href, alt } => {
                Tag::new("img")
                    .attr("src", href.clone())
                    .attr("alt", alt.clone())
                    .node_attrs(&node.attrs)
                    .write(out, true);
            }
            NodeKind::Quote => self.simple("blockquote", node, out),
            NodeKind::Preformatted => {
                let highlighted = node
                    .attrs
                    .class
                    .as_deref()
                    .and_then(|class| class.strip_prefix("syntax-"))
                    .and_then(|language| highlight(&node.text_content(), language));
                match highlighted {
                    Some(html) => {
                        Tag::new("pre").node_attrs(&node.attrs).write(out, false);
                        out.push_str(&html);
                        out.push_str("</pre>");
                    }
                    None => self.simple("pre", node, out),
                }
            }
            NodeKind::List { list_type } => {
                let tag = match list_type {
                    ListType::Unordered => Tag::new("ul"),
                    ordered => Tag::new("ol").class(ordered.as_str()),
                };
                self.wrap(tag.node_attrs(&node.attrs), node, out);
            }
            NodeKind::ListItem => self.simple("li", node, out),
            NodeKind::DefinitionList => self.simple("dl", node, out),
            NodeKind::DefinitionTerm { term } => {
                Tag::new("dt").node_attrs(&node.attrs).write(out, false);
                out.text(term);
                out.push_str("</dt><dd>");
                self.children(node, out);
                out.push_str("</dd>");
            }
            NodeKind::Table => self.simple("table", node, out),
            NodeKind::TableRow => self.simple("tr", node, out),
            NodeKind::TableCell(cell) => self.cell("td", node, cell, out),
            NodeKind::TableHeader(cell) => self.cell("th", node, cell, out),
            NodeKind::TableHeadSection => self.simple("thead", node, out),
            NodeKind::TableBodySection => self.simple("tbody", node, out),
            NodeKind::Footnote { number: Some(number) } => {
                write!(
                    out,
                    r##"<a href="#fn-{number}" id="bfn-{number}" class="footnote"><span class="paren">[</span>{number}<span class="paren">]</span></a>"##
                )
                .unwrap();
            }
            NodeKind::Footnote { number: None } => {
                let tag = Tag::new("small").class("note");
                self.wrap(tag.node_attrs(&node.attrs), node, out);
            }
            NodeKind::Box { title, align, valign } => {
                let mut tag = Tag::new("div").class("box");
                if let Some(align) = align {
                    tag = tag.style(format!("text-align: {align}"));
                }
                if let Some(valign) = valign {
                    tag = tag.style(format!("vertical-align: {valign}"));
                }
                tag.node_attrs(&node.attrs).write(out, false);
                if let Some(title) = title {
                    out.push_str("<h3>");
                    out.text(title);
                    out.push_str("</h3>");
                }
                out.push_str(r#"<div class="contents">"#);
                self.children(node, out);
                out.push_str("</div></div>");
            }
            NodeKind::Error => {
                let tag = Tag::new("div").class("error");
                self.wrap(tag.node_attrs(&node.attrs), node, out);
            }
            NodeKind::MetaData { .. } => {}
            NodeKind::Macro(call) => out.placeholder(Instruction::Macro(call.clone())),
            NodeKind::Parser(call) => out.placeholder(Instruction::Parser(call.clone())),
            NodeKind::ConflictMarker(side) => {
                let label = match side {
                    ConflictSide::Left => "<strong>Konflikt</strong>: andere Version",
                    ConflictSide::Middle => "<strong>Konflikt</strong>: eigene Version",
                    ConflictSide::Right => "<strong>Konflikt Ende</strong>",
                };
                write!(out, r#"<div class="conflict conflict-{}">{label}</div>"#, side.as_str()).unwrap();
            }
        }
    }
}

/// Caption of a link without children. Long free links keep their start
/// visible and collapse the rest.
fn write_caption(url: &str, shorten: bool, out: &mut Emitter<'_>) {
    if !shorten || url.chars().count() <= SHORTEN_AFTER {
        out.text(url);
        return;
    }
    let split = url.char_indices().nth(SHORTEN_KEEP).map_or(url.len(), |(index, _)| index);
    out.text(&url[..split]);
    out.push_str(r#"<span class="longlinkcollapse">"#);
    out.text(&url[split..]);
    out.push_str("</span>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{LinkResolver, NullContext};
    use pretty_assertions::assert_eq;

    struct Site;

    impl LinkResolver for Site {
        fn page_exists(&self, page: &str) -> bool {
            page != "Missing"
        }

        fn is_local_host(&self, host: &str) -> bool {
            host == "example.org" || host.ends_with(".example.org")
        }
    }

    fn html_with(resolver: &dyn LinkResolver, nodes: Vec<Node>) -> String {
        let mut out = Emitter::new(resolver);
        HtmlWriter.node(&Node::document(nodes), &mut out);
        match out.finish().as_slice() {
            [Instruction::Text(text)] => text.clone(),
            [] => String::new(),
            other => panic!("unexpected instructions: {other:?}"),
        }
    }

    fn html(nodes: Vec<Node>) -> String {
        html_with(&NullContext, nodes)
    }

    #[test]
    fn test_headline_section_and_attrs() {
        let headline = Node::with_children(NodeKind::Headline { level: 1 }, vec![Node::text("Intro")]).with_id("intro");
        let section = Node::with_children(NodeKind::Section { level: 1 }, vec![headline]);
        assert_eq!(
            html(vec![section]),
            r#"<div class="section_1"><h2 id="intro">Intro</h2></div>"#
        );
    }

    #[test]
    fn test_internal_links() {
        let existing = Node::internal_link("Foo Bar", Vec::new(), Some("Über".to_owned()));
        let missing = Node::internal_link("Missing", vec![Node::text("x")], None);
        assert_eq!(
            html_with(&Site, vec![existing, missing]),
            r##"<a href="/Foo_Bar#%C3%9Cber" class="internal">Foo Bar</a><a href="/Missing" class="internal missing">x</a>"##
        );
    }

    #[test]
    fn test_external_links() {
        let local = Node::link("https://wiki.example.org/x", vec![Node::text("here")]);
        let external = Node::link("https://rust-lang.org", vec![Node::text("Rust")]);
        assert_eq!(
            html_with(&Site, vec![local, external]),
            concat!(
                r#"<a href="https://wiki.example.org/x" class="crosslink">here</a>"#,
                r#"<a href="https://rust-lang.org" rel="nofollow" class="external">Rust</a>"#
            )
        );
    }

    #[test]
    fn test_long_free_link_is_collapsed() {
        let url = "https://example.com/a/very/long/path/that/keeps/going";
        let link = Node::new(NodeKind::Link {
            url: url.to_owned(),
            title: None,
            shorten: true,
        });
        assert_eq!(
            html(vec![link]),
            format!(
                r#"<a href="{url}" rel="nofollow" title="{url}" class="external">https://example.com/a/<span class="longlinkcollapse">very/long/path/that/keeps/going</span></a>"#
            )
        );
    }

    #[test]
    fn test_inline_styles() {
        let font = Node::with_children(
            NodeKind::Font {
                faces: vec!["Arial".to_owned(), "sans-serif".to_owned()],
            },
            vec![Node::text("f")],
        );
        let size = Node::with_children(NodeKind::Size { size: 150.0 }, vec![Node::text("s")]);
        let color = Node::with_children(NodeKind::Color { value: "red".to_owned() }, vec![Node::text("c")])
            .with_style("font-weight: bold");
        assert_eq!(
            html(vec![font, size, color]),
            concat!(
                r#"<span style="font-family: &#39;Arial&#39;, sans-serif">f</span>"#,
                r#"<span style="font-size: 150%">s</span>"#,
                r#"<span style="color: red; font-weight: bold">c</span>"#
            )
        );
    }

    #[test]
    fn test_table_cells() {
        let cell = CellAttrs {
            colspan: 2,
            rowspan: 1,
            align: Some("center".to_owned()),
            valign: None,
        };
        let row = Node::with_children(
            NodeKind::TableRow,
            vec![
                Node::with_children(NodeKind::TableHeader(CellAttrs::default()), vec![Node::text("h")]),
                Node::with_children(NodeKind::TableCell(cell), vec![Node::text("c")]).with_class("x"),
            ],
        );
        assert_eq!(
            html(vec![Node::with_children(NodeKind::Table, vec![row])]),
            r#"<table><tr><th>h</th><td colspan="2" class="x" style="text-align: center">c</td></tr></table>"#
        );
    }

    #[test]
    fn test_box_and_footnote() {
        let boxed = Node::with_children(
            NodeKind::Box {
                title: Some("Tipp".to_owned()),
                align: None,
                valign: None,
            },
            vec![Node::text("x")],
        );
        let footnote = Node::with_children(NodeKind::Footnote { number: Some(3) }, vec![Node::text("ignored")]);
        assert_eq!(
            html(vec![boxed, footnote]),
            concat!(
                r#"<div class="box"><h3>Tipp</h3><div class="contents">x</div></div>"#,
                r##"<a href="#fn-3" id="bfn-3" class="footnote"><span class="paren">[</span>3<span class="paren">]</span></a>"##
            )
        );
    }

    #[test]
    fn test_lists_and_conflicts() {
        let item = Node::with_children(NodeKind::ListItem, vec![Node::text("a")]);
        let ordered = Node::with_children(
            NodeKind::List {
                list_type: ListType::RomanUpper,
            },
            vec![item],
        );
        assert_eq!(
            html(vec![ordered, Node::new(NodeKind::ConflictMarker(ConflictSide::Right))]),
            r#"<ol class="romanupper"><li>a</li></ol><div class="conflict conflict-right"><strong>Konflikt Ende</strong></div>"#
        );
    }

    #[test]
    fn test_code_blocks_are_highlighted() {
        let code = |language: &str| {
            Node::with_children(NodeKind::Preformatted, vec![Node::text("let a = 1 < 2;")])
                .with_class(format!("syntax-{language}"))
        };
        let rust = html(vec![code("rust")]);
        assert!(rust.starts_with(r#"<pre class="syntax-rust"><span style="#), "{rust}");
        assert!(rust.ends_with("</pre>"), "{rust}");
        assert_eq!(
            html(vec![code("unknown")]),
            r#"<pre class="syntax-unknown">let a = 1 &lt; 2;</pre>"#
        );
    }

    #[test]
    fn test_metadata_is_invisible() {
        assert_eq!(html(vec![Node::metadata("X-Redirect", vec!["Target".to_owned()])]), "");
    }
}
