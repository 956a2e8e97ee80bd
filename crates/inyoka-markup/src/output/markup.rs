//! Markup regenerated from a tree.

use crate::args::quote_value;
use crate::lexer::escape;
use crate::nodes::{CellAttrs, ConflictSide, Node, NodeKind};

/// Metadata keys the parser emits itself; writing them back would
/// duplicate them.
const DERIVED_KEYS: &[&str] = &["X-Link", "X-Attach"];

/// Write a tree back as markup.
///
/// ```
/// use inyoka_markup::Node;
/// use inyoka_markup::output::generate_markup;
///
/// let tree = Node::document(vec![Node::strong(vec![Node::text("hi")])]);
/// assert_eq!(generate_markup(&tree), "'''hi'''\n");
/// ```
pub fn generate_markup(tree: &Node) -> String {
    let mut writer = MarkupWriter::default();
    writer.node(tree);
    let mut out = writer.out.trim_end().to_owned();
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

#[derive(Default)]
struct MarkupWriter {
    out: String,
    list_depth: usize,
    /// Set after a construct that ends its own line.
    after_block: bool,
}

impl MarkupWriter {
    fn markup(&mut self, markup: &str) {
        self.out.push_str(markup);
        self.after_block = false;
    }

    /// Start a new line unless already at the start of one.
    fn newline(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn end_block(&mut self) {
        self.newline();
        self.after_block = true;
    }

    fn children(&mut self, node: &Node) {
        for child in &node.children {
            self.node(child);
        }
    }

    fn wrap(&mut self, open: &str, close: &str, node: &Node) {
        self.markup(open);
        self.children(node);
        self.markup(close);
    }

    fn text(&mut self, text: &str) {
        let text = if self.after_block {
            text.strip_prefix('\n').unwrap_or(text)
        } else {
            text
        };
        if !text.is_empty() {
            self.markup(&escape(text));
        }
    }

    /// Static expansions are written as the call they came from.
    fn origin(&mut self, node: &Node, origin: &str) {
        if node.is_block_tag() || node.children.iter().any(Node::is_block_tag) {
            self.newline();
            self.markup(origin);
            self.end_block();
        } else {
            self.markup(origin);
        }
    }

    fn node(&mut self, node: &Node) {
        if let Some(origin) = &node.origin {
            self.origin(node, origin);
            return;
        }
        match &node.kind {
            NodeKind::Document
            | NodeKind::Container
            | NodeKind::Section { .. }
            | NodeKind::Span
            | NodeKind::Layer
            | NodeKind::Error
            | NodeKind::ListItem
            | NodeKind::TableHeadSection
            | NodeKind::TableBodySection => self.children(node),
            NodeKind::Text(text) => self.text(text),
            NodeKind::Html { .. } => {}
            NodeKind::Paragraph => {
                self.newline();
                self.children(node);
                self.newline();
                self.out.push('\n');
                self.after_block = true;
            }
            NodeKind::Headline { level } => {
                let marks = "=".repeat(usize::from(*level).max(1));
                self.newline();
                self.wrap(&format!("{marks} "), &format!(" {marks}"), node);
                self.end_block();
            }
            NodeKind::Strong => self.wrap("'''", "'''", node),
            NodeKind::Emphasized => self.wrap("''", "''", node),
            NodeKind::Underline => self.wrap("__", "__", node),
            NodeKind::Stroke => self.wrap("--(", ")--", node),
            NodeKind::Code => {
                let code = node.text_content();
                self.markup(&format!("``{code}``"));
            }
            NodeKind::Small => self.wrap("~-", "-~", node),
            NodeKind::Big => self.wrap("~+", "+~", node),
            NodeKind::Sub => self.wrap(",,", ",,", node),
            NodeKind::Sup => self.wrap("^^", "^^", node),
            NodeKind::Color { value } => self.wrap(&format!("[color={value}]"), "[/color]", node),
            NodeKind::Size { size } => self.wrap(&format!("[size={size}]"), "[/size]", node),
            NodeKind::Font { faces } => self.wrap(&format!("[font={}]", faces.join(",")), "[/font]", node),
            NodeKind::Ruler => {
                self.newline();
                self.markup("----");
                self.end_block();
            }
            NodeKind::Newline => {
                self.markup("\\\\");
                self.out.push('\n');
            }
            NodeKind::InternalLink { page, anchor, .. } => {
                let target = link_target(page, anchor.as_deref());
                self.wrap(&format!("[:{target}:"), "]", node);
            }
            NodeKind::InterWikiLink { wiki, page, anchor } => {
                let target = link_target(page, anchor.as_deref());
                self.wrap(&format!("[{wiki}:{target}:"), "]", node);
            }
            NodeKind::Link { url, shorten, .. } => {
                if *shorten && node.children.is_empty() {
                    self.markup(url);
                } else if url.starts_with('#') {
                    self.wrap(&format!("[:{url}:"), "]", node);
                } else if node.children.is_empty() || node.text_content() == *url {
                    self.markup(&format!("[{url}]"));
                } else {
                    self.wrap(&format!("[{url} "), "]", node);
                }
            }
            NodeKind::SourceLink { target } => self.markup(&format!("[{target}]")),
            NodeKind::Image { href, alt } => {
                if node.attrs.class.as_deref() == Some("smiley") {
                    self.markup(alt);
                } else {
                    self.markup(&format!("[[Bild({})]]", quote_value(href)));
                }
            }
            NodeKind::Quote => self.quote(node),
            NodeKind::Preformatted => {
                self.newline();
                self.markup(&format!("{{{{{{\n{}\n}}}}}}", node.text_content()));
                self.end_block();
            }
            NodeKind::List { list_type } => {
                self.list_depth += 1;
                let indent = " ".repeat(self.list_depth);
                for item in &node.children {
                    self.newline();
                    self.markup(&format!("{indent}{} ", list_type.marker()));
                    for child in &item.children {
                        match child.kind {
                            NodeKind::Paragraph => self.children(child),
                            _ => self.node(child),
                        }
                    }
                }
                self.list_depth -= 1;
                self.end_block();
            }
            NodeKind::DefinitionList => {
                self.children(node);
                self.end_block();
            }
            NodeKind::DefinitionTerm { term } => {
                self.newline();
                self.markup(&format!("  {term}:: "));
                for child in &node.children {
                    match child.kind {
                        NodeKind::Paragraph => self.children(child),
                        _ => self.node(child),
                    }
                }
                self.end_block();
            }
            NodeKind::Table => {
                self.newline();
                for (index, row) in node.children.iter().enumerate() {
                    let table = (index == 0).then_some(node);
                    self.table_row(row, table);
                }
                self.end_block();
            }
            NodeKind::TableRow => self.table_row(node, None),
            NodeKind::TableCell(cell) | NodeKind::TableHeader(cell) => {
                self.table_cell(node, cell, Vec::new());
            }
            NodeKind::Footnote { .. } => self.wrap("((", "))", node),
            NodeKind::Box { title, align, valign } => {
                let mut arguments = Vec::new();
                let fields = [
                    ("title", title.as_deref()),
                    ("align", align.as_deref()),
                    ("valign", valign.as_deref()),
                    ("class", node.attrs.class.as_deref()),
                    ("style", node.attrs.style.as_deref()),
                ];
                for (key, value) in fields {
                    if let Some(value) = value {
                        arguments.push(format!("{key}={}", quote_value(value)));
                    }
                }
                self.newline();
                if arguments.is_empty() {
                    self.markup("{{|\n");
                } else {
                    self.markup(&format!("{{{{|<{}>\n", arguments.join(", ")));
                }
                self.children(node);
                self.newline();
                self.markup("|}}");
                self.end_block();
            }
            NodeKind::MetaData { key, values } => {
                if DERIVED_KEYS.contains(&key.as_str()) {
                    return;
                }
                let values: Vec<String> = values
                    .iter()
                    .map(|value| {
                        if value.contains(',') || value.contains('"') {
                            quote_value(value)
                        } else {
                            value.clone()
                        }
                    })
                    .collect();
                self.newline();
                self.markup(&format!("# {key}: {}", values.join(", ")));
                self.end_block();
            }
            NodeKind::Macro(call) => {
                if call.block {
                    self.newline();
                    self.markup(&call.wiki_representation());
                    self.end_block();
                } else {
                    self.markup(&call.wiki_representation());
                }
            }
            NodeKind::Parser(call) => {
                self.newline();
                self.markup(&call.wiki_representation());
                self.end_block();
            }
            NodeKind::ConflictMarker(side) => {
                let marker = match side {
                    ConflictSide::Left => '<',
                    ConflictSide::Middle => '=',
                    ConflictSide::Right => '>',
                };
                self.newline();
                self.markup(&marker.to_string().repeat(40));
                self.end_block();
            }
        }
    }

    fn quote(&mut self, node: &Node) {
        let mut inner = MarkupWriter::default();
        inner.children(node);
        self.newline();
        for line in inner.out.trim_end().lines() {
            if line.starts_with('>') {
                self.out.push('>');
            } else {
                self.out.push_str("> ");
            }
            self.out.push_str(line);
            self.out.push('\n');
        }
        self.after_block = true;
    }

    /// Row and table attributes travel with the first cell.
    fn table_row(&mut self, row: &Node, table: Option<&Node>) {
        self.newline();
        self.markup("||");
        for (index, cell) in row.children.iter().enumerate() {
            let mut extra = Vec::new();
            if index == 0 {
                let attrs = [
                    ("rowclass", row.attrs.class.as_deref()),
                    ("rowstyle", row.attrs.style.as_deref()),
                    ("tableclass", table.and_then(|table| table.attrs.class.as_deref())),
                    ("tablestyle", table.and_then(|table| table.attrs.style.as_deref())),
                ];
                for (key, value) in attrs {
                    if let Some(value) = value {
                        extra.push(format!("{key}={}", quote_value(value)));
                    }
                }
            }
            match &cell.kind {
                NodeKind::TableCell(attrs) | NodeKind::TableHeader(attrs) => self.table_cell(cell, attrs, extra),
                _ => {
                    self.markup(" ");
                    self.node(cell);
                    self.markup(" ||");
                }
            }
        }
        self.out.push('\n');
    }

    fn table_cell(&mut self, cell: &Node, attrs: &CellAttrs, mut extra: Vec<String>) {
        let mut flags = Vec::new();
        if matches!(cell.kind, NodeKind::TableHeader(_)) {
            flags.push("header".to_owned());
        }
        if attrs.colspan > 1 {
            flags.push(format!("-{}", attrs.colspan));
        }
        if attrs.rowspan > 1 {
            flags.push(format!("|{}", attrs.rowspan));
        }
        match attrs.align.as_deref() {
            Some("left") => flags.push("(".to_owned()),
            Some("center") => flags.push(":".to_owned()),
            Some("right") => flags.push(")".to_owned()),
            _ => {}
        }
        match attrs.valign.as_deref() {
            Some("top") => flags.push("^".to_owned()),
            Some("bottom") => flags.push("v".to_owned()),
            _ => {}
        }
        let fields = [
            ("id", cell.attrs.id.as_deref()),
            ("class", cell.attrs.class.as_deref()),
            ("style", cell.attrs.style.as_deref()),
        ];
        let mut parts = flags;
        for (key, value) in fields {
            if let Some(value) = value {
                parts.push(format!("{key}={}", quote_value(value)));
            }
        }
        parts.append(&mut extra);
        if !parts.is_empty() {
            self.markup(&format!("<{}>", parts.join(" ")));
        }
        self.markup(" ");
        self.children(cell);
        self.markup(" ||");
    }
}

fn link_target(page: &str, anchor: Option<&str>) -> String {
    let mut target = page.replace(':', "::");
    if let Some(anchor) = anchor {
        target.push('#');
        target.push_str(anchor);
    }
    target
}
