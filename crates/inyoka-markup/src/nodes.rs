//! The syntax tree.
//!
//! A tree is made of [`Node`] values. Each node carries a [`NodeKind`] with
//! the kind specific data, a list of children and the common `id`, `class`
//! and `style` attributes. Capability flags (`is_block_tag`, `is_raw`,
//! `allows_paragraphs`, `allowed_in_signatures`) are derived from the kind;
//! format specific output lives in the visitors of [`crate::output`].

use serde::{Deserialize, Serialize};

use crate::args::{MacroCall, ParserCall};
use crate::pagename::{get_title, normalize_pagename};

/// List styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListType {
    #[default]
    Unordered,
    Arabic,
    ArabicZero,
    AlphaLower,
    AlphaUpper,
    RomanLower,
    RomanUpper,
}

impl ListType {
    /// Determine the list type from a list item marker such as `*` or `a.`.
    pub fn from_marker(marker: &str) -> Self {
        match marker.trim().trim_end_matches('.') {
            "1" => Self::Arabic,
            "0" => Self::ArabicZero,
            "a" => Self::AlphaLower,
            "A" => Self::AlphaUpper,
            "i" => Self::RomanLower,
            "I" => Self::RomanUpper,
            _ => Self::Unordered,
        }
    }

    pub fn is_ordered(self) -> bool {
        self != Self::Unordered
    }

    /// CSS class used for ordered lists.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unordered => "unordered",
            Self::Arabic => "arabic",
            Self::ArabicZero => "arabiczero",
            Self::AlphaLower => "alphalower",
            Self::AlphaUpper => "alphaupper",
            Self::RomanLower => "romanlower",
            Self::RomanUpper => "romanupper",
        }
    }

    /// Inverse of [`ListType::as_str`].
    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::Unordered,
            Self::Arabic,
            Self::ArabicZero,
            Self::AlphaLower,
            Self::AlphaUpper,
            Self::RomanLower,
            Self::RomanUpper,
        ]
        .into_iter()
        .find(|list_type| list_type.as_str() == name)
    }

    /// The item marker used when writing markup.
    pub fn marker(self) -> &'static str {
        match self {
            Self::Unordered => "*",
            Self::Arabic => "1.",
            Self::ArabicZero => "0.",
            Self::AlphaLower => "a.",
            Self::AlphaUpper => "A.",
            Self::RomanLower => "i.",
            Self::RomanUpper => "I.",
        }
    }
}

/// Which part of a merge conflict a marker opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSide {
    Left,
    Middle,
    Right,
}

impl ConflictSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Middle => "middle",
            Self::Right => "right",
        }
    }
}

/// Spanning and alignment of a table cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAttrs {
    pub colspan: u32,
    pub rowspan: u32,
    pub align: Option<String>,
    pub valign: Option<String>,
}

impl Default for CellAttrs {
    fn default() -> Self {
        Self {
            colspan: 1,
            rowspan: 1,
            align: None,
            valign: None,
        }
    }
}

/// Node kinds with their kind specific data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    /// A transparent group of nodes.
    Container,
    Text(String),
    /// Raw HTML, dropped by every other output format.
    Html { html: String, block: bool },
    Section { level: u8 },
    Paragraph,
    Headline { level: u8 },
    Strong,
    Emphasized,
    Underline,
    Stroke,
    Code,
    Small,
    Big,
    Sub,
    Sup,
    Color { value: String },
    Size { size: f64 },
    Font { faces: Vec<String> },
    Span,
    Layer,
    Ruler,
    Newline,
    InternalLink {
        page: String,
        anchor: Option<String>,
        force_existing: bool,
    },
    InterWikiLink {
        wiki: String,
        page: String,
        anchor: Option<String>,
    },
    Link {
        url: String,
        title: Option<String>,
        shorten: bool,
    },
    SourceLink { target: u32 },
    Image { href: String, alt: String },
    Quote,
    Preformatted,
    List { list_type: ListType },
    ListItem,
    DefinitionList,
    DefinitionTerm { term: String },
    Table,
    TableRow,
    TableCell(CellAttrs),
    TableHeader(CellAttrs),
    TableHeadSection,
    TableBodySection,
    Footnote { number: Option<u32> },
    Box {
        title: Option<String>,
        align: Option<String>,
        valign: Option<String>,
    },
    Error,
    MetaData { key: String, values: Vec<String> },
    Macro(MacroCall),
    Parser(ParserCall),
    ConflictMarker(ConflictSide),
}

impl NodeKind {
    /// Block level nodes break paragraphs and are never nested in inline
    /// nodes.
    pub fn is_block_tag(&self) -> bool {
        match self {
            Self::Html { block, .. } => *block,
            Self::Macro(call) => call.block,
            Self::Section { .. }
            | Self::Paragraph
            | Self::Headline { .. }
            | Self::Ruler
            | Self::ConflictMarker(_)
            | Self::MetaData { .. }
            | Self::Error
            | Self::Quote
            | Self::Preformatted
            | Self::DefinitionList
            | Self::DefinitionTerm { .. }
            | Self::List { .. }
            | Self::ListItem
            | Self::Box { .. }
            | Self::Layer
            | Self::Table
            | Self::TableRow
            | Self::TableCell(_)
            | Self::TableHeader(_)
            | Self::TableHeadSection
            | Self::TableBodySection
            | Self::Parser(_) => true,
            _ => false,
        }
    }

    /// Children of raw nodes are never touched by transformers.
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Preformatted | Self::Code)
    }

    /// Containers that get automatic paragraphs.
    pub fn allows_paragraphs(&self) -> bool {
        matches!(
            self,
            Self::Document
                | Self::Error
                | Self::Quote
                | Self::DefinitionTerm { .. }
                | Self::ListItem
                | Self::Box { .. }
                | Self::Layer
        )
    }

    /// Nodes that may appear in user signatures.
    pub fn allowed_in_signatures(&self) -> bool {
        matches!(
            self,
            Self::Container
                | Self::Text(_)
                | Self::Newline
                | Self::Strong
                | Self::Emphasized
                | Self::Underline
                | Self::Stroke
                | Self::Code
                | Self::Small
                | Self::Big
                | Self::Sub
                | Self::Sup
                | Self::Color { .. }
                | Self::Size { .. }
                | Self::Font { .. }
                | Self::Span
                | Self::InternalLink { .. }
                | Self::InterWikiLink { .. }
                | Self::Link { .. }
        )
    }

    /// Dynamic nodes are rendered at output time.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Macro(_) | Self::Parser(_))
    }
}

/// Common HTML attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Attrs {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.class.is_none() && self.style.is_none()
    }
}

/// A node of the syntax tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
    /// Markup of the static macro or parser call the node was expanded
    /// from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            attrs: Attrs::default(),
            origin: None,
        }
    }

    pub fn with_children(kind: NodeKind, children: Vec<Node>) -> Self {
        Self {
            kind,
            children,
            attrs: Attrs::default(),
            origin: None,
        }
    }

    pub fn document(children: Vec<Node>) -> Self {
        Self::with_children(NodeKind::Document, children)
    }

    pub fn container(children: Vec<Node>) -> Self {
        Self::with_children(NodeKind::Container, children)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(NodeKind::Text(value.into()))
    }

    pub fn paragraph(children: Vec<Node>) -> Self {
        Self::with_children(NodeKind::Paragraph, children)
    }

    pub fn strong(children: Vec<Node>) -> Self {
        Self::with_children(NodeKind::Strong, children)
    }

    pub fn metadata(key: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(NodeKind::MetaData {
            key: key.into(),
            values,
        })
    }

    /// A link to a wiki page. Without children the page title is shown.
    pub fn internal_link(page: &str, children: Vec<Node>, anchor: Option<String>) -> Self {
        let page = normalize_pagename(page);
        let children = if children.is_empty() {
            vec![Node::text(get_title(&page, true))]
        } else {
            children
        };
        Self::with_children(
            NodeKind::InternalLink {
                page,
                anchor,
                force_existing: false,
            },
            children,
        )
    }

    /// A link to an arbitrary URL.
    pub fn link(url: impl Into<String>, children: Vec<Node>) -> Self {
        Self::with_children(
            NodeKind::Link {
                url: url.into(),
                title: None,
                shorten: false,
            },
            children,
        )
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.attrs.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.attrs.class = Some(class.into());
        self
    }

    #[must_use]
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.attrs.style = Some(style.into());
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn is_block_tag(&self) -> bool {
        self.kind.is_block_tag()
    }

    pub fn is_raw(&self) -> bool {
        self.kind.is_raw()
    }

    pub fn allows_paragraphs(&self) -> bool {
        self.kind.allows_paragraphs()
    }

    pub fn allowed_in_signatures(&self) -> bool {
        self.kind.allowed_in_signatures()
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    /// The value of a text node.
    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(value) => Some(value),
            _ => None,
        }
    }

    /// The plain text projection of the node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) {
        match &self.kind {
            NodeKind::Text(value) => out.push_str(value),
            NodeKind::Newline => out.push('\n'),
            NodeKind::Ruler => out.push('\n'),
            NodeKind::Image { alt, .. } => out.push_str(alt),
            NodeKind::MetaData { .. }
            | NodeKind::Macro(_)
            | NodeKind::ConflictMarker(_)
            | NodeKind::Html { .. } => {}
            NodeKind::Link { url, .. } if self.children.is_empty() => out.push_str(url),
            NodeKind::DefinitionTerm { term } => {
                out.push_str(term);
                out.push('\n');
                self.write_children_text(out);
                out.push('\n');
            }
            NodeKind::Paragraph => {
                self.write_children_text(out);
                out.push_str("\n\n");
            }
            kind => {
                self.write_children_text(out);
                if kind.is_block_tag() {
                    out.push('\n');
                }
            }
        }
    }

    fn write_children_text(&self, out: &mut String) {
        for child in &self.children {
            child.write_text(out);
        }
    }

    /// Iterate over this node and all descendants in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// All descendants (including this node) matching a predicate.
    pub fn query<'a, F>(&'a self, predicate: F) -> impl Iterator<Item = &'a Node>
    where
        F: Fn(&Node) -> bool + 'a,
    {
        self.descendants().filter(move |node| predicate(*node))
    }

    /// Returns `true` if any node in the tree matches.
    pub fn has_any<F>(&self, predicate: F) -> bool
    where
        F: Fn(&Node) -> bool,
    {
        self.descendants().any(|node| predicate(node))
    }

    /// Splice containers of static expansions into their parents, merging
    /// the text at the seams.
    pub fn splice_expansions(&mut self) {
        if !self.has_any(|node| node.origin.is_some() && matches!(node.kind, NodeKind::Container)) {
            return;
        }
        let children = std::mem::take(&mut self.children);
        let mut result: Vec<Node> = Vec::with_capacity(children.len());
        for mut child in children {
            child.splice_expansions();
            let spliced = if child.origin.is_some() && matches!(child.kind, NodeKind::Container) {
                child.children
            } else {
                vec![child]
            };
            for node in spliced {
                if let (Some(NodeKind::Text(last)), NodeKind::Text(text)) =
                    (result.last_mut().map(|last| &mut last.kind), &node.kind)
                {
                    last.push_str(text);
                } else {
                    result.push(node);
                }
            }
        }
        self.children = result;
    }

    /// Apply `f` to every node, parents before children.
    pub fn walk_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Node),
    {
        f(self);
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }
}

/// Pre-order iterator over a tree.
pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Create an error box with a bold title and a message paragraph.
pub fn error_box(title: &str, message: &str) -> Node {
    Node::with_children(
        NodeKind::Error,
        vec![
            Node::strong(vec![Node::text(title)]),
            Node::paragraph(vec![Node::text(message)]),
        ],
    )
}

/// Returns `true` if the tree contains conflict markers.
pub fn has_conflicts(tree: &Node) -> bool {
    tree.has_any(|node| matches!(node.kind, NodeKind::ConflictMarker(_)))
}

/// Turn text into an identifier usable as an HTML id.
///
/// ```
/// use inyoka_markup::nodes::slugify;
///
/// assert_eq!(slugify("Größe & Gewicht"), "groesse-gewicht");
/// assert_eq!(slugify("!!!"), "-");
/// ```
pub fn slugify(text: &str) -> String {
    fn replacement(c: char) -> Option<&'static str> {
        match c {
            'ß' => Some("ss"),
            'ä' | 'æ' => Some("ae"),
            'ð' => Some("dh"),
            'ö' => Some("oe"),
            'ü' => Some("ue"),
            'þ' => Some("th"),
            _ => None,
        }
    }

    let lower = text.trim().to_lowercase();
    let mut words = Vec::new();
    let mut word = String::new();
    for c in lower.chars() {
        if c.is_ascii_alphanumeric() {
            word.push(c);
        } else if let Some(replaced) = replacement(c) {
            word.push_str(replaced);
        } else if !word.is_empty() {
            words.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        words.push(word);
    }
    if words.is_empty() {
        "-".to_owned()
    } else {
        words.join("-")
    }
}
