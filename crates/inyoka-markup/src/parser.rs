//! Builds a document tree from the token stream.
//!
//! Parsing never fails: malformed constructs degrade to text, unknown
//! macros to error boxes. Static macros and parsers are expanded on the
//! spot, dynamic ones leave sentinels (plus their metadata) in the tree.

use std::collections::HashSet;
use std::fmt;

use crate::args::{Arguments, MacroCall, ParserCall, bind_arguments, unquote_value};
use crate::lexer::{Scope, Token, TokenKind, TokenStream, tokenize};
use crate::macros::{MacroKind, MacroRegistry};
use crate::nodes::{Attrs, CellAttrs, ConflictSide, ListType, Node, NodeKind, error_box};
use crate::pagename::{normalize_pagename, resolve_target};
use crate::parsers::ParserRegistry;

/// Base page of the template macro and the `vorlage` parser.
pub const DEFAULT_TEMPLATE_BASE: &str = "Wiki/Vorlagen";

/// Read access to page sources while parsing, used by templates.
pub trait PageSource: Send + Sync {
    /// The current text of a page, `None` if it does not exist.
    fn page_text(&self, name: &str) -> Option<String>;
}

/// Per document parse state.
#[derive(Clone)]
pub struct ParseContext<'a> {
    /// The page being parsed. Relative link targets join with it.
    pub page_name: Option<String>,
    /// Pages already on the include chain.
    pub included_pages: HashSet<String>,
    pub template_base: String,
    pub pages: Option<&'a dyn PageSource>,
}

impl<'a> ParseContext<'a> {
    pub fn new(page_name: Option<&str>) -> Self {
        let page_name = page_name.map(normalize_pagename);
        Self {
            included_pages: page_name.iter().cloned().collect(),
            page_name,
            template_base: DEFAULT_TEMPLATE_BASE.to_owned(),
            pages: None,
        }
    }

    #[must_use]
    pub fn with_template_base(mut self, base: impl Into<String>) -> Self {
        self.template_base = base.into();
        self
    }

    #[must_use]
    pub fn with_pages(mut self, pages: &'a dyn PageSource) -> Self {
        self.pages = Some(pages);
        self
    }
}

impl fmt::Debug for ParseContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseContext")
            .field("page_name", &self.page_name)
            .field("included_pages", &self.included_pages)
            .field("template_base", &self.template_base)
            .field("pages", &self.pages.is_some())
            .finish()
    }
}

/// The markup parser.
pub struct Parser<'a> {
    macros: &'a MacroRegistry,
    parsers: &'a ParserRegistry,
    context: ParseContext<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(macros: &'a MacroRegistry, parsers: &'a ParserRegistry, context: ParseContext<'a>) -> Self {
        Self {
            macros,
            parsers,
            context,
        }
    }

    pub fn context(&self) -> &ParseContext<'a> {
        &self.context
    }

    pub fn into_context(self) -> ParseContext<'a> {
        self.context
    }

    /// Parse a source into a document.
    pub fn parse(&mut self, source: &str) -> Node {
        let mut stream = tokenize(source);
        let mut children = Vec::new();
        while !stream.is_eof() {
            self.parse_node(&mut stream, &mut children);
        }
        Node::document(children)
    }

    /// Parse the source of another page with that page on the include
    /// chain. Returns the document children.
    pub fn parse_included(&mut self, page: &str, source: &str) -> Vec<Node> {
        let added = self.context.included_pages.insert(page.to_owned());
        let document = self.parse(source);
        if added {
            self.context.included_pages.remove(page);
        }
        document.children
    }

    fn parse_node(&mut self, stream: &mut TokenStream, out: &mut Vec<Node>) {
        let token = stream.next_token();
        match token.kind {
            TokenKind::Text => push_text(out, &token.value),
            TokenKind::Newline => out.push(Node::new(NodeKind::Newline)),
            TokenKind::Ruler => out.push(Node::new(NodeKind::Ruler)),
            TokenKind::SourceLink => match token.value.trim().parse() {
                Ok(target) => out.push(Node::new(NodeKind::SourceLink { target })),
                Err(_) => push_text(out, &token.value),
            },
            TokenKind::FreeLink => out.push(Node::new(NodeKind::Link {
                url: token.value,
                title: None,
                shorten: true,
            })),
            TokenKind::ExternalLinkBegin => out.push(self.parse_bare_link(stream)),
            TokenKind::QuoteBegin => {
                let children = self.parse_until(stream, TokenKind::QuoteEnd);
                out.push(Node::with_children(NodeKind::Quote, children));
            }
            TokenKind::Begin(scope) => self.parse_scope(scope, &token, stream, out),
            TokenKind::Eof => {}
            _ => push_text(out, &token.value),
        }
    }

    /// Parse nodes up to and including the `end` token.
    fn parse_until(&mut self, stream: &mut TokenStream, end: TokenKind) -> Vec<Node> {
        let mut children = Vec::new();
        while !stream.is_eof() {
            if stream.skip_if(end) {
                break;
            }
            self.parse_node(stream, &mut children);
        }
        children
    }

    fn parse_scope(&mut self, scope: Scope, begin: &Token, stream: &mut TokenStream, out: &mut Vec<Node>) {
        let end = TokenKind::End(scope);
        match scope {
            Scope::Metadata => out.push(parse_metadata(stream)),
            Scope::Headline => {
                let level = begin.value.chars().filter(|c| *c == '=').count().clamp(1, 5);
                let children = trim_edges(self.parse_until(stream, end));
                let level = u8::try_from(level).unwrap_or(1);
                out.push(Node::with_children(NodeKind::Headline { level }, children));
            }
            Scope::Definition => out.push(self.parse_definitions(stream)),
            Scope::TableRow => out.push(self.parse_table(stream)),
            Scope::ListItem => out.push(self.parse_list(begin, stream)),
            Scope::Box => out.push(self.parse_box(stream)),
            Scope::Pre => self.parse_pre(stream, out),
            Scope::Conflict => self.parse_conflict(stream, out),
            Scope::Macro => self.parse_macro(stream, out),
            Scope::Code | Scope::EscapedCode => {
                let text = collect_raw(stream, end);
                out.push(Node::with_children(NodeKind::Code, vec![Node::text(text)]));
            }
            Scope::Color => {
                let value = take_value(stream, TokenKind::ColorValue);
                let children = self.parse_until(stream, end);
                out.push(Node::with_children(NodeKind::Color { value }, children));
            }
            Scope::Size => {
                let raw = take_value(stream, TokenKind::FontSize);
                let size = raw.trim().trim_end_matches('%').trim().parse().unwrap_or(100.0);
                let children = self.parse_until(stream, end);
                out.push(Node::with_children(NodeKind::Size { size }, children));
            }
            Scope::Font => {
                let raw = take_value(stream, TokenKind::FontFace);
                let faces = raw
                    .split(',')
                    .map(|face| face.trim().trim_matches(|c| c == '"' || c == '\'').to_owned())
                    .filter(|face| !face.is_empty())
                    .collect();
                let children = self.parse_until(stream, end);
                out.push(Node::with_children(NodeKind::Font { faces }, children));
            }
            Scope::WikiLink => out.push(self.parse_wiki_link(stream)),
            Scope::ExternalLink => {
                let url = take_value(stream, TokenKind::LinkTarget);
                let children = trim_edges(self.parse_until(stream, end));
                out.push(Node::link(url, children));
            }
            Scope::Strong
            | Scope::Emphasized
            | Scope::Underline
            | Scope::Stroke
            | Scope::Small
            | Scope::Big
            | Scope::Sub
            | Scope::Sup
            | Scope::Footnote => {
                let kind = match scope {
                    Scope::Strong => NodeKind::Strong,
                    Scope::Emphasized => NodeKind::Emphasized,
                    Scope::Underline => NodeKind::Underline,
                    Scope::Stroke => NodeKind::Stroke,
                    Scope::Small => NodeKind::Small,
                    Scope::Big => NodeKind::Big,
                    Scope::Sub => NodeKind::Sub,
                    Scope::Sup => NodeKind::Sup,
                    _ => NodeKind::Footnote { number: None },
                };
                let children = self.parse_until(stream, end);
                out.push(Node::with_children(kind, children));
            }
        }
    }

    fn parse_definitions(&mut self, stream: &mut TokenStream) -> Node {
        let mut terms = Vec::new();
        loop {
            let term = take_value(stream, TokenKind::DefinitionTerm).trim().to_owned();
            let children = trim_edges(self.parse_until(stream, TokenKind::End(Scope::Definition)));
            terms.push(Node::with_children(NodeKind::DefinitionTerm { term }, children));
            if !stream.skip_if(TokenKind::Begin(Scope::Definition)) {
                break;
            }
        }
        Node::with_children(NodeKind::DefinitionList, terms)
    }

    fn parse_table(&mut self, stream: &mut TokenStream) -> Node {
        let mut table_attrs = Attrs::default();
        let mut rows = Vec::new();
        loop {
            rows.push(self.parse_table_row(stream, &mut table_attrs));
            if !stream.skip_if(TokenKind::Begin(Scope::TableRow)) {
                break;
            }
        }
        let mut table = Node::with_children(NodeKind::Table, rows);
        table.attrs = table_attrs;
        table
    }

    fn parse_table_row(&mut self, stream: &mut TokenStream, table_attrs: &mut Attrs) -> Node {
        let mut row_attrs = Attrs::default();
        let mut cells = Vec::new();
        loop {
            let mut def = CellDef::default();
            if stream.skip_if(TokenKind::TableDefBegin) {
                let arguments = collect_arguments(stream, TokenKind::TableDefEnd);
                def.apply(&arguments, &mut row_attrs, table_attrs);
            }
            let mut children = Vec::new();
            while !stream.is_eof()
                && !matches!(
                    stream.current().kind,
                    TokenKind::TableColSwitch | TokenKind::End(Scope::TableRow)
                )
            {
                self.parse_node(stream, &mut children);
            }
            let kind = if def.header {
                NodeKind::TableHeader(def.cell)
            } else {
                NodeKind::TableCell(def.cell)
            };
            let mut cell = Node::with_children(kind, trim_edges(children));
            cell.attrs = def.attrs;
            cells.push(cell);
            if stream.next_token().kind != TokenKind::TableColSwitch {
                break;
            }
        }
        let mut row = Node::with_children(NodeKind::TableRow, cells);
        row.attrs = row_attrs;
        row
    }

    fn parse_list(&mut self, first: &Token, stream: &mut TokenStream) -> Node {
        let mut items = Vec::new();
        let mut marker = first.value.clone();
        loop {
            let indent = marker.chars().take_while(|c| c.is_whitespace()).count();
            let list_type = ListType::from_marker(marker.trim());
            let children = trim_edges(self.parse_until(stream, TokenKind::End(Scope::ListItem)));
            items.push((indent, list_type, Node::with_children(NodeKind::ListItem, children)));
            if stream.current().kind != TokenKind::Begin(Scope::ListItem) {
                break;
            }
            marker = stream.next_token().value;
        }
        nest_list_items(items)
    }

    fn parse_box(&mut self, stream: &mut TokenStream) -> Node {
        let mut attrs = Attrs::default();
        let (mut title, mut align, mut valign) = (None, None, None);
        if stream.skip_if(TokenKind::BoxDefBegin) {
            let arguments = collect_arguments(stream, TokenKind::BoxDefEnd);
            title = arguments
                .keyword("title")
                .map(str::to_owned)
                .or_else(|| arguments.positional.first().cloned());
            align = arguments.keyword("align").map(str::to_owned);
            valign = arguments.keyword("valign").map(str::to_owned);
            attrs.class = arguments.keyword("class").map(str::to_owned);
            attrs.style = arguments.keyword("style").map(str::to_owned);
        }
        let children = self.parse_until(stream, TokenKind::End(Scope::Box));
        let mut node = Node::with_children(NodeKind::Box { title, align, valign }, children);
        node.attrs = attrs;
        node
    }

    fn parse_pre(&mut self, stream: &mut TokenStream, out: &mut Vec<Node>) {
        let end = TokenKind::End(Scope::Pre);
        if stream.current().kind != TokenKind::ParserBegin {
            let data = strip_block_newlines(&collect_raw(stream, end));
            out.push(Node::with_children(NodeKind::Preformatted, vec![Node::text(data)]));
            return;
        }
        let name = stream.next_token().value;
        let arguments = collect_arguments(stream, TokenKind::ParserEnd);
        let data = strip_block_newlines(&collect_raw(stream, end));

        let Some(handler) = self.parsers.get(&name).cloned() else {
            tracing::debug!(parser = %name, "Unknown parser, rendering preformatted");
            out.push(Node::with_children(NodeKind::Preformatted, vec![Node::text(data)]));
            return;
        };
        let bound = if handler.has_argument_parser() {
            Vec::new()
        } else {
            bind_arguments(handler.arguments(), &arguments)
        };
        let call = ParserCall {
            id: handler.id().to_owned(),
            name,
            arguments,
            bound,
            data,
        };
        if handler.is_static() {
            let origin = call.wiki_representation();
            out.push(handler.build(&call, self).with_origin(origin));
        } else {
            out.push(Node::new(NodeKind::Parser(call)));
        }
    }

    fn parse_conflict(&mut self, stream: &mut TokenStream, out: &mut Vec<Node>) {
        out.push(Node::new(NodeKind::ConflictMarker(ConflictSide::Left)));
        while !stream.is_eof() {
            match stream.current().kind {
                TokenKind::ConflictSwitch => {
                    stream.next_token();
                    out.push(Node::new(NodeKind::ConflictMarker(ConflictSide::Middle)));
                }
                TokenKind::End(Scope::Conflict) => {
                    stream.next_token();
                    break;
                }
                _ => self.parse_node(stream, out),
            }
        }
        out.push(Node::new(NodeKind::ConflictMarker(ConflictSide::Right)));
    }

    fn parse_macro(&mut self, stream: &mut TokenStream, out: &mut Vec<Node>) {
        let name = take_value(stream, TokenKind::MacroName);
        let arguments = collect_arguments(stream, TokenKind::End(Scope::Macro));

        let Some(handler) = self.macros.get(&name).cloned() else {
            let argstring = arguments.to_source();
            tracing::debug!(name = %name, "Unknown macro");
            out.push(error_box(
                "Fehlendes Makro",
                &format!("Das Makro „{name}“ mit den Argumenten „{argstring}“ existiert nicht."),
            ));
            return;
        };
        let bound = if handler.has_argument_parser() {
            Vec::new()
        } else {
            bind_arguments(handler.arguments(), &arguments)
        };
        let call = MacroCall {
            id: handler.id().to_owned(),
            name,
            arguments,
            bound,
            block: handler.is_block_tag(),
        };

        match handler.kind() {
            MacroKind::Static => {
                let origin = call.wiki_representation();
                out.push(handler.expand(&call, self).with_origin(origin));
            }
            MacroKind::Dynamic => {
                if let Some(page) = handler.included_page(&call, &self.context)
                    && self.context.included_pages.contains(&page)
                {
                    out.push(error_box(
                        "Zirkulärer Import",
                        "Rekursiver Aufruf des Include Makros wurde erkannt.",
                    ));
                    return;
                }
                out.extend(handler.metadata(&call, &self.context));
                out.push(Node::new(NodeKind::Macro(call)));
            }
            MacroKind::Tree(_) => out.push(Node::new(NodeKind::Macro(call))),
        }
    }

    fn parse_wiki_link(&mut self, stream: &mut TokenStream) -> Node {
        let prefix = take_value(stream, TokenKind::InterwikiPrefix);
        let target = take_value(stream, TokenKind::LinkTarget);
        let children = trim_edges(self.parse_until(stream, TokenKind::End(Scope::WikiLink)));
        let (page, anchor) = match target.split_once('#') {
            Some((page, anchor)) => (page.to_owned(), Some(anchor.to_owned())),
            None => (target, None),
        };

        if !prefix.is_empty() {
            return Node::with_children(
                NodeKind::InterWikiLink {
                    wiki: prefix,
                    page,
                    anchor,
                },
                children,
            );
        }
        if page.is_empty() {
            let anchor = anchor.unwrap_or_default();
            let children = if children.is_empty() {
                vec![Node::text(anchor.clone())]
            } else {
                children
            };
            return Node::link(format!("#{anchor}"), children);
        }
        let page = resolve_target(self.context.page_name.as_deref(), &page);
        Node::internal_link(&page, children, anchor)
    }

    /// `[http://example.org]`: the target is also the caption.
    fn parse_bare_link(&mut self, stream: &mut TokenStream) -> Node {
        let url = take_value(stream, TokenKind::LinkTarget);
        stream.skip_if(TokenKind::ExternalLinkEnd);
        Node::link(url, Vec::new())
    }
}

impl fmt::Debug for Parser<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser").field("context", &self.context).finish()
    }
}

/// Table cell definition collected from a `<...>` prefix.
#[derive(Default)]
struct CellDef {
    cell: CellAttrs,
    attrs: Attrs,
    header: bool,
}

impl CellDef {
    /// Positional flags: `-N` colspan, `|N` rowspan, `(` `:` `)` horizontal
    /// and `^` `v` vertical alignment, `header`. Keywords set the cell, row
    /// and table attributes.
    fn apply(&mut self, arguments: &Arguments, row: &mut Attrs, table: &mut Attrs) {
        for flag in arguments.positional.iter().flat_map(|value| value.split_whitespace()) {
            if flag == "header" {
                self.header = true;
                continue;
            }
            let mut chars = flag.chars().peekable();
            while let Some(c) = chars.next() {
                match c {
                    '-' | '|' => {
                        let mut digits = String::new();
                        while let Some(d) = chars.next_if(char::is_ascii_digit) {
                            digits.push(d);
                        }
                        if let Ok(span) = digits.parse::<u32>() {
                            if c == '-' {
                                self.cell.colspan = span.max(1);
                            } else {
                                self.cell.rowspan = span.max(1);
                            }
                        }
                    }
                    '(' => self.cell.align = Some("left".to_owned()),
                    ':' => self.cell.align = Some("center".to_owned()),
                    ')' => self.cell.align = Some("right".to_owned()),
                    '^' => self.cell.valign = Some("top".to_owned()),
                    'v' => self.cell.valign = Some("bottom".to_owned()),
                    _ => {}
                }
            }
        }
        for (key, value) in &arguments.keyword {
            let value = Some(value.clone());
            match key.as_str() {
                "id" => self.attrs.id = value,
                "class" | "cellclass" => self.attrs.class = value,
                "style" | "cellstyle" => self.attrs.style = value,
                "rowclass" => row.class = value,
                "rowstyle" => row.style = value,
                "tableclass" => table.class = value,
                "tablestyle" => table.style = value,
                _ => {}
            }
        }
    }
}

/// Build nested lists from `(indent, type, item)` triples.
fn nest_list_items(items: Vec<(usize, ListType, Node)>) -> Node {
    let mut stack: Vec<(usize, ListType, Vec<Node>)> = Vec::new();
    for (indent, list_type, item) in items {
        while stack.len() > 1 && stack.last().is_some_and(|top| indent < top.0) {
            close_list(&mut stack);
        }
        match stack.last_mut() {
            Some(top) if indent <= top.0 => top.2.push(item),
            _ => stack.push((indent, list_type, vec![item])),
        }
    }
    while stack.len() > 1 {
        close_list(&mut stack);
    }
    let (_, list_type, items) = stack.pop().unwrap_or_default();
    Node::with_children(NodeKind::List { list_type }, items)
}

fn close_list(stack: &mut Vec<(usize, ListType, Vec<Node>)>) {
    let Some((_, list_type, items)) = stack.pop() else {
        return;
    };
    let list = Node::with_children(NodeKind::List { list_type }, items);
    if let Some((_, _, parent)) = stack.last_mut() {
        match parent.last_mut() {
            Some(item) => item.children.push(list),
            None => parent.push(Node::with_children(NodeKind::ListItem, vec![list])),
        }
    }
}

fn parse_metadata(stream: &mut TokenStream) -> Node {
    let key = take_value(stream, TokenKind::MetadataKey);
    let mut values = Vec::new();
    let mut current = String::new();
    while !stream.is_eof() {
        let token = stream.next_token();
        match token.kind {
            TokenKind::End(Scope::Metadata) => break,
            TokenKind::FuncArgumentDelimiter => flush_value(&mut values, &mut current),
            TokenKind::FuncStringArg => current.push_str(&unquote_value(&token.value)),
            _ => current.push_str(&token.value),
        }
    }
    flush_value(&mut values, &mut current);
    Node::metadata(key, values)
}

fn flush_value(values: &mut Vec<String>, current: &mut String) {
    let value = current.trim();
    if !value.is_empty() {
        values.push(value.to_owned());
    }
    current.clear();
}

/// Collect function call style arguments up to and including `end`.
///
/// Consecutive bare words are joined with a space.
fn collect_arguments(stream: &mut TokenStream, end: TokenKind) -> Arguments {
    let mut arguments = Arguments::default();
    let mut buffer: Vec<String> = Vec::new();
    let mut keyword: Option<String> = None;

    let flush = |arguments: &mut Arguments, buffer: &mut Vec<String>, keyword: &mut Option<String>| {
        if buffer.is_empty() && keyword.is_none() {
            return;
        }
        let value = buffer.join(" ");
        buffer.clear();
        match keyword.take() {
            Some(key) => arguments.keyword.push((key, value)),
            None => arguments.positional.push(value),
        }
    };

    while !stream.is_eof() {
        let token = stream.next_token();
        match token.kind {
            kind if kind == end => break,
            TokenKind::FuncArgumentDelimiter => flush(&mut arguments, &mut buffer, &mut keyword),
            TokenKind::FuncKwarg => {
                flush(&mut arguments, &mut buffer, &mut keyword);
                keyword = Some(token.value);
            }
            TokenKind::FuncStringArg => buffer.push(unquote_value(&token.value)),
            _ => {
                let value = token.value.trim();
                if !value.is_empty() {
                    buffer.push(value.to_owned());
                }
            }
        }
    }
    flush(&mut arguments, &mut buffer, &mut keyword);
    arguments
}

/// Concatenate token values up to and including `end`.
fn collect_raw(stream: &mut TokenStream, end: TokenKind) -> String {
    let mut text = String::new();
    while !stream.is_eof() {
        let token = stream.next_token();
        if token.kind == end {
            break;
        }
        text.push_str(&token.value);
    }
    text
}

/// The value of the current token if it has the given kind.
fn take_value(stream: &mut TokenStream, kind: TokenKind) -> String {
    if stream.current().kind == kind {
        stream.next_token().value
    } else {
        String::new()
    }
}

fn strip_block_newlines(data: &str) -> String {
    let data = data.strip_prefix('\n').unwrap_or(data);
    data.strip_suffix('\n').unwrap_or(data).to_owned()
}

fn push_text(out: &mut Vec<Node>, value: &str) {
    if value.is_empty() {
        return;
    }
    if let Some(NodeKind::Text(last)) = out.last_mut().map(|node| &mut node.kind) {
        last.push_str(value);
    } else {
        out.push(Node::text(value));
    }
}

/// Strip leading and trailing whitespace of the outer text nodes.
fn trim_edges(mut children: Vec<Node>) -> Vec<Node> {
    if let Some(NodeKind::Text(text)) = children.first_mut().map(|node| &mut node.kind) {
        *text = text.trim_start().to_owned();
    }
    if let Some(NodeKind::Text(text)) = children.last_mut().map(|node| &mut node.kind) {
        *text = text.trim_end().to_owned();
    }
    children.retain(|node| node.as_text() != Some(""));
    children
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_on(page: Option<&str>, source: &str) -> Node {
        let macros = MacroRegistry::default();
        let parsers = ParserRegistry::default();
        Parser::new(&macros, &parsers, ParseContext::new(page)).parse(source)
    }

    fn parse(source: &str) -> Node {
        parse_on(Some("Start"), source)
    }

    fn kind(kind: NodeKind, children: Vec<Node>) -> Node {
        Node::with_children(kind, children)
    }

    #[test]
    fn test_inline_formatting() {
        assert_eq!(
            parse("'''a''' ''b'' __c__").children,
            vec![
                Node::strong(vec![Node::text("a")]),
                Node::text(" "),
                kind(NodeKind::Emphasized, vec![Node::text("b")]),
                Node::text(" "),
                kind(NodeKind::Underline, vec![Node::text("c")]),
            ]
        );
    }

    #[test]
    fn test_headline_level() {
        assert_eq!(
            parse("=== Title ===").children,
            vec![kind(NodeKind::Headline { level: 3 }, vec![Node::text("Title")])]
        );
    }

    #[test]
    fn test_internal_link() {
        assert_eq!(
            parse("See [:Other:the other].").children,
            vec![
                Node::text("See "),
                Node::internal_link("Other", vec![Node::text("the other")], None),
                Node::text("."),
            ]
        );
    }

    #[test]
    fn test_relative_link_with_anchor() {
        let tree = parse_on(Some("Guide"), "[:./Intro#setup:]");
        assert_eq!(
            tree.children,
            vec![Node::internal_link("Guide/Intro", Vec::new(), Some("setup".to_owned()))]
        );
    }

    #[test]
    fn test_interwiki_link() {
        assert_eq!(
            parse("[wikipedia:Rust:]").children,
            vec![Node::new(NodeKind::InterWikiLink {
                wiki: "wikipedia".to_owned(),
                page: "Rust".to_owned(),
                anchor: None,
            })]
        );
    }

    #[test]
    fn test_external_and_free_links() {
        assert_eq!(
            parse("[http://example.org Example] http://a.org").children,
            vec![
                Node::link("http://example.org", vec![Node::text("Example")]),
                Node::text(" "),
                Node::new(NodeKind::Link {
                    url: "http://a.org".to_owned(),
                    title: None,
                    shorten: true,
                }),
            ]
        );
    }

    #[test]
    fn test_metadata() {
        assert_eq!(
            parse("# tag: a, b\n").children,
            vec![Node::metadata("tag", vec!["a".to_owned(), "b".to_owned()])]
        );
    }

    #[test]
    fn test_nested_list() {
        let tree = parse(" * a\n   * b\n * c\n");
        let unordered = |items| {
            kind(
                NodeKind::List {
                    list_type: ListType::Unordered,
                },
                items,
            )
        };
        assert_eq!(
            tree.children,
            vec![unordered(vec![
                kind(
                    NodeKind::ListItem,
                    vec![Node::text("a"), unordered(vec![kind(NodeKind::ListItem, vec![Node::text("b")])])]
                ),
                kind(NodeKind::ListItem, vec![Node::text("c")]),
            ])]
        );
    }

    #[test]
    fn test_ordered_list() {
        let tree = parse(" 1. a\n 1. b\n");
        assert_eq!(
            tree.children[0].kind,
            NodeKind::List {
                list_type: ListType::Arabic
            }
        );
        assert_eq!(tree.children[0].children.len(), 2);
    }

    #[test]
    fn test_table_with_cell_definitions() {
        let tree = parse("||<-2 : rowclass=head> a ||\n|| b || c ||\n");
        let table = &tree.children[0];
        assert_eq!(table.kind, NodeKind::Table);
        assert_eq!(table.children.len(), 2);
        assert_eq!(table.children[0].attrs.class.as_deref(), Some("head"));
        assert_eq!(
            table.children[0].children[0].kind,
            NodeKind::TableCell(CellAttrs {
                colspan: 2,
                rowspan: 1,
                align: Some("center".to_owned()),
                valign: None,
            })
        );
        assert_eq!(table.children[0].children[0].children, vec![Node::text("a")]);
        assert_eq!(table.children[1].children.len(), 2);
    }

    #[test]
    fn test_box_title() {
        let tree = parse("{{|<title=\"Hinweis\">\nInhalt\n|}}");
        let NodeKind::Box { title, .. } = &tree.children[0].kind else {
            panic!("expected a box, got {:?}", tree.children);
        };
        assert_eq!(title.as_deref(), Some("Hinweis"));
    }

    #[test]
    fn test_preformatted() {
        assert_eq!(
            parse("{{{\n'''raw'''\n}}}").children,
            vec![kind(NodeKind::Preformatted, vec![Node::text("'''raw'''")])]
        );
    }

    #[test]
    fn test_unknown_macro_is_error_box() {
        let tree = parse("[[Gibtsnicht(a, b=c)]]");
        assert_eq!(tree.children[0].kind, NodeKind::Error);
        let text = tree.text_content();
        assert!(text.contains("Gibtsnicht"), "{text}");
        assert!(text.contains("a, b=c"), "{text}");
    }

    #[test]
    fn test_dynamic_macro_leaves_sentinel_and_metadata() {
        let tree = parse_on(Some("Guide"), "[[Einbinden(\"./Intro\")]]");
        assert_eq!(
            tree.children[0],
            Node::metadata("X-Attach", vec!["Guide/Intro".to_owned()])
        );
        let NodeKind::Macro(call) = &tree.children[1].kind else {
            panic!("expected a macro sentinel");
        };
        assert_eq!(call.id, "include");
        assert_eq!(call.str_arg("page"), "./Intro");
        assert!(call.block);
    }

    #[test]
    fn test_self_include_is_cycle() {
        let tree = parse_on(Some("Guide"), "[[Einbinden(Guide)]]");
        assert!(tree.text_content().contains("Zirkulärer Import"));
    }

    #[test]
    fn test_macro_arguments_join_bare_words() {
        let tree = parse("[[Seitenliste(Wiki Seiten/*, case_sensitive=nein)]]");
        let NodeKind::Macro(call) = &tree.children[0].kind else {
            panic!("expected a macro sentinel");
        };
        assert_eq!(call.str_arg("pattern"), "Wiki Seiten/*");
        assert!(!call.bool_arg("case_sensitive"));
    }

    #[test]
    fn test_conflict_markers() {
        let source = format!("{}\nleft\n{}\nright\n{}\n", "<".repeat(40), "=".repeat(40), ">".repeat(40));
        let markers: Vec<ConflictSide> = parse(&source)
            .descendants()
            .filter_map(|node| match node.kind {
                NodeKind::ConflictMarker(side) => Some(side),
                _ => None,
            })
            .collect();
        assert_eq!(
            markers,
            vec![ConflictSide::Left, ConflictSide::Middle, ConflictSide::Right]
        );
    }

    #[test]
    fn test_quote() {
        let tree = parse("> zitat\ntext");
        assert_eq!(
            tree.children,
            vec![
                kind(NodeKind::Quote, vec![Node::text("zitat")]),
                Node::text("text"),
            ]
        );
    }

    #[test]
    fn test_definition_list() {
        let tree = parse("  Begriff:: Erklärung\n  Zweiter:: Noch eine\n");
        assert_eq!(tree.children[0].kind, NodeKind::DefinitionList);
        assert_eq!(
            tree.children[0].children[1],
            kind(
                NodeKind::DefinitionTerm {
                    term: "Zweiter".to_owned()
                },
                vec![Node::text("Noch eine")]
            )
        );
    }

    #[test]
    fn test_malformed_input_never_panics() {
        for source in ["'''", "[[", "[:", "{{{", "||<", "{{|<", "[color=red]x", "((", "= x", ")]]"] {
            let _ = parse(source);
        }
    }
}
