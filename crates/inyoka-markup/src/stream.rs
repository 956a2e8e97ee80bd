//! Compiled instruction streams.
//!
//! [`compile`] turns a transformed tree into a [`Stream`]: static output as
//! text, dynamic macros and parsers as serializable placeholders. The host
//! caches streams and replays them with [`render`] and a live
//! [`RenderContext`].
//!
//! ```
//! use inyoka_markup::{Format, MarkupProcessor, NullContext, compile, render};
//!
//! let tree = MarkupProcessor::new().process("'''bold'''", None);
//! let stream = compile(&tree, Format::Html, &NullContext);
//! assert!(stream.is_static());
//! assert_eq!(render(&stream, &NullContext), "<p><strong>bold</strong></p>");
//! ```

use std::fmt::{self, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::args::{MacroCall, ParserCall};
use crate::nodes::{Node, NodeKind};
use crate::output::{
    DocBookWriter, Emitter, HtmlWriter, TextWriter, Visitor, encode_anchor, encode_path, escape_html,
    generate_markup,
};

/// Dynamic output embedding more dynamic output stops at this depth.
const MAX_NESTING: usize = 16;

/// Output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Html,
    DocBook,
    /// Markup regenerated from the tree.
    Raw,
    Text,
    /// The tree as JSON, for debugging.
    Ast,
}

impl Format {
    pub const ALL: [Format; 5] = [Self::Html, Self::DocBook, Self::Raw, Self::Text, Self::Ast];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::DocBook => "docbook",
            Self::Raw => "raw",
            Self::Text => "text",
            Self::Ast => "ast",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for format names that are not known.
#[derive(Debug, thiserror::Error)]
#[error("unknown output format `{0}`")]
pub struct UnknownFormat(pub String);

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| UnknownFormat(s.to_owned()))
    }
}

/// One element of a compiled stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    /// Output written as is.
    Text(String),
    Macro(MacroCall),
    Parser(ParserCall),
    /// Opens an interwiki link; the prefix is resolved when rendering.
    InterWikiBegin {
        wiki: String,
        page: String,
        anchor: Option<String>,
    },
    InterWikiEnd,
}

/// A compiled tree for one format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub format: Format,
    pub instructions: Vec<Instruction>,
}

impl Stream {
    /// A static stream renders the same in every context.
    pub fn is_static(&self) -> bool {
        self.instructions
            .iter()
            .all(|instruction| matches!(instruction, Instruction::Text(_)))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

/// Answers the link questions that come up while compiling.
///
/// The defaults treat every page as existing and know no interwiki
/// prefixes.
pub trait LinkResolver {
    fn page_exists(&self, _page: &str) -> bool {
        true
    }

    /// URL of a wiki page.
    fn page_url(&self, page: &str) -> String {
        format!("/{}", encode_path(page))
    }

    /// URL of a page in another wiki, `None` for unknown prefixes.
    fn interwiki_url(&self, _wiki: &str, _page: &str) -> Option<String> {
        None
    }

    /// Whether links to this host stay on the site.
    fn is_local_host(&self, _host: &str) -> bool {
        false
    }
}

/// The live context used to replay a stream.
pub trait RenderContext: LinkResolver {
    /// Expand a dynamic macro. The result is compiled and rendered in the
    /// format of the stream.
    fn expand_macro(&self, _call: &MacroCall, _format: Format) -> Node {
        Node::container(Vec::new())
    }

    /// Expand a parser that is not static. Defaults to preformatted text.
    fn expand_parser(&self, call: &ParserCall, _format: Format) -> Node {
        Node::with_children(NodeKind::Preformatted, vec![Node::text(call.data.clone())])
    }
}

/// A context without a wiki behind it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullContext;

impl LinkResolver for NullContext {}

impl RenderContext for NullContext {}

/// Compile a tree into a stream for the given format.
pub fn compile(tree: &Node, format: Format, resolver: &dyn LinkResolver) -> Stream {
    let mut out = Emitter::new(resolver);
    match format {
        Format::Html => HtmlWriter.node(tree, &mut out),
        Format::DocBook => DocBookWriter.node(tree, &mut out),
        Format::Text => TextWriter.node(tree, &mut out),
        Format::Raw => out.push_str(&generate_markup(tree)),
        Format::Ast => out.push_str(&serde_json::to_string_pretty(tree).unwrap_or_default()),
    }
    Stream {
        format,
        instructions: out.finish(),
    }
}

/// Replay a stream, expanding placeholders through the context.
pub fn render(stream: &Stream, context: &dyn RenderContext) -> String {
    let mut out = String::new();
    render_into(stream, context, &mut out, 0);
    out
}

fn render_into(stream: &Stream, context: &dyn RenderContext, out: &mut String, depth: usize) {
    let docbook = stream.format == Format::DocBook;
    let mut open_links: Vec<bool> = Vec::new();
    for instruction in &stream.instructions {
        match instruction {
            Instruction::Text(text) => out.push_str(text),
            Instruction::Macro(call) => {
                if depth >= MAX_NESTING {
                    tracing::warn!(name = %call.name, "dynamic output nested too deeply");
                    continue;
                }
                let node = context.expand_macro(call, stream.format);
                render_node(&node, stream.format, context, out, depth);
            }
            Instruction::Parser(call) => {
                if depth >= MAX_NESTING {
                    tracing::warn!(name = %call.name, "dynamic output nested too deeply");
                    continue;
                }
                let node = context.expand_parser(call, stream.format);
                render_node(&node, stream.format, context, out, depth);
            }
            Instruction::InterWikiBegin { wiki, page, anchor } => {
                let Some(mut url) = context.interwiki_url(wiki, page) else {
                    open_links.push(false);
                    continue;
                };
                if let Some(anchor) = anchor {
                    url.push('#');
                    url.push_str(&encode_anchor(anchor));
                }
                if docbook {
                    write!(out, r#"<ulink url="{}">"#, escape_html(&url)).unwrap();
                } else {
                    write!(
                        out,
                        r#"<a href="{}" class="interwiki interwiki-{}">"#,
                        escape_html(&url),
                        escape_html(wiki)
                    )
                    .unwrap();
                }
                open_links.push(true);
            }
            Instruction::InterWikiEnd => {
                if open_links.pop().unwrap_or(false) {
                    out.push_str(if docbook { "</ulink>" } else { "</a>" });
                }
            }
        }
    }
}

fn render_node(node: &Node, format: Format, context: &dyn RenderContext, out: &mut String, depth: usize) {
    let stream = compile(node, format, context);
    render_into(&stream, context, out, depth + 1);
}
