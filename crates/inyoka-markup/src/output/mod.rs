//! Output formats.
//!
//! Every format except raw markup and the AST dump is a [`Visitor`] that
//! walks the tree and writes into an [`Emitter`]. Static output is collected
//! as text while dynamic nodes become placeholders, which is what makes a
//! compiled [`Stream`](crate::Stream) cacheable.

mod docbook;
mod highlight;
mod html;
mod markup;
mod text;

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::nodes::Node;
use crate::stream::{Instruction, LinkResolver};

pub(crate) use docbook::DocBookWriter;
pub(crate) use html::HtmlWriter;
pub use markup::generate_markup;
pub(crate) use text::TextWriter;

/// Escape text for HTML and XML output.
///
/// ```
/// use inyoka_markup::output::escape_html;
///
/// assert_eq!(escape_html(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Collects instructions while a tree is compiled.
///
/// Adjacent text is merged so a fully static tree compiles to a single
/// text instruction.
pub(crate) struct Emitter<'a> {
    instructions: Vec<Instruction>,
    resolver: &'a dyn LinkResolver,
}

impl<'a> Emitter<'a> {
    pub(crate) fn new(resolver: &'a dyn LinkResolver) -> Self {
        Self {
            instructions: Vec::new(),
            resolver,
        }
    }

    pub(crate) fn resolver(&self) -> &'a dyn LinkResolver {
        self.resolver
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Instruction::Text(last)) = self.instructions.last_mut() {
            last.push_str(text);
        } else {
            self.instructions.push(Instruction::Text(text.to_owned()));
        }
    }

    /// Escape and write text.
    pub(crate) fn text(&mut self, text: &str) {
        self.push_str(&escape_html(text));
    }

    pub(crate) fn placeholder(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    pub(crate) fn finish(self) -> Vec<Instruction> {
        self.instructions
    }
}

impl fmt::Write for Emitter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

/// Format specific rendering, keyed by node kind.
pub(crate) trait Visitor {
    fn node(&mut self, node: &Node, out: &mut Emitter<'_>);

    fn children(&mut self, node: &Node, out: &mut Emitter<'_>) {
        for child in &node.children {
            self.node(child, out);
        }
    }
}

const PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.');

const FRAGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Quote a page name for use in a URL path.
pub fn encode_path(page: &str) -> String {
    utf8_percent_encode(page, PATH).to_string()
}

/// Quote an anchor for use as a URL fragment.
pub(crate) fn encode_anchor(anchor: &str) -> String {
    utf8_percent_encode(anchor, FRAGMENT).to_string()
}

/// Host part of an absolute URL.
pub(crate) fn link_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?.split(':').next()?;
    (!host.is_empty()).then_some(host)
}
