//! Parser blocks: `{{{#!name arguments` ... `}}}`.
//!
//! A block parser turns the raw body of a preformatted region into a
//! subtree. Unknown names fall back to preformatted text.

mod csv;

use std::collections::HashMap;
use std::sync::Arc;

use crate::args::{ArgumentSpec, ParserCall};
use crate::macros::{expand_page_template, template_context};
use crate::nodes::{Node, NodeKind};
use crate::parser::Parser;

pub use csv::CsvParser;

/// A block parser.
pub trait BlockParser: Send + Sync {
    /// Stable identifier, independent of the registered name.
    fn id(&self) -> &'static str;

    fn arguments(&self) -> &'static [ArgumentSpec] {
        &[]
    }

    /// Set to consume the raw positional and keyword arguments.
    fn has_argument_parser(&self) -> bool {
        false
    }

    /// Static parsers build their node while parsing; others leave a
    /// sentinel for the render context.
    fn is_static(&self) -> bool {
        true
    }

    fn build(&self, call: &ParserCall, parser: &mut Parser<'_>) -> Node;
}

/// Maps parser names to implementations.
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn BlockParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_parser<P: BlockParser + 'static>(mut self, name: impl Into<String>, handler: P) -> Self {
        self.parsers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn BlockParser>> {
        self.parsers.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
            .with_parser("code", CodeParser)
            .with_parser("csv", CsvParser)
            .with_parser("vorlage", TemplateParser)
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("names", &self.names())
            .finish()
    }
}

const CODE_ARGUMENTS: &[ArgumentSpec] = &[ArgumentSpec::string("syntax", "text")];

/// Source code block, tagged with its language. The HTML writer
/// highlights languages it knows.
#[derive(Debug, Clone, Copy)]
pub struct CodeParser;

impl BlockParser for CodeParser {
    fn id(&self) -> &'static str {
        "code"
    }

    fn arguments(&self) -> &'static [ArgumentSpec] {
        CODE_ARGUMENTS
    }

    fn build(&self, call: &ParserCall, _parser: &mut Parser<'_>) -> Node {
        let syntax = match call.str_arg("syntax") {
            "" => "text",
            syntax => syntax,
        };
        let pre = Node::with_children(NodeKind::Preformatted, vec![Node::text(call.data.clone())])
            .with_class(format!("syntax-{}", syntax.to_lowercase()));
        Node::with_children(NodeKind::Layer, vec![pre]).with_class("code")
    }
}

/// Works like the template macro; the body is the last positional
/// argument.
///
/// ```text
/// {{{#!vorlage Hinweis
/// Hello World
/// }}}
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TemplateParser;

impl BlockParser for TemplateParser {
    fn id(&self) -> &'static str {
        "template"
    }

    fn has_argument_parser(&self) -> bool {
        true
    }

    fn build(&self, call: &ParserCall, parser: &mut Parser<'_>) -> Node {
        let Some((name, rest)) = call.arguments.positional.split_first() else {
            return crate::nodes::error_box(
                "Parameterfehler",
                "Das erste Argument muss der Name des Templates sein.",
            );
        };
        let mut positional = rest.to_vec();
        positional.push(call.data.clone());
        let context = template_context(&positional, &call.arguments.keyword);
        expand_page_template(parser, name, &context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{PageSource, ParseContext};
    use crate::MacroRegistry;
    use pretty_assertions::assert_eq;

    struct OnePage;

    impl PageSource for OnePage {
        fn page_text(&self, name: &str) -> Option<String> {
            (name == "Wiki/Vorlagen/Box").then(|| "[<@ $arguments.0 @>]".to_owned())
        }
    }

    fn parse(source: &str) -> Node {
        let macros = MacroRegistry::default();
        let parsers = ParserRegistry::default();
        let mut context = ParseContext::new(Some("Start"));
        context.pages = Some(&OnePage);
        Parser::new(&macros, &parsers, context).parse(source)
    }

    #[test]
    fn test_code_block() {
        let tree = parse("{{{#!code Rust\nfn main() {}\n}}}");
        let pre = Node::with_children(NodeKind::Preformatted, vec![Node::text("fn main() {}")])
            .with_class("syntax-rust");
        assert_eq!(
            tree.children,
            vec![
                Node::with_children(NodeKind::Layer, vec![pre])
                    .with_class("code")
                    .with_origin("{{{#!code Rust\nfn main() {}\n}}}")
            ]
        );
    }

    #[test]
    fn test_unknown_parser_is_preformatted() {
        let tree = parse("{{{#!nope\nraw ''text''\n}}}");
        assert_eq!(
            tree.children,
            vec![Node::with_children(
                NodeKind::Preformatted,
                vec![Node::text("raw ''text''")]
            )]
        );
    }

    #[test]
    fn test_template_parser_passes_body() {
        let tree = parse("{{{#!vorlage Box\nInhalt\n}}}");
        assert_eq!(tree.text_content(), "[Inhalt]");
    }
}
