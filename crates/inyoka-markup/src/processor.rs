use crate::macros::MacroRegistry;
use crate::nodes::{Node, NodeKind};
use crate::parser::{ParseContext, Parser};
use crate::parsers::ParserRegistry;
use crate::transformers::{Pipeline, SmileyMap};

/// Parses and transforms markup with a fixed set of macros, parsers and
/// transformers.
pub struct MarkupProcessor {
    macros: MacroRegistry,
    parsers: ParserRegistry,
    pipeline: Pipeline,
    typography: bool,
    smilies: SmileyMap,
    template_base: Option<String>,
}

impl MarkupProcessor {
    /// The built-in macros and parsers with the standard pipeline.
    pub fn new() -> Self {
        Self {
            macros: MacroRegistry::default(),
            parsers: ParserRegistry::default(),
            pipeline: Pipeline::default(),
            typography: true,
            smilies: SmileyMap::default(),
            template_base: None,
        }
    }

    /// Toggle the typography transformer. Rebuilds the standard pipeline.
    #[must_use]
    pub fn with_typography(mut self, enabled: bool) -> Self {
        self.typography = enabled;
        self.pipeline = Pipeline::standard(self.typography, self.smilies.clone());
        self
    }

    /// Replace the smiley map. Rebuilds the standard pipeline.
    #[must_use]
    pub fn with_smilies(mut self, smilies: SmileyMap) -> Self {
        self.smilies = smilies;
        self.pipeline = Pipeline::standard(self.typography, self.smilies.clone());
        self
    }

    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    #[must_use]
    pub fn with_macros(mut self, macros: MacroRegistry) -> Self {
        self.macros = macros;
        self
    }

    #[must_use]
    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    /// Base page of the templates used by the Template macro.
    #[must_use]
    pub fn with_template_base(mut self, base: impl Into<String>) -> Self {
        self.template_base = Some(base.into());
        self
    }

    pub fn macros(&self) -> &MacroRegistry {
        &self.macros
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// A parse context for a page with the configured template base.
    pub fn context<'a>(&self, page: Option<&str>) -> ParseContext<'a> {
        let context = ParseContext::new(page);
        match &self.template_base {
            Some(base) => context.with_template_base(base.clone()),
            None => context,
        }
    }

    /// Parse and transform a source on the given page.
    pub fn process(&self, source: &str, page: Option<&str>) -> Node {
        self.process_in(source, self.context(page))
    }

    /// Parse and transform a source with an explicit context.
    pub fn process_in(&self, source: &str, context: ParseContext<'_>) -> Node {
        let mut tree = self.parse_in(source, context);
        self.pipeline.apply(&mut tree, &self.macros);
        tree
    }

    /// Parse without running the transformers.
    pub fn parse_in(&self, source: &str, context: ParseContext<'_>) -> Node {
        tracing::debug!(page = ?context.page_name, bytes = source.len(), "Parsing markup");
        Parser::new(&self.macros, &self.parsers, context).parse(source)
    }
}

impl Default for MarkupProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata of a document as `(key, value)` pairs in document order.
///
/// Besides the explicit metadata nodes every internal link contributes an
/// `X-Link` entry. Duplicate pairs are dropped.
pub fn collect_metadata(tree: &Node) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut push = |key: &str, value: &str| {
        if !pairs.iter().any(|(k, v)| k == key && v == value) {
            pairs.push((key.to_owned(), value.to_owned()));
        }
    };
    for node in tree.descendants() {
        match &node.kind {
            NodeKind::MetaData { key, values } => {
                for value in values {
                    push(key, value);
                }
            }
            NodeKind::InternalLink { page, .. } if !page.is_empty() => push("X-Link", page),
            _ => {}
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{Format, NullContext, compile, render};
    use pretty_assertions::assert_eq;

    fn html(source: &str, page: Option<&str>) -> String {
        let tree = MarkupProcessor::new().process(source, page);
        render(&compile(&tree, Format::Html, &NullContext), &NullContext)
    }

    #[test]
    fn test_heading_paragraph_list() {
        let tree = MarkupProcessor::new().process("= Intro =\n\nHello world.\n\n * a\n * b\n", None);
        let out = render(&compile(&tree, Format::Html, &NullContext), &NullContext).replace('\n', "");
        assert!(out.contains(r#"<h2 id="intro">Intro</h2>"#), "{out}");
        assert!(out.contains("<p>Hello world.</p>"), "{out}");
        assert!(out.contains("<ul><li>a</li><li>b</li></ul>"), "{out}");
        assert_eq!(collect_metadata(&tree), Vec::new());
    }

    #[test]
    fn test_internal_link_metadata() {
        let source = "See [:Other:the other]. And [:Other:again].";
        let tree = MarkupProcessor::new().process(source, Some("Start"));
        assert_eq!(collect_metadata(&tree), vec![("X-Link".to_owned(), "Other".to_owned())]);
        let out = html(source, Some("Start"));
        assert!(out.contains(r#"<a href="/Other" class="internal">the other</a>"#), "{out}");
    }

    #[test]
    fn test_relative_link_metadata_is_absolute() {
        let tree = MarkupProcessor::new().process("[:./Child:]", Some("Guide"));
        assert_eq!(
            collect_metadata(&tree),
            vec![("X-Link".to_owned(), "Guide/Child".to_owned())]
        );
    }

    #[test]
    fn test_redirect_page() {
        let source = "# X-Redirect: Target\n";
        let tree = MarkupProcessor::new().process(source, Some("Start"));
        assert_eq!(
            collect_metadata(&tree),
            vec![("X-Redirect".to_owned(), "Target".to_owned())]
        );
        assert_eq!(html(source, Some("Start")).trim(), "");
    }

    #[test]
    fn test_typography_can_be_disabled() {
        let plain = MarkupProcessor::new().with_typography(false);
        let tree = plain.process("\"quoted\"", None);
        assert_eq!(tree.text_content(), "\"quoted\"");
    }
}
