//! Tree rewriters run between parsing and compiling.
//!
//! # Pipeline
//!
//! The standard [`Pipeline`] runs, in order:
//!
//! 1. tree macros of [`Stage::Initial`]
//! 2. [`AutomaticParagraphs`]
//! 3. tree macros of [`Stage::Late`]
//! 4. [`GermanTypography`] (optional)
//! 5. [`SmileyInjector`]
//! 6. [`FootnoteSupport`]
//! 7. [`HeadlineIds`]
//! 8. [`AutomaticStructure`]
//! 9. [`KeyGroups`]
//! 10. tree macros of [`Stage::Final`]
//!
//! Every transformer leaves raw nodes alone, and running the pipeline on
//! its own output does not change the tree.

mod footnotes;
mod headlines;
mod keygroups;
mod paragraphs;
mod smilies;
mod typography;

use crate::macros::{MacroRegistry, Stage};
use crate::nodes::Node;

pub use footnotes::FootnoteSupport;
pub use headlines::{AutomaticStructure, HeadlineIds};
pub use keygroups::KeyGroups;
pub use paragraphs::AutomaticParagraphs;
pub use smilies::{SmileyInjector, SmileyMap};
pub use typography::GermanTypography;

/// A tree rewriter. The outermost node is always the document.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;

    fn transform(&self, tree: &mut Node);
}

/// Ordered transformers around the tree macro stages.
pub struct Pipeline {
    /// Run between the initial and late tree macros.
    early: Vec<Box<dyn Transformer>>,
    /// Run between the late and final tree macros.
    late: Vec<Box<dyn Transformer>>,
}

impl Pipeline {
    /// A pipeline without transformers; only tree macros run.
    pub fn new() -> Self {
        Self {
            early: Vec::new(),
            late: Vec::new(),
        }
    }

    /// The standard pipeline.
    pub fn standard(typography: bool, smilies: SmileyMap) -> Self {
        let pipeline = Self::new().with_early(AutomaticParagraphs);
        let pipeline = if typography {
            pipeline.with_late(GermanTypography)
        } else {
            pipeline
        };
        pipeline
            .with_late(SmileyInjector::new(smilies))
            .with_late(FootnoteSupport)
            .with_late(HeadlineIds)
            .with_late(AutomaticStructure)
            .with_late(KeyGroups)
    }

    #[must_use]
    pub fn with_early<T: Transformer + 'static>(mut self, transformer: T) -> Self {
        self.early.push(Box::new(transformer));
        self
    }

    #[must_use]
    pub fn with_late<T: Transformer + 'static>(mut self, transformer: T) -> Self {
        self.late.push(Box::new(transformer));
        self
    }

    /// Names of the transformers in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.early.iter().chain(&self.late).map(|t| t.name()).collect()
    }

    /// Run transformers and tree macros on a parsed document.
    pub fn apply(&self, tree: &mut Node, macros: &MacroRegistry) {
        tree.splice_expansions();
        macros.run_tree_macros(tree, Stage::Initial);
        for transformer in &self.early {
            transformer.transform(tree);
        }
        macros.run_tree_macros(tree, Stage::Late);
        for transformer in &self.late {
            transformer.transform(tree);
        }
        macros.run_tree_macros(tree, Stage::Final);
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard(true, SmileyMap::default())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("transformers", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseContext, Parser};
    use crate::parsers::ParserRegistry;
    use crate::nodes::NodeKind;
    use pretty_assertions::assert_eq;

    fn transformed(source: &str) -> Node {
        let macros = MacroRegistry::default();
        let parsers = ParserRegistry::default();
        let mut tree = Parser::new(&macros, &parsers, ParseContext::new(Some("Start"))).parse(source);
        let smilies = SmileyMap::new([(":-)", "/smilies/smile.png")]);
        Pipeline::standard(true, smilies).apply(&mut tree, &macros);
        tree
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(
            Pipeline::default().names(),
            vec![
                "paragraphs",
                "typography",
                "smilies",
                "footnotes",
                "headline_ids",
                "structure",
                "key_groups",
            ]
        );
    }

    #[test]
    fn test_expansions_are_spliced_before_transforming() {
        let tree = transformed("Drücke [[Taste(strg, c)]] jetzt");
        assert!(!tree.has_any(|node| matches!(node.kind, NodeKind::Container)));
        let paragraph = Node::paragraph(vec![
            Node::text("Drücke "),
            Node::with_children(NodeKind::Span, vec![Node::text("Strg")]).with_class("key"),
            Node::text(" + "),
            Node::with_children(NodeKind::Span, vec![Node::text("C")]).with_class("key"),
            Node::text(" jetzt"),
        ]);
        assert_eq!(tree.children, vec![paragraph]);
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let sources = [
            "= Intro =\n\nHello \"world\"... :-)\n\n * a\n * b\n",
            "[[Inhaltsverzeichnis]]\n= A =\ntext((note one))\n== B ==\n''more''((two))\n= A =\n",
            "> quoted\n> more\n\n||<header> x || y ||\n|| 1 || 2 ||\n",
            "[[Taste(ctrl)]] + [[Taste(c)]]\n\n{{{\nraw \"text\"\n}}}\n",
            "{{|<title=\"Box\">\nfirst\n\nsecond\n|}}\n  Term:: definition\n",
        ];
        let macros = MacroRegistry::default();
        let pipeline = Pipeline::standard(true, SmileyMap::new([(":-)", "/smilies/smile.png")]));
        for source in sources {
            let once = transformed(source);
            let mut twice = once.clone();
            pipeline.apply(&mut twice, &macros);
            assert_eq!(twice, once, "{source}");
        }
    }
}
