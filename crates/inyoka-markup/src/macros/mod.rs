//! Macros: the `[[Name(arguments)]]` extension points of the markup.
//!
//! A macro is registered under a localized, case sensitive name and
//! identified internally by a stable [`Macro::id`]. There are three kinds:
//!
//! - **Static** macros expand while parsing. The result only depends on the
//!   arguments and the parse context.
//! - **Dynamic** macros leave a [`NodeKind::Macro`] sentinel in the tree that
//!   is expanded at render time by a [`RenderContext`](crate::RenderContext).
//!   They may emit metadata siblings so metadata extraction works without
//!   running them.
//! - **Tree** macros run on the whole document after a transformer
//!   [`Stage`].
//!
//! # Example
//!
//! ```
//! use inyoka_markup::macros::{Macro, MacroKind, MacroRegistry};
//! use inyoka_markup::{MacroCall, Node, Parser};
//!
//! struct Shout;
//!
//! impl Macro for Shout {
//!     fn id(&self) -> &'static str { "shout" }
//!
//!     fn kind(&self) -> MacroKind { MacroKind::Static }
//!
//!     fn expand(&self, call: &MacroCall, _parser: &mut Parser<'_>) -> Node {
//!         Node::text(call.arguments.positional.join(" ").to_uppercase())
//!     }
//! }
//!
//! let registry = MacroRegistry::default().with_macro("Laut", Shout);
//! assert!(registry.get("Laut").is_some());
//! ```

mod builtin;
mod dynamic;
mod toc;

use std::collections::HashMap;
use std::sync::Arc;

use crate::args::{ArgumentSpec, MacroCall};
use crate::nodes::{Node, NodeKind};
use crate::parser::{ParseContext, Parser};

pub use builtin::{Anchor, Key, NewPage, Newline, Picture, Template};
pub(crate) use builtin::{expand_page_template, template_context};
pub use dynamic::{DynamicMacro, Include};
pub use toc::TableOfContents;

/// When a tree macro runs relative to the transformers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Right after parsing, before any transformer.
    Initial,
    /// After automatic paragraphs.
    Late,
    /// After all transformers.
    Final,
}

/// How a macro is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    Static,
    Dynamic,
    Tree(Stage),
}

/// A markup macro.
///
/// Implementations must be stateless; one instance serves every document.
pub trait Macro: Send + Sync {
    /// Stable identifier, independent of the registered name.
    fn id(&self) -> &'static str;

    fn kind(&self) -> MacroKind;

    /// Argument schema. Ignored when [`Macro::has_argument_parser`] is set.
    fn arguments(&self) -> &'static [ArgumentSpec] {
        &[]
    }

    /// Whether the dynamic output is a block element.
    fn is_block_tag(&self) -> bool {
        false
    }

    /// Set to consume the raw positional and keyword arguments.
    fn has_argument_parser(&self) -> bool {
        false
    }

    /// Expand a static macro. A returned [`NodeKind::Container`] is spliced
    /// into the parent.
    fn expand(&self, _call: &MacroCall, _parser: &mut Parser<'_>) -> Node {
        Node::container(Vec::new())
    }

    /// Metadata nodes emitted next to a dynamic macro sentinel.
    fn metadata(&self, _call: &MacroCall, _context: &ParseContext<'_>) -> Vec<Node> {
        Vec::new()
    }

    /// The page a dynamic macro embeds, used for cycle detection.
    fn included_page(&self, _call: &MacroCall, _context: &ParseContext<'_>) -> Option<String> {
        None
    }

    /// Expand a tree macro with read access to the whole document.
    fn expand_tree(&self, _call: &MacroCall, _tree: &Node) -> Node {
        Node::container(Vec::new())
    }
}

/// Maps localized macro names to implementations.
#[derive(Clone)]
pub struct MacroRegistry {
    macros: HashMap<String, Arc<dyn Macro>>,
}

impl MacroRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            macros: HashMap::new(),
        }
    }

    /// Register a macro under a name, replacing any previous registration.
    #[must_use]
    pub fn with_macro<M: Macro + 'static>(mut self, name: impl Into<String>, handler: M) -> Self {
        self.register(name, Arc::new(handler));
        self
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn Macro>) {
        self.macros.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Macro>> {
        self.macros.get(name)
    }

    /// Look up a macro by its stable identifier.
    pub fn by_id(&self, id: &str) -> Option<&Arc<dyn Macro>> {
        self.macros.values().find(|handler| handler.id() == id)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Expand every tree macro sentinel of the given stage in place.
    pub fn run_tree_macros(&self, tree: &mut Node, stage: Stage) {
        let mut calls = Vec::new();
        collect_tree_calls(self, tree, stage, &mut calls);
        if calls.is_empty() {
            return;
        }
        let expansions: Vec<Node> = calls
            .iter()
            .map(|call| match self.by_id(&call.id) {
                Some(handler) => handler.expand_tree(call, tree),
                None => Node::container(Vec::new()),
            })
            .collect();
        let mut expansions = expansions.into_iter();
        replace_tree_calls(self, tree, stage, &mut expansions);
    }
}

impl Default for MacroRegistry {
    /// The built-in macros under their German names.
    fn default() -> Self {
        Self::new()
            .with_macro("LetzteÄnderungen", dynamic::RECENT_CHANGES)
            .with_macro("Inhaltsverzeichnis", TableOfContents)
            .with_macro("Seitenzahl", dynamic::PAGE_COUNT)
            .with_macro("Seitenliste", dynamic::PAGE_LIST)
            .with_macro("Anhänge", dynamic::ATTACHMENT_LIST)
            .with_macro("VerwaisteSeiten", dynamic::ORPHANED_PAGES)
            .with_macro("FehlendeSeiten", dynamic::MISSING_PAGES)
            .with_macro("Weiterleitungen", dynamic::REDIRECT_PAGES)
            .with_macro("Seitenname", dynamic::PAGE_NAME)
            .with_macro("ÄhnlicheSeiten", dynamic::SIMILAR_PAGES)
            .with_macro("TagWolke", dynamic::TAG_CLOUD)
            .with_macro("TagListe", dynamic::TAG_LIST)
            .with_macro("Einbinden", Include)
            .with_macro("Vorlage", Template)
            .with_macro("Bild", Picture)
            .with_macro("Datum", dynamic::DATE)
            .with_macro("NeueSeiten", dynamic::NEW_PAGES)
            .with_macro("BR", Newline)
            .with_macro("Anker", Anchor)
            .with_macro("NeueSeite", NewPage)
            .with_macro("Taste", Key)
    }
}

impl std::fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacroRegistry")
            .field("names", &self.names())
            .finish()
    }
}

fn is_tree_call(registry: &MacroRegistry, node: &Node, stage: Stage) -> bool {
    match &node.kind {
        NodeKind::Macro(call) => registry
            .by_id(&call.id)
            .is_some_and(|handler| handler.kind() == MacroKind::Tree(stage)),
        _ => false,
    }
}

fn collect_tree_calls(registry: &MacroRegistry, node: &Node, stage: Stage, out: &mut Vec<MacroCall>) {
    for descendant in node.descendants() {
        if is_tree_call(registry, descendant, stage) {
            if let NodeKind::Macro(call) = &descendant.kind {
                out.push(call.clone());
            }
        }
    }
}

/// Replace tree macro sentinels in document order, splicing containers.
fn replace_tree_calls(
    registry: &MacroRegistry,
    node: &mut Node,
    stage: Stage,
    expansions: &mut impl Iterator<Item = Node>,
) {
    let children = std::mem::take(&mut node.children);
    let mut result = Vec::with_capacity(children.len());
    for mut child in children {
        if is_tree_call(registry, &child, stage) {
            let expanded = expansions.next().unwrap_or_else(|| Node::container(Vec::new()));
            if matches!(expanded.kind, NodeKind::Container) {
                result.extend(expanded.children);
            } else {
                result.push(expanded);
            }
        } else {
            replace_tree_calls(registry, &mut child, stage, expansions);
            result.push(child);
        }
    }
    node.children = result;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Arguments;
    use pretty_assertions::assert_eq;

    struct Counter;

    impl Macro for Counter {
        fn id(&self) -> &'static str {
            "counter"
        }

        fn kind(&self) -> MacroKind {
            MacroKind::Tree(Stage::Final)
        }

        fn expand_tree(&self, _call: &MacroCall, tree: &Node) -> Node {
            let count = tree.descendants().filter(|node| node.is_text()).count();
            Node::text(count.to_string())
        }
    }

    fn call(id: &str) -> Node {
        Node::new(NodeKind::Macro(MacroCall {
            id: id.to_owned(),
            name: id.to_owned(),
            arguments: Arguments::default(),
            bound: Vec::new(),
            block: false,
        }))
    }

    #[test]
    fn test_default_registry_has_german_names() {
        let registry = MacroRegistry::default();
        for name in ["Inhaltsverzeichnis", "Einbinden", "Vorlage", "Bild", "Anker", "BR"] {
            assert!(registry.get(name).is_some(), "{name}");
        }
        assert!(registry.get("einbinden").is_none());
        assert_eq!(registry.by_id("include").map(|m| m.id()), Some("include"));
    }

    #[test]
    fn test_run_tree_macros_by_stage() {
        let registry = MacroRegistry::new().with_macro("Zähler", Counter);
        let mut tree = Node::document(vec![
            Node::text("a"),
            Node::paragraph(vec![call("counter"), Node::text("b")]),
        ]);

        registry.run_tree_macros(&mut tree, Stage::Initial);
        assert!(tree.has_any(|node| matches!(node.kind, NodeKind::Macro(_))));

        registry.run_tree_macros(&mut tree, Stage::Final);
        assert_eq!(
            tree,
            Node::document(vec![
                Node::text("a"),
                Node::paragraph(vec![Node::text("2"), Node::text("b")]),
            ])
        );
    }
}
