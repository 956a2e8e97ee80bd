//! Declarations of the dynamic built-in macros.
//!
//! Only the schema lives here. The output depends on the page store and is
//! produced by the host's render context, keyed by [`Macro::id`].

use super::{Macro, MacroKind};
use crate::args::{ArgumentSpec, MacroCall};
use crate::nodes::Node;
use crate::pagename::resolve_target;
use crate::parser::ParseContext;

/// A dynamic macro that only declares its arguments.
#[derive(Debug, Clone, Copy)]
pub struct DynamicMacro {
    pub id: &'static str,
    pub arguments: &'static [ArgumentSpec],
    pub block: bool,
}

impl Macro for DynamicMacro {
    fn id(&self) -> &'static str {
        self.id
    }

    fn kind(&self) -> MacroKind {
        MacroKind::Dynamic
    }

    fn arguments(&self) -> &'static [ArgumentSpec] {
        self.arguments
    }

    fn is_block_tag(&self) -> bool {
        self.block
    }
}

pub(super) const RECENT_CHANGES: DynamicMacro = DynamicMacro {
    id: "recent_changes",
    arguments: &[ArgumentSpec::int("per_page", 50)],
    block: true,
};

pub(super) const PAGE_COUNT: DynamicMacro = DynamicMacro {
    id: "page_count",
    arguments: &[],
    block: false,
};

pub(super) const PAGE_LIST: DynamicMacro = DynamicMacro {
    id: "page_list",
    arguments: &[
        ArgumentSpec::string("pattern", ""),
        ArgumentSpec::boolean("case_sensitive", true),
        ArgumentSpec::boolean("shorten_title", false),
    ],
    block: true,
};

pub(super) const ATTACHMENT_LIST: DynamicMacro = DynamicMacro {
    id: "attachment_list",
    arguments: &[ArgumentSpec::string("page", "")],
    block: true,
};

pub(super) const ORPHANED_PAGES: DynamicMacro = DynamicMacro {
    id: "orphaned_pages",
    arguments: &[],
    block: true,
};

pub(super) const MISSING_PAGES: DynamicMacro = DynamicMacro {
    id: "missing_pages",
    arguments: &[],
    block: true,
};

pub(super) const REDIRECT_PAGES: DynamicMacro = DynamicMacro {
    id: "redirect_pages",
    arguments: &[],
    block: true,
};

pub(super) const PAGE_NAME: DynamicMacro = DynamicMacro {
    id: "page_name",
    arguments: &[],
    block: false,
};

pub(super) const SIMILAR_PAGES: DynamicMacro = DynamicMacro {
    id: "similar_pages",
    arguments: &[ArgumentSpec::string("page", "")],
    block: true,
};

pub(super) const TAG_CLOUD: DynamicMacro = DynamicMacro {
    id: "tag_cloud",
    arguments: &[ArgumentSpec::int("max", 100)],
    block: true,
};

pub(super) const TAG_LIST: DynamicMacro = DynamicMacro {
    id: "tag_list",
    arguments: &[ArgumentSpec::string("tag", "")],
    block: true,
};

pub(super) const DATE: DynamicMacro = DynamicMacro {
    id: "date",
    arguments: &[ArgumentSpec::optional("date")],
    block: false,
};

pub(super) const NEW_PAGES: DynamicMacro = DynamicMacro {
    id: "new_pages",
    arguments: &[ArgumentSpec::int("months", 3)],
    block: true,
};

const INCLUDE_ARGUMENTS: &[ArgumentSpec] = &[
    ArgumentSpec::string("page", ""),
    ArgumentSpec::boolean("silent", false),
];

/// Includes another page at render time.
///
/// The target is recorded as `X-Attach` metadata, resolved against the page
/// being parsed.
#[derive(Debug, Clone, Copy)]
pub struct Include;

impl Macro for Include {
    fn id(&self) -> &'static str {
        "include"
    }

    fn kind(&self) -> MacroKind {
        MacroKind::Dynamic
    }

    fn arguments(&self) -> &'static [ArgumentSpec] {
        INCLUDE_ARGUMENTS
    }

    fn is_block_tag(&self) -> bool {
        true
    }

    fn metadata(&self, call: &MacroCall, context: &ParseContext<'_>) -> Vec<Node> {
        self.included_page(call, context)
            .map(|target| vec![Node::metadata("X-Attach", vec![target])])
            .unwrap_or_default()
    }

    fn included_page(&self, call: &MacroCall, context: &ParseContext<'_>) -> Option<String> {
        let page = call.str_arg("page");
        if page.is_empty() {
            return None;
        }
        Some(resolve_target(context.page_name.as_deref(), page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{Arguments, bind_arguments};
    use pretty_assertions::assert_eq;

    fn include_call(page: &str) -> MacroCall {
        let arguments = Arguments {
            positional: vec![page.to_owned()],
            keyword: Vec::new(),
        };
        MacroCall {
            id: "include".to_owned(),
            name: "Einbinden".to_owned(),
            bound: bind_arguments(Include.arguments(), &arguments),
            arguments,
            block: true,
        }
    }

    #[test]
    fn test_include_metadata_is_relative_to_parsed_page() {
        let context = ParseContext::new(Some("Guide"));
        assert_eq!(
            Include.metadata(&include_call("./Intro"), &context),
            vec![Node::metadata("X-Attach", vec!["Guide/Intro".to_owned()])]
        );
        assert_eq!(
            Include.metadata(&include_call("/Other Page"), &context),
            vec![Node::metadata("X-Attach", vec!["Other_Page".to_owned()])]
        );
    }

    #[test]
    fn test_include_without_page_has_no_metadata() {
        let context = ParseContext::new(None);
        assert!(Include.metadata(&include_call(""), &context).is_empty());
    }
}
