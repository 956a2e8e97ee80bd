//! Wiki markup engine: lexer, parser, tree transformers and output.
//!
//! Source text goes through four steps:
//!
//! 1. [`lexer`] splits it into tokens, scope by scope.
//! 2. [`Parser`] builds a [`Node`] tree. Static macros and parsers expand
//!    here, dynamic ones stay as sentinels.
//! 3. The [`transformers::Pipeline`] inserts paragraphs, footnotes,
//!    headline ids and sections.
//! 4. [`compile`] writes the tree in one [`Format`] into a cacheable
//!    [`Stream`], which [`render`] replays with a live [`RenderContext`].
//!
//! [`MarkupProcessor`] bundles steps 1 to 3.
//!
//! # Example
//!
//! ```
//! use inyoka_markup::{Format, MarkupProcessor, NullContext, collect_metadata, compile, render};
//!
//! let processor = MarkupProcessor::new();
//! let tree = processor.process("See [:Other:the other].", Some("Start"));
//! let html = render(&compile(&tree, Format::Html, &NullContext), &NullContext);
//!
//! assert!(html.contains("the other</a>"));
//! assert_eq!(collect_metadata(&tree), vec![("X-Link".to_owned(), "Other".to_owned())]);
//! ```

pub mod args;
pub mod lexer;
pub mod macros;
pub mod nodes;
pub mod output;
mod pagename;
pub mod parser;
pub mod parsers;
mod processor;
mod stream;
pub mod templates;
pub mod transformers;

pub use args::{ArgValue, Arguments, MacroCall, ParserCall};
pub use macros::MacroRegistry;
pub use nodes::{ListType, Node, NodeKind};
pub use pagename::{
    PagePattern, get_title, is_external_target, normalize_keep_markers, normalize_pagename, pagename_join,
    resolve_target,
};
pub use parser::{PageSource, ParseContext, Parser};
pub use parsers::ParserRegistry;
pub use processor::{MarkupProcessor, collect_metadata};
pub use stream::{Format, Instruction, LinkResolver, NullContext, RenderContext, Stream, UnknownFormat, compile, render};
