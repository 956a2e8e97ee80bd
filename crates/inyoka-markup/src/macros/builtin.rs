//! Static built-in macros.

use std::fmt::Write;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};

use super::{Macro, MacroKind};
use crate::args::{ArgumentSpec, MacroCall};
use crate::nodes::{Node, NodeKind, error_box};
use crate::output::escape_html;
use crate::pagename::{is_external_target, normalize_pagename, pagename_join, resolve_target};
use crate::parser::Parser;
use crate::templates::{TemplateContext, Value};

/// Expand a page under the template base with the processor.
///
/// `[[Vorlage(Name, a, b, key=value)]]` exposes `$arguments` (the positional
/// arguments after the name) and every keyword argument.
#[derive(Debug, Clone, Copy)]
pub struct Template;

impl Macro for Template {
    fn id(&self) -> &'static str {
        "template"
    }

    fn kind(&self) -> MacroKind {
        MacroKind::Static
    }

    fn has_argument_parser(&self) -> bool {
        true
    }

    fn expand(&self, call: &MacroCall, parser: &mut Parser<'_>) -> Node {
        let Some((name, rest)) = call.arguments.positional.split_first() else {
            return error_box(
                "Parameterfehler",
                "Das erste Argument muss der Name des Templates sein.",
            );
        };
        let context = template_context(rest, &call.arguments.keyword);
        expand_page_template(parser, name, &context)
    }
}

/// Build the processor context of a template invocation.
pub(crate) fn template_context(positional: &[String], keyword: &[(String, String)]) -> TemplateContext {
    let mut context = TemplateContext::new();
    context.insert(
        "arguments",
        Value::List(positional.iter().cloned().map(Value::Str).collect()),
    );
    for (key, value) in keyword {
        context.insert(key.clone(), Value::Str(value.clone()));
    }
    context
}

/// Load, expand and parse a template page. Shared by the macro and the
/// `vorlage` parser.
pub(crate) fn expand_page_template(parser: &mut Parser<'_>, name: &str, context: &TemplateContext) -> Node {
    let template = pagename_join(&parser.context().template_base, name);
    if parser.context().included_pages.contains(&template) {
        return error_box(
            "Zirkulärer Import",
            "Rekursiver Aufruf der Vorlage wurde erkannt.",
        );
    }
    let Some(source) = parser.context().pages.and_then(|pages| pages.page_text(&template)) else {
        return error_box(
            "Fehlende Vorlage",
            "Das gewünschte Template existiert nicht.",
        );
    };
    let expanded = match crate::templates::process(&source, context) {
        Ok(expanded) => expanded,
        Err(e) => {
            tracing::debug!(template = %template, error = %e, "Template expansion failed");
            return error_box("Fehler in der Vorlage", &e.to_string());
        }
    };
    let mut children = parser.parse_included(&template, &expanded);
    children.push(Node::metadata("X-Attach", vec![template]));
    Node::container(children)
}

const PICTURE_ARGUMENTS: &[ArgumentSpec] = &[
    ArgumentSpec::string("picture", ""),
    ArgumentSpec::string("size", ""),
    ArgumentSpec::string("align", ""),
    ArgumentSpec::string("alt", ""),
];

/// Show an external image or an attachment thumbnail.
#[derive(Debug, Clone, Copy)]
pub struct Picture;

impl Picture {
    fn dimensions(size: &str) -> (Option<u32>, Option<u32>) {
        let (width, height) = size.split_once('x').unwrap_or((size, ""));
        (width.trim().parse().ok(), height.trim().parse().ok())
    }
}

impl Macro for Picture {
    fn id(&self) -> &'static str {
        "picture"
    }

    fn kind(&self) -> MacroKind {
        MacroKind::Static
    }

    fn arguments(&self) -> &'static [ArgumentSpec] {
        PICTURE_ARGUMENTS
    }

    fn expand(&self, call: &MacroCall, parser: &mut Parser<'_>) -> Node {
        let target = call.str_arg("picture");
        let (width, height) = Self::dimensions(call.str_arg("size"));
        let align = match call.str_arg("align") {
            align @ ("left" | "right" | "center") => align,
            _ => "default",
        };
        let alt = match call.str_arg("alt") {
            "" => target,
            alt => alt,
        };

        if is_external_target(target) {
            let mut style = String::new();
            if let Some(width) = width {
                write!(style, "width: {width}px;").unwrap();
            }
            if let Some(height) = height {
                write!(style, "height: {height}px;").unwrap();
            }
            let mut image = Node::new(NodeKind::Image {
                href: target.to_owned(),
                alt: alt.to_owned(),
            })
            .with_class(format!("image-{align}"));
            if !style.is_empty() {
                image = image.with_style(style);
            }
            return image;
        }

        let page = resolve_target(parser.context().page_name.as_deref(), target);
        let mut href = format!(
            "/_image?target={}",
            utf8_percent_encode(&page, NON_ALPHANUMERIC)
        );
        if let Some(width) = width {
            write!(href, "&width={width}").unwrap();
        }
        if let Some(height) = height {
            write!(href, "&height={height}").unwrap();
        }
        let image = Node::new(NodeKind::Image {
            href,
            alt: alt.to_owned(),
        })
        .with_class(format!("image-{align}"));
        Node::container(vec![image, Node::metadata("X-Attach", vec![page])])
    }
}

/// Force a line break.
#[derive(Debug, Clone, Copy)]
pub struct Newline;

impl Macro for Newline {
    fn id(&self) -> &'static str {
        "newline"
    }

    fn kind(&self) -> MacroKind {
        MacroKind::Static
    }

    fn expand(&self, _call: &MacroCall, _parser: &mut Parser<'_>) -> Node {
        Node::new(NodeKind::Newline)
    }
}

const ANCHOR_ARGUMENTS: &[ArgumentSpec] = &[ArgumentSpec::optional("id")];

/// An empty span that can be targeted by URL fragments.
#[derive(Debug, Clone, Copy)]
pub struct Anchor;

impl Macro for Anchor {
    fn id(&self) -> &'static str {
        "anchor"
    }

    fn kind(&self) -> MacroKind {
        MacroKind::Static
    }

    fn arguments(&self) -> &'static [ArgumentSpec] {
        ANCHOR_ARGUMENTS
    }

    fn expand(&self, call: &MacroCall, _parser: &mut Parser<'_>) -> Node {
        let span = Node::new(NodeKind::Span);
        match call.arg("id").as_str() {
            Some(id) if !id.is_empty() => span.with_id(id),
            _ => span,
        }
    }
}

const NEW_PAGE_ARGUMENTS: &[ArgumentSpec] = &[
    ArgumentSpec::string("base", ""),
    ArgumentSpec::string("template", ""),
    ArgumentSpec::string("text", ""),
];

/// A small form creating a page below `base`, optionally from a template.
#[derive(Debug, Clone, Copy)]
pub struct NewPage;

impl Macro for NewPage {
    fn id(&self) -> &'static str {
        "new_page"
    }

    fn kind(&self) -> MacroKind {
        MacroKind::Static
    }

    fn arguments(&self) -> &'static [ArgumentSpec] {
        NEW_PAGE_ARGUMENTS
    }

    fn is_block_tag(&self) -> bool {
        true
    }

    fn expand(&self, call: &MacroCall, _parser: &mut Parser<'_>) -> Node {
        let base = normalize_pagename(call.str_arg("base"));
        let template = call.str_arg("template");
        let label = match call.str_arg("text") {
            "" => "Seite anlegen",
            text => text,
        };
        let mut html = String::from(r#"<form action="/?action=create" method="post" class="new_page"><p>"#);
        write!(
            html,
            r#"<input type="hidden" name="base" value="{}"><input type="hidden" name="template" value="{}">"#,
            escape_html(&base),
            escape_html(template)
        )
        .unwrap();
        write!(
            html,
            r#"<input type="text" name="page" class="textfield"> <input type="submit" value="{}"></p></form>"#,
            escape_html(label)
        )
        .unwrap();
        Node::new(NodeKind::Html { html, block: true })
    }
}

/// Keyboard keys: `[[Taste(strg, alt, entf)]]`.
#[derive(Debug, Clone, Copy)]
pub struct Key;

impl Key {
    fn label(key: &str) -> String {
        let label = match key.to_lowercase().as_str() {
            "strg" | "ctrl" => "Strg",
            "alt" => "Alt",
            "altgr" => "Alt Gr",
            "shift" | "umschalt" => "⇧",
            "enter" | "return" | "eingabe" => "⏎",
            "tab" => "⇆",
            "space" | "leer" | "leertaste" => "Leertaste",
            "esc" => "Esc",
            "entf" | "del" => "Entf",
            "backspace" | "rück" => "⌫",
            "up" | "hoch" => "↑",
            "down" | "runter" => "↓",
            "left" | "links" => "←",
            "right" | "rechts" => "→",
            "win" | "super" => "Super",
            _ => {
                return if key.chars().count() == 1 {
                    key.to_uppercase()
                } else {
                    key.to_owned()
                };
            }
        };
        label.to_owned()
    }
}

impl Macro for Key {
    fn id(&self) -> &'static str {
        "key"
    }

    fn kind(&self) -> MacroKind {
        MacroKind::Static
    }

    fn has_argument_parser(&self) -> bool {
        true
    }

    fn expand(&self, call: &MacroCall, _parser: &mut Parser<'_>) -> Node {
        let mut children = Vec::new();
        for key in call.arguments.positional.iter().filter(|key| !key.trim().is_empty()) {
            if !children.is_empty() {
                children.push(Node::text(" + "));
            }
            children.push(
                Node::with_children(NodeKind::Span, vec![Node::text(Self::label(key.trim()))])
                    .with_class("key"),
            );
        }
        Node::container(children)
    }
}
