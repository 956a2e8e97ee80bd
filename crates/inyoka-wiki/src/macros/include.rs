use inyoka_markup::nodes::error_box;
use inyoka_markup::{MacroCall, Node, NodeKind, get_title, resolve_target};
use inyoka_storage::StorageError;

use super::MacroResult;
use crate::context::WikiContext;

const INCLUDE_ID: &str = "include";

/// The parsed text of another page.
///
/// Includes inside the embedded page are expanded right away, so every
/// page on the include chain is known while its content is built.
pub(super) fn include(context: &WikiContext<'_>, call: &MacroCall) -> MacroResult {
    let target = call.str_arg("page");
    if target.is_empty() {
        return Ok(error_box("Parameterfehler", "Es wurde keine Seite angegeben."));
    }
    let name = resolve_target(context.page(), target);
    if !context.enter_include(&name) {
        tracing::warn!(page = %name, "Include cycle");
        return Ok(error_box(
            "Zirkulärer Import",
            "Rekursiver Aufruf des Include Makros wurde erkannt.",
        ));
    }
    let result = embed(context, &name, call.bool_arg("silent"));
    context.leave_include(&name);
    result
}

fn embed(context: &WikiContext<'_>, name: &str, silent: bool) -> MacroResult {
    let Some(page) = context.store().get_by_name(name, false)? else {
        if silent {
            return Ok(Node::text(""));
        }
        return Ok(error_box(
            "Seite nicht gefunden",
            &format!("Die Seite „{}“ wurde nicht gefunden.", get_title(name, true)),
        ));
    };
    let mut children = context.parse_page(&page.name, &page.text).children;
    inline_includes(context, &mut children)?;
    Ok(Node::container(children))
}

fn inline_includes(context: &WikiContext<'_>, nodes: &mut [Node]) -> Result<(), StorageError> {
    for node in nodes {
        match &node.kind {
            NodeKind::Macro(call) if call.id == INCLUDE_ID => {
                let call = call.clone();
                *node = include(context, &call)?;
            }
            _ => inline_includes(context, &mut node.children)?,
        }
    }
    Ok(())
}
