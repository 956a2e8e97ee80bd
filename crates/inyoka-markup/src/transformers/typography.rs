use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::Transformer;
use crate::nodes::{Node, NodeKind};

static RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{3,}|-{2,}").unwrap());

/// Substitutions in application order. The first group (if any) is kept in
/// front of the replacement, the second behind it.
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r#"(\d)""#, "″"),
        (r"(\d)'", "′"),
        (r"\+-", "±"),
        (r"\(c\)", "©"),
        (r"\(R\)", "®"),
        (r"\(TM\)", "™"),
        (r"(\d\s+)x(\s+\d)", "×"),
        (r"(^|\s)'", "‚"),
        (r"(\S)'", "‘"),
        (r#"(^|\s)""#, "„"),
        (r#"(\S)""#, "“"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
    .collect()
});

/// German typography: quotes, ellipses, dashes and a few symbols.
#[derive(Debug, Clone, Copy)]
pub struct GermanTypography;

impl Transformer for GermanTypography {
    fn name(&self) -> &'static str {
        "typography"
    }

    fn transform(&self, tree: &mut Node) {
        transform_node(tree);
    }
}

fn transform_node(node: &mut Node) {
    if node.is_raw() {
        return;
    }
    for child in &mut node.children {
        if let NodeKind::Text(text) = &mut child.kind {
            *text = apply_rules(text);
        } else {
            transform_node(child);
        }
    }
}

/// Apply all typography rules to a piece of text.
pub(crate) fn apply_rules(text: &str) -> String {
    let mut text = RUNS
        .replace_all(text, |caps: &Captures<'_>| {
            let run = &caps[0];
            match run {
                "..." => "…".to_owned(),
                "--" => "–".to_owned(),
                "---" => "—".to_owned(),
                _ => run.to_owned(),
            }
        })
        .into_owned();
    for (regex, replacement) in RULES.iter() {
        if !regex.is_match(&text) {
            continue;
        }
        text = regex
            .replace_all(&text, |caps: &Captures<'_>| {
                let before = caps.get(1).map_or("", |m| m.as_str());
                let after = caps.get(2).map_or("", |m| m.as_str());
                format!("{before}{replacement}{after}")
            })
            .into_owned();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quotes() {
        assert_eq!(apply_rules(r#"Er sagte "Hallo" und 'tschüss'"#), "Er sagte „Hallo“ und ‚tschüss‘");
    }

    #[test]
    fn test_dots_and_dashes() {
        assert_eq!(apply_rules("Warte... a -- b --- c ---- d ...."), "Warte… a – b — c ---- d ....");
    }

    #[test]
    fn test_symbols() {
        assert_eq!(apply_rules("(c) (R) (TM) +-5"), "© ® ™ ±5");
        assert_eq!(apply_rules("3 x 4, 5\" and 6'"), "3 × 4, 5″ and 6′");
    }

    #[test]
    fn test_raw_nodes_are_skipped() {
        let mut tree = Node::document(vec![
            Node::with_children(NodeKind::Code, vec![Node::text("\"x\"")]),
            Node::paragraph(vec![Node::text("\"x\"")]),
        ]);
        GermanTypography.transform(&mut tree);
        assert_eq!(tree.children[0].children[0], Node::text("\"x\""));
        assert_eq!(tree.children[1].children[0], Node::text("„x“"));
    }
}
