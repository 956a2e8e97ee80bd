//! Unified and structured two-way diffs.

use std::fmt::Write;

use inyoka_markup::output::escape_html;
use serde::Serialize;

use super::matcher::{Opcode, SequenceMatcher, Tag};

/// Context lines around each change.
pub const CONTEXT_LINES: usize = 4;

/// Unified diff of two texts with the given file titles.
///
/// ```
/// let udiff = inyoka_diff::unified_diff("a\nb\n", "a\nc\n", "Page (old)", "Page (new)", 4);
/// assert_eq!(udiff, "--- Page (old)\n+++ Page (new)\n@@ -1,2 +1,2 @@\n a\n-b\n+c");
/// ```
pub fn unified_diff(old: &str, new: &str, old_title: &str, new_title: &str, context: usize) -> String {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let groups = SequenceMatcher::new(&old_lines, &new_lines).grouped_opcodes(context);
    if groups.is_empty() {
        return String::new();
    }

    let mut out = format!("--- {old_title}\n+++ {new_title}");
    for group in groups {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        write!(
            out,
            "\n@@ -{} +{} @@",
            format_range(first.a_start, last.a_end),
            format_range(first.b_start, last.b_end)
        )
        .unwrap();
        for op in &group {
            if op.tag == Tag::Equal {
                for line in &old_lines[op.a_start..op.a_end] {
                    write!(out, "\n {line}").unwrap();
                }
                continue;
            }
            for line in &old_lines[op.a_start..op.a_end] {
                write!(out, "\n-{line}").unwrap();
            }
            for line in &new_lines[op.b_start..op.b_end] {
                write!(out, "\n+{line}").unwrap();
            }
        }
    }
    out
}

fn format_range(start: usize, end: usize) -> String {
    match end - start {
        0 => format!("{start},0"),
        1 => (start + 1).to_string(),
        length => format!("{},{length}", start + 1),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Del,
    Unmod,
}

/// One line of a structured diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub old_lineno: Option<usize>,
    pub new_lineno: Option<usize>,
    pub action: Action,
    /// Escaped HTML, changed parts of replaced lines in `<del>`/`<ins>`.
    pub line: String,
}

/// A comparison of two texts for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diff {
    pub old_title: String,
    pub new_title: String,
    pub udiff: String,
    /// Hunks of consecutive lines.
    pub chunks: Vec<Vec<DiffLine>>,
}

impl Diff {
    pub fn new(old: &str, new: &str, old_title: &str, new_title: &str) -> Self {
        let old_lines: Vec<&str> = old.lines().collect();
        let new_lines: Vec<&str> = new.lines().collect();
        let chunks = SequenceMatcher::new(&old_lines, &new_lines)
            .grouped_opcodes(CONTEXT_LINES)
            .iter()
            .map(|group| chunk(group, &old_lines, &new_lines))
            .collect();
        Self {
            old_title: old_title.to_owned(),
            new_title: new_title.to_owned(),
            udiff: unified_diff(old, new, old_title, new_title, CONTEXT_LINES),
            chunks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Raw lines of a hunk before highlighting.
struct RawLine<'a> {
    old_lineno: Option<usize>,
    new_lineno: Option<usize>,
    action: Action,
    text: &'a str,
}

fn chunk(group: &[Opcode], old: &[&str], new: &[&str]) -> Vec<DiffLine> {
    let mut raw = Vec::new();
    for op in group {
        if op.tag == Tag::Equal {
            for (offset, text) in old[op.a_start..op.a_end].iter().enumerate() {
                raw.push(RawLine {
                    old_lineno: Some(op.a_start + offset + 1),
                    new_lineno: Some(op.b_start + offset + 1),
                    action: Action::Unmod,
                    text,
                });
            }
            continue;
        }
        for (offset, text) in old[op.a_start..op.a_end].iter().enumerate() {
            raw.push(RawLine {
                old_lineno: Some(op.a_start + offset + 1),
                new_lineno: None,
                action: Action::Del,
                text,
            });
        }
        for (offset, text) in new[op.b_start..op.b_end].iter().enumerate() {
            raw.push(RawLine {
                old_lineno: None,
                new_lineno: Some(op.b_start + offset + 1),
                action: Action::Add,
                text,
            });
        }
    }

    let mut lines: Vec<DiffLine> = raw
        .iter()
        .map(|line| DiffLine {
            old_lineno: line.old_lineno,
            new_lineno: line.new_lineno,
            action: line.action,
            line: escape_html(line.text),
        })
        .collect();
    let mut index = 0;
    while index + 1 < raw.len() {
        if raw[index].action == Action::Del && raw[index + 1].action == Action::Add {
            if let Some((deleted, inserted)) = highlight(raw[index].text, raw[index + 1].text) {
                lines[index].line = deleted;
                lines[index + 1].line = inserted;
            }
            index += 2;
        } else {
            index += 1;
        }
    }
    lines
}

/// Wrap what differs between two lines, keeping the common prefix and
/// suffix. `None` if the lines share neither.
fn highlight(old: &str, new: &str) -> Option<(String, String)> {
    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();
    let limit = old.len().min(new.len());
    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(limit - prefix)
        .take_while(|(a, b)| a == b)
        .count();
    if prefix == 0 && suffix == 0 {
        return None;
    }
    let wrap = |chars: &[char], tag: &str| {
        let part = |range: &[char]| escape_html(&range.iter().collect::<String>());
        format!(
            "{}<{tag}>{}</{tag}>{}",
            part(&chars[..prefix]),
            part(&chars[prefix..chars.len() - suffix]),
            part(&chars[chars.len() - suffix..])
        )
    };
    Some((wrap(&old, "del"), wrap(&new, "ins")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unified_diff_ranges() {
        let old = "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n11\n12\n";
        let new = "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n11\n12\n13\n";
        assert_eq!(
            unified_diff(old, new, "A", "B", 4),
            "--- A\n+++ B\n@@ -9,4 +9,5 @@\n 9\n 10\n 11\n 12\n+13"
        );
        assert_eq!(
            unified_diff("", "x\n", "A", "B", 4),
            "--- A\n+++ B\n@@ -0,0 +1 @@\n+x"
        );
        assert_eq!(unified_diff("same\n", "same\n", "A", "B", 4), "");
    }

    #[test]
    fn test_structured_diff_highlights_changes() {
        let diff = Diff::new("a\nHello <World>\nc\n", "a\nHello <Welt>\nc\nd\n", "Page (1)", "Page (2)");
        assert_eq!(diff.chunks.len(), 1);
        let lines = &diff.chunks[0];
        let summary: Vec<(Option<usize>, Option<usize>, Action, &str)> = lines
            .iter()
            .map(|line| (line.old_lineno, line.new_lineno, line.action, line.line.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Some(1), Some(1), Action::Unmod, "a"),
                (Some(2), None, Action::Del, "Hello &lt;W<del>orld</del>&gt;"),
                (None, Some(2), Action::Add, "Hello &lt;W<ins>elt</ins>&gt;"),
                (Some(3), Some(3), Action::Unmod, "c"),
                (None, Some(4), Action::Add, "d"),
            ]
        );
    }

    #[test]
    fn test_unrelated_lines_are_not_highlighted() {
        assert_eq!(highlight("abc", "xyz"), None);
        assert_eq!(
            highlight("abc", "abd"),
            Some(("ab<del>c</del>".to_owned(), "ab<ins>d</ins>".to_owned()))
        );
    }
}
