//! Revision comparison for the wiki.
//!
//! - [`Merger`] / [`merge`]: three-way merge of concurrent edits, with
//!   conflict markers or a strict [`MergeConflict`] error
//! - [`unified_diff`] and [`Diff`]: two-way diffs as text and as hunks of
//!   lines ready for display
//! - [`similarity`] and [`get_close_matches`]: fuzzy page name matching

mod matcher;
mod merge;
mod unified;

pub use matcher::{Match, Opcode, SequenceMatcher, Tag, get_close_matches, similarity};
pub use merge::{DEFAULT_MARKERS, MergeConflict, Merger, merge};
pub use unified::{Action, CONTEXT_LINES, Diff, DiffLine, unified_diff};

/// Quote a text for a reply: every line gets a `> ` prefix, or just `>`
/// when it is quoted already. With an author a `schrieb:` line links the
/// user.
///
/// ```
/// assert_eq!(inyoka_diff::quote_text("hi\n> old", Some("anna")), "[user:anna:] schrieb:\n> hi\n>> old");
/// ```
pub fn quote_text(text: &str, author: Option<&str>) -> String {
    let quoted = text
        .split('\n')
        .map(|line| {
            if line.starts_with('>') {
                format!(">{line}")
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    match author {
        Some(author) => format!("[user:{author}:] schrieb:\n{quoted}"),
        None => quoted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_text_without_author() {
        assert_eq!(quote_text("a\n\nb", None), "> a\n> \n> b");
    }
}
