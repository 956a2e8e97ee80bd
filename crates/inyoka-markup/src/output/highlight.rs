//! Syntax highlighting of code blocks.

use std::sync::LazyLock;

use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{IncludeBackground, append_highlighted_html_for_styled_line};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

static SYNTAXES: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);

static THEME: LazyLock<Theme> = LazyLock::new(|| {
    let mut themes = ThemeSet::load_defaults();
    themes.themes.remove("InspiredGitHub").unwrap_or_default()
});

/// Highlight code as styled HTML spans.
///
/// Returns `None` for plain text and unknown languages; those are written
/// escaped without markup.
pub(crate) fn highlight(code: &str, language: &str) -> Option<String> {
    if language.is_empty() || language == "text" {
        return None;
    }
    let syntax = SYNTAXES.find_syntax_by_token(language)?;
    let mut highlighter = HighlightLines::new(syntax, &THEME);
    let mut out = String::with_capacity(code.len() * 2);
    for line in LinesWithEndings::from(code) {
        let regions = highlighter
            .highlight_line(line, &SYNTAXES)
            .inspect_err(|error| tracing::warn!(language, %error, "Highlighting failed"))
            .ok()?;
        append_highlighted_html_for_styled_line(&regions, IncludeBackground::No, &mut out).ok()?;
    }
    Some(out)
}
