//! Page name normalization and joining.
//!
//! Page names are slash separated, case preserving identifiers. Every public
//! entry point of the engine normalizes user supplied names through
//! [`normalize_pagename`] before using them as keys.

use regex::Regex;

/// Returns `true` for characters that never survive normalization.
fn is_unsupported(c: char) -> bool {
    c.is_control() || matches!(c, '#' | '%' | '?')
}

/// Normalize a page name.
///
/// Unsupported characters (control characters, `#`, `%`, `?`) are removed,
/// whitespace runs collapse to a single `_`, trailing slashes are trimmed and
/// leading location markers (`/`, `./`, `../`) are stripped.
///
/// # Example
///
/// ```
/// use inyoka_markup::normalize_pagename;
///
/// assert_eq!(normalize_pagename("  Foo  bar/"), "Foo_bar");
/// assert_eq!(normalize_pagename("/Foo?/Bar"), "Foo/Bar");
/// assert_eq!(normalize_pagename("../Foo"), "Foo");
/// ```
pub fn normalize_pagename(name: &str) -> String {
    let name = normalize_keep_markers(name);
    strip_location_markers(&name).to_owned()
}

/// Normalize a page name but keep leading `./` and `../` markers intact.
///
/// The result is meant to be passed to [`pagename_join`], which resolves the
/// markers and normalizes the final name.
pub fn normalize_keep_markers(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !is_unsupported(*c)).collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    joined.trim_end_matches('/').to_owned()
}

fn strip_location_markers(mut name: &str) -> &str {
    loop {
        if let Some(rest) = name.strip_prefix("./") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix("../") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix('/') {
            name = rest;
        } else {
            return name;
        }
    }
}

fn has_location_marker(name: &str) -> bool {
    name.starts_with("./") || name.starts_with("../")
}

/// Join a page name with another one.
///
/// Works like a filesystem path join with wiki rules: a name containing a
/// slash without a leading relative marker is absolute, a leading slash
/// forces an absolute name, everything else resolves relative to `base`.
///
/// # Example
///
/// ```
/// use inyoka_markup::pagename_join;
///
/// assert_eq!(pagename_join("Foo", "Bar"), "Foo/Bar");
/// assert_eq!(pagename_join("Foo", "/Bar"), "Bar");
/// assert_eq!(pagename_join("Foo", "Bar/Baz"), "Bar/Baz");
/// assert_eq!(pagename_join("Foo", "./Bar/Baz"), "Foo/Bar/Baz");
/// assert_eq!(pagename_join("Foo/Bar", "../Baz"), "Foo/Baz");
/// ```
pub fn pagename_join(base: &str, name: &str) -> String {
    let name = normalize_keep_markers(name);
    let joined = if name.starts_with('/') || (name.contains('/') && !has_location_marker(&name))
    {
        name.trim_start_matches('/').to_owned()
    } else if base.is_empty() {
        name
    } else {
        format!("{}/{name}", base.trim_end_matches('/'))
    };
    let resolved = normalize_path(joined.trim_start_matches('/'));
    normalize_pagename(&resolved)
}

/// Collapse `.` and `..` segments and repeated slashes of a relative path.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Resolve a link target written on page `base`.
///
/// Targets with a leading `./` or `../` are joined with `base`; all other
/// targets are absolute.
pub fn resolve_target(base: Option<&str>, target: &str) -> String {
    let target = normalize_keep_markers(target);
    match base {
        Some(base) if has_location_marker(&target) => pagename_join(base, &target),
        _ => normalize_pagename(&target),
    }
}

/// Get a human readable title for a page name.
///
/// With `full` set the whole path is used, otherwise only the last segment.
///
/// ```
/// use inyoka_markup::get_title;
///
/// assert_eq!(get_title("Wiki/Neue_Seite", true), "Wiki/Neue Seite");
/// assert_eq!(get_title("Wiki/Neue_Seite", false), "Neue Seite");
/// ```
pub fn get_title(name: &str, full: bool) -> String {
    let name = normalize_pagename(name);
    let name = if full {
        name.as_str()
    } else {
        name.rsplit('/').next().unwrap_or_default()
    };
    name.split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns `true` if the target names an external URL rather than a page.
pub fn is_external_target(target: &str) -> bool {
    let Some((scheme, _)) = target.split_once("://") else {
        return false;
    };
    !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_lowercase())
}

/// A simple wildcard pattern where `*` matches any run of characters.
#[derive(Debug, Clone)]
pub struct PagePattern {
    /// `None` if the pattern did not compile; it then matches nothing.
    regex: Option<Regex>,
}

impl PagePattern {
    /// Compile a pattern; matching is anchored at both ends.
    pub fn new(pattern: &str, case_sensitive: bool) -> Self {
        let body = regex::escape(pattern).replace(r"\*", ".*?");
        let flags = if case_sensitive { "" } else { "(?i)" };
        let regex = Regex::new(&format!("{flags}^{body}$"))
            .inspect_err(|error| tracing::warn!(pattern, %error, "Invalid page pattern"))
            .ok();
        Self { regex }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.as_ref().is_some_and(|regex| regex.is_match(name))
    }

    /// Filter names against the pattern, keeping their order.
    pub fn filter<T: AsRef<str>>(&self, names: impl IntoIterator<Item = T>) -> Vec<T> {
        names
            .into_iter()
            .filter(|name| self.matches(name.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_unsupported_characters() {
        assert_eq!(normalize_pagename("Foo#Bar%?"), "FooBar");
        assert_eq!(normalize_pagename("Foo\u{1}Bar"), "FooBar");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_pagename("Foo   Bar\tBaz"), "Foo_Bar_Baz");
        assert_eq!(normalize_pagename("  Foo "), "Foo");
    }

    #[test]
    fn test_normalize_strips_markers() {
        assert_eq!(normalize_pagename("./Foo"), "Foo");
        assert_eq!(normalize_pagename("../../Foo/"), "Foo");
        assert_eq!(normalize_pagename("//Foo"), "Foo");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for name in [
            "././Foo", "  a  b /", "/ x", "Foo//Bar", "..", "./", "a?#%b", "Ä Ö/ü",
        ] {
            let once = normalize_pagename(name);
            assert_eq!(normalize_pagename(&once), once, "input {name:?}");
        }
    }

    #[test]
    fn test_keep_markers() {
        assert_eq!(normalize_keep_markers("./Foo Bar/"), "./Foo_Bar");
        assert_eq!(normalize_keep_markers("../Foo"), "../Foo");
    }

    #[test]
    fn test_join_absolute_wins() {
        for base in ["", "Foo", "Foo/Bar"] {
            assert_eq!(pagename_join(base, "/x"), normalize_pagename("x"));
            assert_eq!(pagename_join(base, "/x y"), normalize_pagename("x y"));
        }
    }

    #[test]
    fn test_join_relative() {
        assert_eq!(pagename_join("Guide", "./Intro"), "Guide/Intro");
        assert_eq!(pagename_join("Guide/Intro", "../Other"), "Guide/Other");
        assert_eq!(pagename_join("Guide", "../../Other"), "Other");
        assert_eq!(pagename_join("Guide", "Intro"), "Guide/Intro");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target(Some("Start"), "Other"), "Other");
        assert_eq!(resolve_target(Some("Guide"), "./Intro"), "Guide/Intro");
        assert_eq!(resolve_target(Some("Guide"), "/Intro"), "Intro");
        assert_eq!(resolve_target(None, "./Intro"), "Intro");
        assert_eq!(resolve_target(Some("A/B"), "C/D"), "C/D");
    }

    #[test]
    fn test_get_title() {
        assert_eq!(get_title("Foo__Bar", true), "Foo Bar");
        assert_eq!(get_title("A/B_C", false), "B C");
    }

    #[test]
    fn test_is_external_target() {
        assert!(is_external_target("http://example.org"));
        assert!(!is_external_target("Foo/Bar"));
        assert!(!is_external_target("HTTP://x"));
    }

    #[test]
    fn test_uncompiled_pattern_matches_nothing() {
        let pattern = PagePattern { regex: None };
        assert!(!pattern.matches(""));
        assert!(pattern.filter(["Wiki"]).is_empty());
    }

    #[test]
    fn test_page_pattern() {
        let pattern = PagePattern::new("Wiki/*", true);
        assert!(pattern.matches("Wiki/Foo"));
        assert!(!pattern.matches("wiki/Foo"));
        assert!(PagePattern::new("wiki/*", false).matches("Wiki/Foo"));
        assert!(PagePattern::new("a.b", true).matches("a.b"));
        assert!(!PagePattern::new("a.b", true).matches("axb"));

        let names = ["Wiki/A", "Other", "Wiki/B"];
        let matched = pattern.filter(names);
        assert_eq!(matched, vec!["Wiki/A", "Wiki/B"]);
    }
}
