use regex::Regex;

use super::Transformer;
use crate::nodes::{Node, NodeKind};

/// Smiley codes mapped to image URLs. Longer codes win over shorter ones
/// sharing a prefix.
#[derive(Debug, Clone, Default)]
pub struct SmileyMap {
    entries: Vec<(String, String)>,
    regex: Option<Regex>,
}

impl SmileyMap {
    pub fn new<I, C, U>(entries: I) -> Self
    where
        I: IntoIterator<Item = (C, U)>,
        C: Into<String>,
        U: Into<String>,
    {
        let mut entries: Vec<(String, String)> = entries
            .into_iter()
            .map(|(code, url)| (code.into(), url.into()))
            .filter(|(code, _)| !code.is_empty())
            .collect();
        entries.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()).then_with(|| a.0.cmp(&b.0)));
        entries.dedup_by(|a, b| a.0 == b.0);
        let regex = if entries.is_empty() {
            None
        } else {
            let alternation = entries
                .iter()
                .map(|(code, _)| regex::escape(code))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&alternation).ok()
        };
        Self { entries, regex }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(known, _)| known == code)
            .map(|(_, url)| url.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Byte ranges of smiley codes standing apart from word characters.
    fn find(&self, text: &str) -> Vec<(usize, usize)> {
        let Some(regex) = &self.regex else {
            return Vec::new();
        };
        let mut found = Vec::new();
        let mut start = 0;
        while let Some(m) = regex.find_at(text, start) {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
            if is_word(before) || is_word(after) {
                let step = text[m.start()..].chars().next().map_or(1, char::len_utf8);
                start = m.start() + step;
            } else {
                found.push((m.start(), m.end()));
                start = m.end();
            }
            if start >= text.len() {
                break;
            }
        }
        found
    }
}

/// Replaces smiley codes in text by images.
#[derive(Debug, Clone, Default)]
pub struct SmileyInjector {
    smilies: SmileyMap,
}

impl SmileyInjector {
    pub fn new(smilies: SmileyMap) -> Self {
        Self { smilies }
    }
}

impl Transformer for SmileyInjector {
    fn name(&self) -> &'static str {
        "smilies"
    }

    fn transform(&self, tree: &mut Node) {
        if !self.smilies.is_empty() {
            self.transform_node(tree);
        }
    }
}

impl SmileyInjector {
    fn transform_node(&self, node: &mut Node) {
        if node.is_raw() {
            return;
        }
        let children = std::mem::take(&mut node.children);
        let mut result = Vec::with_capacity(children.len());
        for mut child in children {
            let NodeKind::Text(text) = &child.kind else {
                self.transform_node(&mut child);
                result.push(child);
                continue;
            };
            let found = self.smilies.find(text);
            if found.is_empty() {
                result.push(child);
                continue;
            }
            let mut last = 0;
            for (start, end) in found {
                if start > last {
                    result.push(Node::text(&text[last..start]));
                }
                let code = &text[start..end];
                let url = self.smilies.get(code).unwrap_or_default();
                result.push(
                    Node::new(NodeKind::Image {
                        href: url.to_owned(),
                        alt: code.to_owned(),
                    })
                    .with_class("smiley"),
                );
                last = end;
            }
            if last < text.len() {
                result.push(Node::text(&text[last..]));
            }
        }
        node.children = result;
    }
}
