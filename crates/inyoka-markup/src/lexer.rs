//! Tokenizer for the wiki markup.
//!
//! The lexer is a scanner with an explicit state stack. Every state owns an
//! ordered list of rules; the first rule matching at the current position
//! wins. Entering a scope pushes a state and yields a `Begin` token, leaving
//! it yields the matching `End` token. Scopes still open at the end of the
//! input are closed with empty `End` tokens, so the stream is always well
//! nested.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

/// Scopes opened by `Begin` and closed by `End` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Metadata,
    Headline,
    Definition,
    TableRow,
    ListItem,
    Box,
    Pre,
    Conflict,
    Strong,
    Emphasized,
    EscapedCode,
    Code,
    Underline,
    Stroke,
    Small,
    Big,
    Sub,
    Sup,
    Footnote,
    Macro,
    Color,
    Size,
    Font,
    WikiLink,
    ExternalLink,
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Text,
    Begin(Scope),
    End(Scope),
    MetadataKey,
    DefinitionTerm,
    Ruler,
    Newline,
    ConflictSwitch,
    MacroName,
    ColorValue,
    FontSize,
    FontFace,
    SourceLink,
    ExternalLinkBegin,
    ExternalLinkEnd,
    LinkTarget,
    InterwikiPrefix,
    FreeLink,
    FuncArgumentDelimiter,
    FuncStringArg,
    FuncKwarg,
    ParserBegin,
    ParserEnd,
    TableDefBegin,
    TableDefEnd,
    TableColSwitch,
    BoxDefBegin,
    BoxDefEnd,
    QuoteBegin,
    QuoteEnd,
    Eof,
}

/// A single token with the source text it was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.kind, self.value)
    }
}

/// Lexer states. Scope states are entered with a `Begin` token, helper
/// states are switched to or entered silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum State {
    Everything,
    Scope(Scope),
    ParserArguments,
    ParserData,
    TableDef,
    TableContents,
    BoxDef,
    BoxContents,
    MacroArguments,
}

#[derive(Clone, Copy)]
enum Emit {
    Nothing,
    Whole(TokenKind),
    Groups(&'static [TokenKind]),
    WikiTarget,
}

#[derive(Clone, Copy)]
enum Action {
    Stay,
    Enter(Scope),
    SilentEnter(State),
    Leave(usize),
    Switch(State),
}

#[derive(Clone)]
struct Rule {
    regex: Option<Regex>,
    bol: bool,
    eol_lookahead: bool,
    emit: Emit,
    action: Action,
}

const URL_PATTERN: &str = r"(?:(?:https?|ftps?|file|ssh|mms|svn(?:\+ssh)?|git|dict|nntp|irc|rsync|smb)://|(?:mailto|telnet|s?news|sips?|skype):)";

const STRING_ARG: &str = r#"(?s)('([^'\\]*(?:\\.[^'\\]*)*)'|"([^"\\]*(?:\\.[^"\\]*)*)")"#;

impl Rule {
    /// A rule matching `pattern` anchored at the current position. A leading
    /// `^` only matches at the beginning of a line.
    fn new(pattern: &str) -> Self {
        let (bol, body) = match pattern.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };
        let regex = Regex::new(&format!(r"\A(?m:{body})")).unwrap_or_else(|e| {
            panic!("invalid lexer rule {pattern:?}: {e}");
        });
        Self {
            regex: Some(regex),
            bol,
            eol_lookahead: false,
            emit: Emit::Nothing,
            action: Action::Stay,
        }
    }

    /// A rule that always matches without consuming input.
    fn empty() -> Self {
        Self {
            regex: None,
            bol: false,
            eol_lookahead: false,
            emit: Emit::Nothing,
            action: Action::Stay,
        }
    }

    /// Matches the empty string in front of a newline or at the end.
    fn end_of_line() -> Self {
        Self {
            eol_lookahead: true,
            ..Self::empty()
        }
    }

    fn token(mut self, kind: TokenKind) -> Self {
        self.emit = Emit::Whole(kind);
        self
    }

    fn groups(mut self, kinds: &'static [TokenKind]) -> Self {
        self.emit = Emit::Groups(kinds);
        self
    }

    fn wiki_target(mut self) -> Self {
        self.emit = Emit::WikiTarget;
        self
    }

    fn enter(mut self, scope: Scope) -> Self {
        self.action = Action::Enter(scope);
        self
    }

    fn silent_enter(mut self, state: State) -> Self {
        self.action = Action::SilentEnter(state);
        self
    }

    fn leave(mut self, count: usize) -> Self {
        self.action = Action::Leave(count);
        self
    }

    fn switch(mut self, state: State) -> Self {
        self.action = Action::Switch(state);
        self
    }

    fn matches<'t>(&self, text: &'t str, pos: usize) -> Option<RuleMatch<'t>> {
        if self.bol && pos > 0 && text.as_bytes()[pos - 1] != b'\n' {
            return None;
        }
        if self.eol_lookahead && pos < text.len() && text.as_bytes()[pos] != b'\n' {
            return None;
        }
        match &self.regex {
            None => Some(RuleMatch {
                whole: "",
                captures: None,
            }),
            Some(regex) => regex.captures(&text[pos..]).map(|captures| RuleMatch {
                whole: captures.get(0).map_or("", |m| m.as_str()),
                captures: Some(captures),
            }),
        }
    }
}

struct RuleMatch<'t> {
    whole: &'t str,
    captures: Option<Captures<'t>>,
}

impl RuleMatch<'_> {
    fn group(&self, index: usize) -> Option<&str> {
        self.captures
            .as_ref()
            .and_then(|c| c.get(index))
            .map(|m| m.as_str())
    }
}

fn block_rules() -> Vec<Rule> {
    vec![
        Rule::new(r"^##.*?(\n|$)"),
        Rule::new(r"^#\s*(.*?)\s*:\s*")
            .groups(&[TokenKind::MetadataKey])
            .enter(Scope::Metadata),
        Rule::new(r"^={1,5}\s*").enter(Scope::Headline),
        Rule::new(r"^\s+(.*?)::\s+")
            .groups(&[TokenKind::DefinitionTerm])
            .enter(Scope::Definition),
        Rule::new(r"^\|\|").enter(Scope::TableRow),
        Rule::new(r"^[ \t]+(?:[*-]|[01aAiI]\.)\s*").enter(Scope::ListItem),
        Rule::new(r"\{\{\|").enter(Scope::Box),
        Rule::new(r"\{\{\{").enter(Scope::Pre),
        Rule::new(r"^<{40}\s*$").enter(Scope::Conflict),
        Rule::new(r"^----+\s*(\n|$)").token(TokenKind::Ruler),
    ]
}

fn inline_rules() -> Vec<Rule> {
    vec![
        Rule::new(r"(?s)<!--.*?-->"),
        Rule::new(r"\\\\\n?").token(TokenKind::Newline),
        Rule::new("'''").enter(Scope::Strong),
        Rule::new("''").enter(Scope::Emphasized),
        Rule::new("``").enter(Scope::EscapedCode),
        Rule::new("`").enter(Scope::Code),
        Rule::new("__").enter(Scope::Underline),
        Rule::new(r"--\(").enter(Scope::Stroke),
        Rule::new("~-").enter(Scope::Small),
        Rule::new(r"~\+").enter(Scope::Big),
        Rule::new(",,").enter(Scope::Sub),
        Rule::new(r"\^\^").enter(Scope::Sup),
        Rule::new(r"\(\(").enter(Scope::Footnote),
        Rule::new(r"\[\[([\w_]+)")
            .groups(&[TokenKind::MacroName])
            .enter(Scope::Macro),
        Rule::new(r"\[color\s*=\s*(.*?)\s*\]")
            .groups(&[TokenKind::ColorValue])
            .enter(Scope::Color),
        Rule::new(r"\[size\s*=\s*(.*?)\s*\]")
            .groups(&[TokenKind::FontSize])
            .enter(Scope::Size),
        Rule::new(r"\[font\s*=\s*(.*?)\s*\]")
            .groups(&[TokenKind::FontFace])
            .enter(Scope::Font),
    ]
}

fn link_rules() -> Vec<Rule> {
    vec![
        Rule::new(r"\[\s*(\d+)\s*\]").groups(&[TokenKind::SourceLink]),
        Rule::new(&format!(r"(\[\s*)((?:{URL_PATTERN}|\?|#)\S+)(\s*\])")).groups(&[
            TokenKind::ExternalLinkBegin,
            TokenKind::LinkTarget,
            TokenKind::ExternalLinkEnd,
        ]),
        Rule::new(&format!(r"\[((?:{URL_PATTERN}|\?).*?)\s+"))
            .groups(&[TokenKind::LinkTarget])
            .enter(Scope::ExternalLink),
        Rule::new(r"\[\s*([^:\]]+?)?\s*:\s*((?:::|[^:])*)\s*:\s*")
            .wiki_target()
            .enter(Scope::WikiLink),
        Rule::new(&format!(
            r"{URL_PATTERN}[^\s/]+(/[^\s.,:;?]*([.,:;?][^\s.,:;?]+)*)?"
        ))
        .token(TokenKind::FreeLink),
    ]
}

fn function_call_rules() -> Vec<Rule> {
    vec![
        Rule::new(",").token(TokenKind::FuncArgumentDelimiter),
        Rule::new(r"\s+"),
        Rule::new(STRING_ARG).token(TokenKind::FuncStringArg),
        Rule::new(r"([\w_]+)\s*=").groups(&[TokenKind::FuncKwarg]),
    ]
}

fn closing(pattern: &str, rest: &[Rule]) -> Vec<Rule> {
    let mut rules = vec![Rule::new(pattern).leave(1)];
    rules.extend_from_slice(rest);
    rules
}

static RULES: LazyLock<HashMap<State, Vec<Rule>>> = LazyLock::new(|| {
    let block = block_rules();
    let inline = inline_rules();
    let links = link_rules();
    let function_call = function_call_rules();
    let inline_with_links: Vec<Rule> = inline.iter().chain(&links).cloned().collect();
    let everything: Vec<Rule> = block.iter().chain(&inline_with_links).cloned().collect();

    let mut rules = HashMap::new();
    rules.insert(State::Everything, everything.clone());

    let mut metadata = vec![
        Rule::new(r"\s*(\n|$)").leave(1),
        Rule::new(r"\s*,\s*").token(TokenKind::FuncArgumentDelimiter),
    ];
    metadata.push(Rule::new(STRING_ARG).token(TokenKind::FuncStringArg));
    rules.insert(State::Scope(Scope::Metadata), metadata);

    let mut conflict = vec![
        Rule::new(r"^={40}\s*$").token(TokenKind::ConflictSwitch),
        Rule::new(r"^>{40}\s*$").leave(1),
    ];
    conflict.extend_from_slice(&everything);
    rules.insert(State::Scope(Scope::Conflict), conflict);

    let inline_scopes: [(Scope, &str); 11] = [
        (Scope::Headline, r"\s*=+\s*$"),
        (Scope::Definition, r"(\n|$)"),
        (Scope::Strong, "'''"),
        (Scope::Emphasized, "''"),
        (Scope::Underline, "__"),
        (Scope::Stroke, r"\)--"),
        (Scope::Small, "-~"),
        (Scope::Big, r"\+~"),
        (Scope::Sub, ",,"),
        (Scope::Sup, r"\^\^"),
        (Scope::Footnote, r"\)\)"),
    ];
    for (scope, pattern) in inline_scopes {
        rules.insert(State::Scope(scope), closing(pattern, &inline_with_links));
    }
    rules.insert(State::Scope(Scope::Color), closing(r"\[/color\]", &inline_with_links));
    rules.insert(State::Scope(Scope::Size), closing(r"\[/size\]", &inline_with_links));
    rules.insert(State::Scope(Scope::Font), closing(r"\[/font\]", &inline_with_links));
    rules.insert(State::Scope(Scope::EscapedCode), closing("``", &[]));
    rules.insert(State::Scope(Scope::Code), closing("`", &[]));
    rules.insert(State::Scope(Scope::ListItem), closing(r"(\n|$)", &everything));
    rules.insert(State::Scope(Scope::WikiLink), closing(r"\s*\]", &inline));
    rules.insert(State::Scope(Scope::ExternalLink), closing(r"\s*\]", &inline));

    rules.insert(
        State::Scope(Scope::Pre),
        vec![
            Rule::new(r"\n?#!([\w_]+)")
                .groups(&[TokenKind::ParserBegin])
                .switch(State::ParserArguments),
            Rule::empty().switch(State::ParserData),
        ],
    );
    let mut parser_arguments = vec![
        Rule::end_of_line()
            .token(TokenKind::ParserEnd)
            .switch(State::ParserData),
        Rule::new(r"[^\S\n]+"),
    ];
    parser_arguments.extend_from_slice(&function_call);
    rules.insert(State::ParserArguments, parser_arguments);
    rules.insert(State::ParserData, vec![Rule::new(r"^\}\}\}\s*$").leave(1)]);

    rules.insert(
        State::Scope(Scope::TableRow),
        vec![
            Rule::new(r"\s*<")
                .token(TokenKind::TableDefBegin)
                .switch(State::TableDef),
            Rule::empty().switch(State::TableContents),
        ],
    );
    let mut table_def = vec![
        Rule::new(">")
            .token(TokenKind::TableDefEnd)
            .switch(State::TableContents),
    ];
    table_def.extend_from_slice(&function_call);
    rules.insert(State::TableDef, table_def);
    let mut table_contents = vec![
        Rule::new(r"\|\|\s*?(\n|$)").leave(1),
        Rule::new(r"\|\|")
            .token(TokenKind::TableColSwitch)
            .switch(State::Scope(Scope::TableRow)),
    ];
    table_contents.extend_from_slice(&everything);
    rules.insert(State::TableContents, table_contents);

    rules.insert(
        State::Scope(Scope::Box),
        vec![
            Rule::new(r"\s*<")
                .token(TokenKind::BoxDefBegin)
                .switch(State::BoxDef),
            Rule::empty().switch(State::BoxContents),
        ],
    );
    let mut box_def = vec![
        Rule::new(">")
            .token(TokenKind::BoxDefEnd)
            .switch(State::BoxContents),
    ];
    box_def.extend_from_slice(&function_call);
    rules.insert(State::BoxDef, box_def);
    rules.insert(State::BoxContents, closing(r"^\|\}\}\s*$", &everything));

    rules.insert(
        State::Scope(Scope::Macro),
        vec![
            Rule::new(r"\s+"),
            Rule::new(r"\]\]").leave(1),
            Rule::new(r"\(").silent_enter(State::MacroArguments),
            Rule::empty().leave(1),
        ],
    );
    let mut macro_arguments = vec![Rule::new(r"\)\s*\]\]").leave(2)];
    macro_arguments.extend_from_slice(&function_call);
    rules.insert(State::MacroArguments, macro_arguments);

    rules
});

/// A list of tokens with a cursor, consumed by the parser.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
    eof: Token,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, ""),
        }
    }

    /// The token under the cursor.
    pub fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    /// The token after the current one.
    pub fn look(&self) -> &Token {
        self.tokens.get(self.pos + 1).unwrap_or(&self.eof)
    }

    /// Returns the current token and advances the cursor.
    pub fn next_token(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Skips the current token if it has the given kind.
    pub fn skip_if(&mut self, kind: TokenKind) -> bool {
        if self.current().kind == kind {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }
}

fn is_conflict_end(line: &str) -> bool {
    let line = line.trim_end();
    line.len() == 40 && line.bytes().all(|b| b == b'>')
}

/// Tokenize markup source.
///
/// Quote levels (`>` prefixes) are resolved first; every quoted block is
/// then tokenized in isolation so breakage inside a quote does not leak.
pub fn tokenize(source: &str) -> TokenStream {
    let source = source.replace("\r\n", "\n").replace('\r', "\n");
    let mut tokens = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut levels: Vec<usize> = vec![0];
    let mut open_blocks = vec![false];

    let flush = |buffer: &mut Vec<&str>, tokens: &mut Vec<Token>| {
        if !buffer.is_empty() {
            tokens.extend(tokenize_block(&buffer.join("\n"), None));
            buffer.clear();
        }
    };

    for line in source.lines() {
        let block_open = open_blocks.last().copied().unwrap_or(false);
        let mut line = line;
        if !block_open && line.starts_with("{{{") {
            if let Some(open) = open_blocks.last_mut() {
                *open = true;
            }
        } else if block_open && line.starts_with("}}}") && line[3..].trim().is_empty() {
            if let Some(open) = open_blocks.last_mut() {
                *open = false;
            }
        } else if !block_open && !is_conflict_end(line) {
            let depth = line.chars().take_while(|c| *c == '>').count();
            if depth > 0 {
                line = &line[depth..];
                line = line.strip_prefix(' ').unwrap_or(line);
            }
            let current = levels.last().copied().unwrap_or(0);
            if depth > current {
                flush(&mut buffer, &mut tokens);
                for level in current + 1..=depth {
                    levels.push(level);
                    open_blocks.push(false);
                    tokens.push(Token::new(TokenKind::QuoteBegin, ""));
                }
            } else if depth < current {
                flush(&mut buffer, &mut tokens);
                for _ in depth..current {
                    levels.pop();
                    open_blocks.pop();
                    tokens.push(Token::new(TokenKind::QuoteEnd, ""));
                }
            }
        }
        buffer.push(line);
    }
    flush(&mut buffer, &mut tokens);
    for _ in 1..levels.len() {
        tokens.push(Token::new(TokenKind::QuoteEnd, ""));
    }
    TokenStream::new(tokens)
}

/// Tokenize a block without quote handling.
///
/// With an `escape_hint` every rule match is treated as text and its start
/// offset recorded; [`escape`] uses this to find the spots needing a
/// backslash.
fn tokenize_block(text: &str, mut escape_hint: Option<&mut Vec<usize>>) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut stack: Vec<(Option<Scope>, State)> = vec![(None, State::Everything)];
    let mut buffer = String::new();
    let mut escaped = false;
    let mut pos = 0;

    let flush = |buffer: &mut String, tokens: &mut Vec<Token>| {
        if !buffer.is_empty() {
            tokens.push(Token::new(TokenKind::Text, std::mem::take(buffer)));
        }
    };

    while pos < text.len() {
        let state = stack.last().map_or(State::Everything, |(_, state)| *state);
        let rules = RULES.get(&state).map_or(&[][..], Vec::as_slice);
        let matched = rules
            .iter()
            .find_map(|rule| rule.matches(text, pos).map(|m| (rule, m)));

        let Some((rule, m)) = matched else {
            let Some(c) = text[pos..].chars().next() else {
                break;
            };
            pos += c.len_utf8();
            if c == '\\' {
                if escaped {
                    buffer.push('\\');
                }
                escaped = !escaped;
            } else {
                if escaped {
                    buffer.push('\\');
                }
                buffer.push(c);
                escaped = false;
            }
            continue;
        };

        if escaped || escape_hint.is_some() {
            buffer.push_str(m.whole);
            if let Some(hint) = escape_hint.as_deref_mut() {
                hint.push(pos);
            }
            pos += m.whole.len();
            escaped = false;
            continue;
        }

        flush(&mut buffer, &mut tokens);
        match rule.action {
            Action::Enter(scope) => {
                stack.push((Some(scope), State::Scope(scope)));
                tokens.push(Token::new(TokenKind::Begin(scope), m.whole));
            }
            Action::SilentEnter(state) => stack.push((None, state)),
            _ => {}
        }

        match rule.emit {
            Emit::Nothing => {}
            Emit::Whole(kind) => tokens.push(Token::new(kind, m.whole)),
            Emit::Groups(kinds) => {
                for (index, kind) in kinds.iter().enumerate() {
                    tokens.push(Token::new(*kind, m.group(index + 1).unwrap_or_default()));
                }
            }
            Emit::WikiTarget => {
                let wiki = m.group(1).unwrap_or_default().trim();
                let page = m.group(2).unwrap_or_default().trim();
                tokens.push(Token::new(TokenKind::InterwikiPrefix, wiki));
                tokens.push(Token::new(TokenKind::LinkTarget, page.replace("::", ":")));
            }
        }

        pos += m.whole.len();
        match rule.action {
            Action::Leave(count) => {
                for _ in 0..count {
                    if let Some((Some(scope), _)) = stack.pop() {
                        tokens.push(Token::new(TokenKind::End(scope), m.whole));
                    }
                }
            }
            Action::Switch(next) => {
                if let Some((Some(scope), _)) = stack.pop() {
                    stack.push((Some(scope), next));
                }
            }
            _ => {}
        }
    }

    if escaped {
        buffer.push('\\');
    }
    flush(&mut buffer, &mut tokens);
    for (announce, _) in stack.into_iter().rev() {
        if let Some(scope) = announce {
            tokens.push(Token::new(TokenKind::End(scope), ""));
        }
    }
    tokens
}

/// Escape text so it is read back as literal text by the lexer.
///
/// ```
/// use inyoka_markup::lexer::escape;
///
/// assert_eq!(escape("'''not bold'''"), r"\'''not bold\'''");
/// ```
pub fn escape(text: &str) -> String {
    let text = text.lines().collect::<Vec<_>>().join("\n");
    let mut hints = Vec::new();
    tokenize_block(&text, Some(&mut hints));
    let mut result = String::with_capacity(text.len() + hints.len());
    let mut last = 0;
    for pos in hints {
        result.push_str(&text[last..pos]);
        result.push('\\');
        last = pos;
    }
    result.push_str(&text[last..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .into_tokens()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn pairs(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .into_tokens()
            .into_iter()
            .map(|t| (t.kind, t.value))
            .collect()
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(pairs("Hello world."), vec![(TokenKind::Text, "Hello world.".to_owned())]);
    }

    #[test]
    fn test_strong_and_emphasized() {
        assert_eq!(
            kinds("'''a''' ''b''"),
            vec![
                TokenKind::Begin(Scope::Strong),
                TokenKind::Text,
                TokenKind::End(Scope::Strong),
                TokenKind::Text,
                TokenKind::Begin(Scope::Emphasized),
                TokenKind::Text,
                TokenKind::End(Scope::Emphasized),
            ]
        );
    }

    #[test]
    fn test_unclosed_scope_is_closed_at_end() {
        let tokens = tokenize("'''open").into_tokens();
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::End(Scope::Strong)));
        assert_eq!(tokens.last().map(|t| t.value.as_str()), Some(""));
    }

    #[test]
    fn test_headline() {
        let tokens = pairs("== Title ==\nText");
        assert_eq!(tokens[0], (TokenKind::Begin(Scope::Headline), "== ".to_owned()));
        assert_eq!(tokens[1], (TokenKind::Text, "Title".to_owned()));
        assert_eq!(tokens[2].0, TokenKind::End(Scope::Headline));
        assert_eq!(tokens[3], (TokenKind::Text, "\nText".to_owned()));
    }

    #[test]
    fn test_block_rules_need_line_start() {
        assert_eq!(kinds("a == b =="), vec![TokenKind::Text]);
    }

    #[test]
    fn test_metadata_line() {
        assert_eq!(
            pairs("# X-Redirect: Target\n"),
            vec![
                (TokenKind::Begin(Scope::Metadata), "# X-Redirect: ".to_owned()),
                (TokenKind::MetadataKey, "X-Redirect".to_owned()),
                (TokenKind::Text, "Target".to_owned()),
                (TokenKind::End(Scope::Metadata), "\n".to_owned()),
            ]
        );
    }

    #[test]
    fn test_comment_line_is_dropped() {
        assert_eq!(pairs("## hidden\nshown"), vec![(TokenKind::Text, "shown".to_owned())]);
    }

    #[test]
    fn test_wiki_link() {
        assert_eq!(
            pairs("[:Other:the other]"),
            vec![
                (TokenKind::Begin(Scope::WikiLink), "[:Other:".to_owned()),
                (TokenKind::InterwikiPrefix, String::new()),
                (TokenKind::LinkTarget, "Other".to_owned()),
                (TokenKind::Text, "the other".to_owned()),
                (TokenKind::End(Scope::WikiLink), "]".to_owned()),
            ]
        );
    }

    #[test]
    fn test_interwiki_link() {
        let tokens = pairs("[wikipedia:Rust:]");
        assert_eq!(tokens[1], (TokenKind::InterwikiPrefix, "wikipedia".to_owned()));
        assert_eq!(tokens[2], (TokenKind::LinkTarget, "Rust".to_owned()));
    }

    #[test]
    fn test_external_links() {
        assert_eq!(
            kinds("[http://example.org]"),
            vec![
                TokenKind::ExternalLinkBegin,
                TokenKind::LinkTarget,
                TokenKind::ExternalLinkEnd,
            ]
        );
        let tokens = pairs("[http://example.org Example]");
        assert_eq!(tokens[1], (TokenKind::LinkTarget, "http://example.org".to_owned()));
        assert_eq!(tokens[2], (TokenKind::Text, "Example".to_owned()));
    }

    #[test]
    fn test_free_link() {
        assert_eq!(
            pairs("see http://example.org/foo."),
            vec![
                (TokenKind::Text, "see ".to_owned()),
                (TokenKind::FreeLink, "http://example.org/foo".to_owned()),
                (TokenKind::Text, ".".to_owned()),
            ]
        );
    }

    #[test]
    fn test_macro_with_arguments() {
        assert_eq!(
            pairs(r#"[[Einbinden("./Intro", silent=ja)]]"#),
            vec![
                (TokenKind::Begin(Scope::Macro), "[[Einbinden".to_owned()),
                (TokenKind::MacroName, "Einbinden".to_owned()),
                (TokenKind::FuncStringArg, "\"./Intro\"".to_owned()),
                (TokenKind::FuncArgumentDelimiter, ",".to_owned()),
                (TokenKind::FuncKwarg, "silent".to_owned()),
                (TokenKind::Text, "ja".to_owned()),
                (TokenKind::End(Scope::Macro), ")]]".to_owned()),
            ]
        );
    }

    #[test]
    fn test_macro_without_arguments() {
        assert_eq!(
            kinds("[[Seitenzahl]]"),
            vec![
                TokenKind::Begin(Scope::Macro),
                TokenKind::MacroName,
                TokenKind::End(Scope::Macro),
            ]
        );
    }

    #[test]
    fn test_pre_block_is_raw() {
        assert_eq!(
            pairs("{{{\n'''x'''\n}}}"),
            vec![
                (TokenKind::Begin(Scope::Pre), "{{{".to_owned()),
                (TokenKind::Text, "\n'''x'''\n".to_owned()),
                (TokenKind::End(Scope::Pre), "}}}".to_owned()),
            ]
        );
    }

    #[test]
    fn test_parser_block() {
        assert_eq!(
            pairs("{{{#!code rust\nfn main() {}\n}}}"),
            vec![
                (TokenKind::Begin(Scope::Pre), "{{{".to_owned()),
                (TokenKind::ParserBegin, "code".to_owned()),
                (TokenKind::Text, "rust".to_owned()),
                (TokenKind::ParserEnd, String::new()),
                (TokenKind::Text, "\nfn main() {}\n".to_owned()),
                (TokenKind::End(Scope::Pre), "}}}".to_owned()),
            ]
        );
    }

    #[test]
    fn test_table_row() {
        assert_eq!(
            kinds("||<-2> a || b ||\n"),
            vec![
                TokenKind::Begin(Scope::TableRow),
                TokenKind::TableDefBegin,
                TokenKind::Text,
                TokenKind::TableDefEnd,
                TokenKind::Text,
                TokenKind::TableColSwitch,
                TokenKind::Text,
                TokenKind::End(Scope::TableRow),
            ]
        );
    }

    #[test]
    fn test_list_items() {
        assert_eq!(
            kinds(" * a\n * b\n"),
            vec![
                TokenKind::Begin(Scope::ListItem),
                TokenKind::Text,
                TokenKind::End(Scope::ListItem),
                TokenKind::Begin(Scope::ListItem),
                TokenKind::Text,
                TokenKind::End(Scope::ListItem),
            ]
        );
    }

    #[test]
    fn test_quotes() {
        assert_eq!(
            pairs("> quoted\nplain"),
            vec![
                (TokenKind::QuoteBegin, String::new()),
                (TokenKind::Text, "quoted".to_owned()),
                (TokenKind::QuoteEnd, String::new()),
                (TokenKind::Text, "plain".to_owned()),
            ]
        );
    }

    #[test]
    fn test_quote_marker_inside_pre_is_kept() {
        let tokens = pairs("{{{\n> not a quote\n}}}");
        assert!(tokens.iter().all(|(kind, _)| *kind != TokenKind::QuoteBegin));
    }

    #[test]
    fn test_conflict_markers() {
        let source = format!("{}\nleft\n{}\nright\n{}\n", "<".repeat(40), "=".repeat(40), ">".repeat(40));
        let kinds = kinds(&source);
        assert_eq!(kinds[0], TokenKind::Begin(Scope::Conflict));
        assert!(kinds.contains(&TokenKind::ConflictSwitch));
        assert!(kinds.contains(&TokenKind::End(Scope::Conflict)));
    }

    #[test]
    fn test_backslash_escapes_token() {
        assert_eq!(pairs(r"\'''a"), vec![(TokenKind::Text, "'''a".to_owned())]);
        assert_eq!(pairs(r"C:\x"), vec![(TokenKind::Text, r"C:\x".to_owned())]);
        assert_eq!(pairs("end\\"), vec![(TokenKind::Text, "end\\".to_owned())]);
    }

    #[test]
    fn test_explicit_newline() {
        assert_eq!(
            kinds("a\\\\\nb"),
            vec![TokenKind::Text, TokenKind::Newline, TokenKind::Text]
        );
    }

    #[test]
    fn test_escape_roundtrip() {
        let text = "''x'' and [:Page:] and __u__";
        let escaped = escape(text);
        assert_eq!(pairs(&escaped), vec![(TokenKind::Text, text.to_owned())]);
    }

    #[test]
    fn test_crlf_is_normalized() {
        assert_eq!(pairs("a\r\nb"), vec![(TokenKind::Text, "a\nb".to_owned())]);
    }
}
