//! The template processor used by the template macro and parser.
//!
//! Templates are markup with embedded `<@ ... @>` tags:
//!
//! ```text
//! <@ $arguments.0 as uppercase @>
//! <@ if $arguments contains 'Rust' @>...<@ elseif $mode == 'x' @>...<@ else @>...<@ endif @>
//! <@ for item in $arguments join_with ', ' @><@ $loop.index @>. <@ $item @><@ endfor @>
//! <@ for word in $text split_by ' ' @>...<@ endfor @>
//! ```
//!
//! Expressions support variables with dotted access, string and integer
//! literals, `as` coercions (`stripped`, `lowercase`, `uppercase`,
//! `title`, `capitalize`, `length`), the comparisons `==` and `!=`, the
//! tests `contains` and `matches_regex`, `not`, `and`, `or` and
//! parentheses. The output is markup that is parsed afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use regex::Regex;

/// Template processing failure.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("unclosed tag starting at byte {0}")]
    UnclosedTag(usize),
    #[error("unexpected `{0}`")]
    UnexpectedTag(String),
    #[error("missing `{0}`")]
    MissingEnd(&'static str),
    #[error("syntax error in `{expression}`: {message}")]
    Syntax { expression: String, message: String },
    #[error("unknown coercion `{0}`")]
    UnknownCoercion(String),
    #[error("invalid regular expression: {0}")]
    InvalidRegex(#[from] regex::Error),
}

/// A template value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Null,
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Str(value) => !value.is_empty(),
            Self::Int(value) => *value != 0,
            Self::Bool(value) => *value,
            Self::List(items) => !items.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
        }
    }

    /// Attribute or index access. Missing entries are `Null`.
    fn get(&self, key: &str) -> Value {
        match self {
            Self::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index))
                .cloned()
                .unwrap_or_default(),
            Self::Map(entries) => entries.get(key).cloned().unwrap_or_default(),
            _ => Self::Null,
        }
    }

    fn contains(&self, needle: &Value) -> bool {
        match self {
            Self::Str(value) => value.contains(&needle.to_string()),
            Self::List(items) => items.contains(needle) || items.iter().any(|item| item.to_string() == needle.to_string()),
            Self::Map(entries) => entries.contains_key(&needle.to_string()),
            _ => false,
        }
    }

    fn items(&self) -> Vec<Value> {
        match self {
            Self::Null => Vec::new(),
            Self::List(items) => items.clone(),
            Self::Map(entries) => entries.keys().cloned().map(Value::Str).collect(),
            other => vec![other.clone()],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Str(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(true) => f.write_str("true"),
            Self::Bool(false) => f.write_str("false"),
            Self::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Map(entries) => {
                for (index, key) in entries.keys().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(key)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Variables visible to a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    variables: HashMap<String, Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }
}

/// Expand a template.
pub fn process(source: &str, context: &TemplateContext) -> Result<String, TemplateError> {
    let segments = split_segments(source)?;
    let mut position = 0;
    let body = parse_block(&segments, &mut position, &[])?;
    if let Some(Segment::Tag(tag)) = segments.get(position) {
        return Err(TemplateError::UnexpectedTag(tag.clone()));
    }
    let mut renderer = Renderer {
        context,
        locals: Vec::new(),
    };
    let mut out = String::with_capacity(source.len());
    renderer.render(&body, &mut out)?;
    Ok(out)
}

enum Segment {
    Text(String),
    Tag(String),
}

fn split_segments(source: &str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut offset = 0;
    while let Some(start) = rest.find("<@") {
        if start > 0 {
            segments.push(Segment::Text(rest[..start].to_owned()));
        }
        let inner = &rest[start + 2..];
        let Some(end) = inner.find("@>") else {
            return Err(TemplateError::UnclosedTag(offset + start));
        };
        segments.push(Segment::Tag(inner[..end].trim().to_owned()));
        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest.to_owned()));
    }
    Ok(segments)
}

#[derive(Debug)]
enum TemplateNode {
    Text(String),
    Print(Expr),
    If {
        branches: Vec<(Expr, Vec<TemplateNode>)>,
        otherwise: Vec<TemplateNode>,
    },
    For {
        variable: String,
        iterable: Expr,
        join_with: Option<Expr>,
        split_by: Option<Expr>,
        body: Vec<TemplateNode>,
    },
}

fn first_word(tag: &str) -> &str {
    tag.split_whitespace().next().unwrap_or_default()
}

/// Parse nodes until one of the `stops` keywords. The stop tag itself is
/// left for the caller.
fn parse_block(
    segments: &[Segment],
    position: &mut usize,
    stops: &[&str],
) -> Result<Vec<TemplateNode>, TemplateError> {
    let mut nodes = Vec::new();
    while let Some(segment) = segments.get(*position) {
        match segment {
            Segment::Text(text) => {
                nodes.push(TemplateNode::Text(text.clone()));
                *position += 1;
            }
            Segment::Tag(tag) => {
                let keyword = first_word(tag);
                if stops.contains(&keyword) {
                    return Ok(nodes);
                }
                *position += 1;
                match keyword {
                    "if" => nodes.push(parse_if(segments, position, tag)?),
                    "for" => nodes.push(parse_for(segments, position, tag)?),
                    "elseif" | "else" | "endif" | "endfor" => {
                        return Err(TemplateError::UnexpectedTag(tag.clone()));
                    }
                    _ => nodes.push(TemplateNode::Print(parse_expression(tag)?)),
                }
            }
        }
    }
    if stops.is_empty() {
        Ok(nodes)
    } else {
        Err(TemplateError::MissingEnd(if stops.contains(&"endif") {
            "endif"
        } else {
            "endfor"
        }))
    }
}

fn parse_if(segments: &[Segment], position: &mut usize, tag: &str) -> Result<TemplateNode, TemplateError> {
    let mut branches = Vec::new();
    let mut condition = parse_expression(tag["if".len()..].trim())?;
    let mut otherwise = Vec::new();
    loop {
        let body = parse_block(segments, position, &["elseif", "else", "endif"])?;
        let Some(Segment::Tag(stop)) = segments.get(*position) else {
            return Err(TemplateError::MissingEnd("endif"));
        };
        *position += 1;
        match first_word(stop) {
            "elseif" => {
                branches.push((condition, body));
                condition = parse_expression(stop["elseif".len()..].trim())?;
            }
            "else" => {
                branches.push((condition, body));
                otherwise = parse_block(segments, position, &["endif"])?;
                *position += 1;
                break;
            }
            _ => {
                branches.push((condition, body));
                break;
            }
        }
    }
    Ok(TemplateNode::If { branches, otherwise })
}

fn parse_for(segments: &[Segment], position: &mut usize, tag: &str) -> Result<TemplateNode, TemplateError> {
    let syntax_error = |message: &str| TemplateError::Syntax {
        expression: tag.to_owned(),
        message: message.to_owned(),
    };
    let rest = tag["for".len()..].trim();
    let (variable, rest) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| syntax_error("expected `for NAME in EXPRESSION`"))?;
    let rest = rest
        .trim_start()
        .strip_prefix("in")
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .ok_or_else(|| syntax_error("expected `in`"))?;

    let mut tokens = tokenize_expression(rest)?;
    let mut options: Vec<(String, Vec<ExprToken>)> = Vec::new();
    while let Some(index) = tokens
        .iter()
        .rposition(|token| matches!(token, ExprToken::Word(word) if word == "join_with" || word == "split_by"))
    {
        let option = tokens.split_off(index);
        let mut option = option.into_iter();
        if let Some(ExprToken::Word(name)) = option.next() {
            options.push((name, option.collect()));
        }
    }
    let iterable = ExprParser::new(rest, tokens).parse()?;
    let mut join_with = None;
    let mut split_by = None;
    for (name, tokens) in options {
        let expression = ExprParser::new(rest, tokens).parse()?;
        if name == "join_with" {
            join_with = Some(expression);
        } else {
            split_by = Some(expression);
        }
    }

    let body = parse_block(segments, position, &["endfor"])?;
    *position += 1;
    Ok(TemplateNode::For {
        variable: variable.trim_start_matches('$').to_owned(),
        iterable,
        join_with,
        split_by,
        body,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    Variable(Vec<String>),
    Str(String),
    Int(i64),
    Word(String),
    Op(&'static str),
    Open,
    Close,
}

fn tokenize_expression(source: &str) -> Result<Vec<ExprToken>, TemplateError> {
    let syntax_error = |message: String| TemplateError::Syntax {
        expression: source.to_owned(),
        message,
    };
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(ExprToken::Open),
            ')' => tokens.push(ExprToken::Close),
            '=' | '!' => {
                if chars.next_if(|(_, next)| *next == '=').is_none() {
                    return Err(syntax_error(format!("unexpected `{c}`")));
                }
                tokens.push(ExprToken::Op(if c == '=' { "==" } else { "!=" }));
            }
            '\'' | '"' => {
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, next)) = chars.next() {
                    match next {
                        '\\' => {
                            if let Some((_, escaped)) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        next if next == c => {
                            closed = true;
                            break;
                        }
                        next => value.push(next),
                    }
                }
                if !closed {
                    return Err(syntax_error("unterminated string".to_owned()));
                }
                tokens.push(ExprToken::Str(value));
            }
            '$' => {
                let mut path = String::new();
                while let Some((_, next)) = chars.next_if(|(_, next)| next.is_alphanumeric() || matches!(*next, '_' | '.')) {
                    path.push(next);
                }
                if path.is_empty() {
                    return Err(syntax_error(format!("empty variable at {start}")));
                }
                tokens.push(ExprToken::Variable(
                    path.split('.').filter(|part| !part.is_empty()).map(str::to_owned).collect(),
                ));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut number = String::from(c);
                while let Some((_, digit)) = chars.next_if(|(_, next)| next.is_ascii_digit()) {
                    number.push(digit);
                }
                let value = number
                    .parse()
                    .map_err(|_| syntax_error(format!("invalid number `{number}`")))?;
                tokens.push(ExprToken::Int(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some((_, next)) = chars.next_if(|(_, next)| next.is_alphanumeric() || *next == '_') {
                    word.push(next);
                }
                tokens.push(ExprToken::Word(word));
            }
            c => return Err(syntax_error(format!("unexpected `{c}`"))),
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Variable(Vec<String>),
    Coerce(Box<Expr>, Coercion),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Equals(Box<Expr>, Box<Expr>, bool),
    Contains(Box<Expr>, Box<Expr>),
    Matches(Box<Expr>, Regex),
}

#[derive(Debug, Clone, Copy)]
enum Coercion {
    Stripped,
    Lowercase,
    Uppercase,
    Title,
    Capitalize,
    Length,
}

impl Coercion {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "stripped" => Self::Stripped,
            "lowercase" => Self::Lowercase,
            "uppercase" => Self::Uppercase,
            "title" => Self::Title,
            "capitalize" => Self::Capitalize,
            "length" => Self::Length,
            _ => return None,
        })
    }

    fn apply(self, value: Value) -> Value {
        if let Self::Length = self {
            let length = match &value {
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => other.to_string().chars().count(),
            };
            return Value::Int(i64::try_from(length).unwrap_or(i64::MAX));
        }
        let text = value.to_string();
        Value::Str(match self {
            Self::Stripped => text.trim().to_owned(),
            Self::Lowercase => text.to_lowercase(),
            Self::Uppercase => text.to_uppercase(),
            Self::Title => text
                .split(' ')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" "),
            Self::Capitalize => capitalize(&text),
            Self::Length => text,
        })
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn parse_expression(source: &str) -> Result<Expr, TemplateError> {
    let tokens = tokenize_expression(source)?;
    ExprParser::new(source, tokens).parse()
}

/// Recursive descent over expression tokens, loosest binding first:
/// `or`, `and`, `not`, comparisons, `as` coercions, atoms.
struct ExprParser<'s> {
    source: &'s str,
    tokens: Vec<ExprToken>,
    position: usize,
}

impl<'s> ExprParser<'s> {
    fn new(source: &'s str, tokens: Vec<ExprToken>) -> Self {
        Self {
            source,
            tokens,
            position: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            expression: self.source.to_owned(),
            message: message.into(),
        }
    }

    fn parse(mut self) -> Result<Expr, TemplateError> {
        if self.tokens.is_empty() {
            return Err(self.error("empty expression"));
        }
        let expr = self.or()?;
        match self.tokens.get(self.position) {
            None => Ok(expr),
            Some(token) => Err(self.error(format!("unexpected {token:?}"))),
        }
    }

    fn peek_word(&self, word: &str) -> bool {
        matches!(self.tokens.get(self.position), Some(ExprToken::Word(w)) if w == word)
    }

    fn next(&mut self) -> Option<ExprToken> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn or(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.and()?;
        while self.peek_word("or") {
            self.position += 1;
            left = Expr::Or(Box::new(left), Box::new(self.and()?));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.not()?;
        while self.peek_word("and") {
            self.position += 1;
            left = Expr::And(Box::new(left), Box::new(self.not()?));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, TemplateError> {
        if self.peek_word("not") {
            self.position += 1;
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, TemplateError> {
        let left = self.coerced()?;
        match self.tokens.get(self.position) {
            Some(ExprToken::Op(op)) => {
                let equal = *op == "==";
                self.position += 1;
                let right = self.coerced()?;
                Ok(Expr::Equals(Box::new(left), Box::new(right), equal))
            }
            Some(ExprToken::Word(word)) if word == "contains" => {
                self.position += 1;
                Ok(Expr::Contains(Box::new(left), Box::new(self.coerced()?)))
            }
            Some(ExprToken::Word(word)) if word == "matches_regex" => {
                self.position += 1;
                let Some(ExprToken::Str(pattern)) = self.next() else {
                    return Err(self.error("matches_regex needs a string literal"));
                };
                Ok(Expr::Matches(Box::new(left), Regex::new(&pattern)?))
            }
            _ => Ok(left),
        }
    }

    fn coerced(&mut self) -> Result<Expr, TemplateError> {
        let mut expr = self.atom()?;
        while self.peek_word("as") {
            self.position += 1;
            let Some(ExprToken::Word(name)) = self.next() else {
                return Err(self.error("expected a coercion after `as`"));
            };
            let coercion = Coercion::from_name(&name).ok_or(TemplateError::UnknownCoercion(name))?;
            expr = Expr::Coerce(Box::new(expr), coercion);
        }
        Ok(expr)
    }

    fn atom(&mut self) -> Result<Expr, TemplateError> {
        match self.next() {
            Some(ExprToken::Variable(path)) => Ok(Expr::Variable(path)),
            Some(ExprToken::Str(value)) => Ok(Expr::Literal(Value::Str(value))),
            Some(ExprToken::Int(value)) => Ok(Expr::Literal(Value::Int(value))),
            Some(ExprToken::Word(word)) if word == "true" || word == "false" => {
                Ok(Expr::Literal(Value::Bool(word == "true")))
            }
            Some(ExprToken::Open) => {
                let expr = self.or()?;
                match self.next() {
                    Some(ExprToken::Close) => Ok(expr),
                    _ => Err(self.error("expected `)`")),
                }
            }
            Some(token) => Err(self.error(format!("unexpected {token:?}"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

struct Renderer<'c> {
    context: &'c TemplateContext,
    locals: Vec<(String, Value)>,
}

impl Renderer<'_> {
    fn lookup(&self, name: &str) -> Value {
        self.locals
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .or_else(|| self.context.get(name).cloned())
            .unwrap_or_default()
    }

    fn evaluate(&self, expr: &Expr) -> Value {
        match expr {
            Expr::Literal(value) => value.clone(),
            Expr::Variable(path) => {
                let mut parts = path.iter();
                let mut value = parts.next().map(|name| self.lookup(name)).unwrap_or_default();
                for part in parts {
                    value = value.get(part);
                }
                value
            }
            Expr::Coerce(inner, coercion) => coercion.apply(self.evaluate(inner)),
            Expr::Not(inner) => Value::Bool(!self.evaluate(inner).is_truthy()),
            Expr::And(left, right) => {
                Value::Bool(self.evaluate(left).is_truthy() && self.evaluate(right).is_truthy())
            }
            Expr::Or(left, right) => {
                Value::Bool(self.evaluate(left).is_truthy() || self.evaluate(right).is_truthy())
            }
            Expr::Equals(left, right, equal) => {
                let same = self.evaluate(left).to_string() == self.evaluate(right).to_string();
                Value::Bool(same == *equal)
            }
            Expr::Contains(haystack, needle) => {
                Value::Bool(self.evaluate(haystack).contains(&self.evaluate(needle)))
            }
            Expr::Matches(value, regex) => Value::Bool(regex.is_match(&self.evaluate(value).to_string())),
        }
    }

    fn render(&mut self, nodes: &[TemplateNode], out: &mut String) -> Result<(), TemplateError> {
        for node in nodes {
            match node {
                TemplateNode::Text(text) => out.push_str(text),
                TemplateNode::Print(expr) => out.push_str(&self.evaluate(expr).to_string()),
                TemplateNode::If { branches, otherwise } => {
                    let body = branches
                        .iter()
                        .find(|(condition, _)| self.evaluate(condition).is_truthy())
                        .map_or(otherwise.as_slice(), |(_, body)| body.as_slice());
                    self.render(body, out)?;
                }
                TemplateNode::For {
                    variable,
                    iterable,
                    join_with,
                    split_by,
                    body,
                } => {
                    let value = self.evaluate(iterable);
                    let items = match split_by {
                        Some(separator) => {
                            let separator = self.evaluate(separator).to_string();
                            let text = value.to_string();
                            if separator.is_empty() || text.is_empty() {
                                value.items()
                            } else {
                                text.split(separator.as_str()).map(Value::from).collect()
                            }
                        }
                        None => value.items(),
                    };
                    let separator = join_with.as_ref().map(|expr| self.evaluate(expr).to_string());
                    let length = items.len();
                    for (index, item) in items.into_iter().enumerate() {
                        if index > 0
                            && let Some(separator) = &separator
                        {
                            out.push_str(separator);
                        }
                        let loop_info = BTreeMap::from([
                            ("index".to_owned(), Value::Int(i64::try_from(index + 1).unwrap_or(i64::MAX))),
                            ("index0".to_owned(), Value::Int(i64::try_from(index).unwrap_or(i64::MAX))),
                            ("first".to_owned(), Value::Bool(index == 0)),
                            ("last".to_owned(), Value::Bool(index + 1 == length)),
                            ("length".to_owned(), Value::Int(i64::try_from(length).unwrap_or(i64::MAX))),
                        ]);
                        self.locals.push(("loop".to_owned(), Value::Map(loop_info)));
                        self.locals.push((variable.clone(), item));
                        let result = self.render(body, out);
                        self.locals.truncate(self.locals.len() - 2);
                        result?;
                    }
                }
            }
        }
        Ok(())
    }
}
