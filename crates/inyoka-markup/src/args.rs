//! Macro and parser arguments.
//!
//! Raw arguments are collected by the parser into [`Arguments`]. Macros and
//! parsers declare a schema of [`ArgumentSpec`]s; [`bind_arguments`] coerces
//! the raw values against it. Coercion never fails: unusable values fall
//! back to the declared default.

use serde::{Deserialize, Serialize};

/// Raw positional and keyword arguments in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arguments {
    pub positional: Vec<String>,
    pub keyword: Vec<(String, String)>,
}

impl Arguments {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    pub fn keyword(&self, name: &str) -> Option<&str> {
        self.keyword
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Write the arguments back as an argument string.
    pub fn to_source(&self) -> String {
        let positional = self.positional.iter().map(|value| quote_value(value));
        let keyword = self
            .keyword
            .iter()
            .map(|(key, value)| format!("{key}={}", quote_value(value)));
        positional.chain(keyword).collect::<Vec<_>>().join(", ")
    }
}

/// Quote an argument value if it would not survive lexing unquoted.
pub fn quote_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.trim() != value
        || value
            .chars()
            .any(|c| matches!(c, ',' | '(' | ')' | '"' | '\'' | '=' | '\\' | ']' | '\n'));
    if needs_quotes {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        value.to_owned()
    }
}

/// Remove the quotes of a string argument and resolve backslash escapes.
pub fn unquote_value(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// A coerced argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Source representation; booleans are written as `ja` / `nein`.
    fn to_source(&self) -> String {
        match self {
            Self::Str(value) => quote_value(value),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Bool(true) => "ja".to_owned(),
            Self::Bool(false) => "nein".to_owned(),
            Self::None => String::new(),
        }
    }
}

/// The declared type of an argument.
#[derive(Debug, Clone, Copy)]
pub enum ArgType {
    Str,
    Int,
    Float,
    Bool,
    /// Accepted spellings mapped to the stored value.
    Choice(&'static [(&'static str, &'static str)]),
}

/// Default value of an argument.
#[derive(Debug, Clone, Copy)]
pub enum ArgDefault {
    Str(&'static str),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
}

impl ArgDefault {
    fn value(self) -> ArgValue {
        match self {
            Self::Str(value) => ArgValue::Str(value.to_owned()),
            Self::Int(value) => ArgValue::Int(value),
            Self::Float(value) => ArgValue::Float(value),
            Self::Bool(value) => ArgValue::Bool(value),
            Self::None => ArgValue::None,
        }
    }
}

/// One entry of an argument schema.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentSpec {
    pub name: &'static str,
    pub ty: ArgType,
    pub default: ArgDefault,
}

impl ArgumentSpec {
    pub const fn string(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            ty: ArgType::Str,
            default: ArgDefault::Str(default),
        }
    }

    /// A string argument that is absent unless given.
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            ty: ArgType::Str,
            default: ArgDefault::None,
        }
    }

    pub const fn int(name: &'static str, default: i64) -> Self {
        Self {
            name,
            ty: ArgType::Int,
            default: ArgDefault::Int(default),
        }
    }

    pub const fn float(name: &'static str, default: f64) -> Self {
        Self {
            name,
            ty: ArgType::Float,
            default: ArgDefault::Float(default),
        }
    }

    pub const fn boolean(name: &'static str, default: bool) -> Self {
        Self {
            name,
            ty: ArgType::Bool,
            default: ArgDefault::Bool(default),
        }
    }

    pub const fn choice(
        name: &'static str,
        table: &'static [(&'static str, &'static str)],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            ty: ArgType::Choice(table),
            default: ArgDefault::Str(default),
        }
    }

    fn coerce(&self, raw: &str) -> Option<ArgValue> {
        let raw = raw.trim();
        match self.ty {
            ArgType::Str => Some(ArgValue::Str(raw.to_owned())),
            ArgType::Int => raw.parse().ok().map(ArgValue::Int),
            ArgType::Float => raw.parse().ok().map(ArgValue::Float),
            ArgType::Bool => Some(ArgValue::Bool(parse_bool(raw))),
            ArgType::Choice(table) => table
                .iter()
                .find(|(key, _)| *key == raw)
                .map(|(_, value)| ArgValue::Str((*value).to_owned())),
        }
    }
}

/// Truthy words in German and English; everything else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "ja" | "wahr" | "positiv" | "1" | "true" | "yes" | "on"
    )
}

/// An argument after coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundArgument {
    pub name: String,
    pub value: ArgValue,
    pub is_kwarg: bool,
    pub is_default: bool,
}

/// Coerce raw arguments against a schema.
///
/// Positional values bind by index, keyword values by name; positional
/// values win when both are given.
pub fn bind_arguments(specs: &[ArgumentSpec], arguments: &Arguments) -> Vec<BoundArgument> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let (raw, is_kwarg) = match arguments.positional.get(index) {
                Some(value) => (Some(value.as_str()), false),
                None => (arguments.keyword(spec.name), true),
            };
            let coerced = raw.and_then(|raw| spec.coerce(raw));
            let is_default = coerced.is_none();
            BoundArgument {
                name: spec.name.to_owned(),
                value: coerced.unwrap_or_else(|| spec.default.value()),
                is_kwarg: is_kwarg && !is_default,
                is_default,
            }
        })
        .collect()
}

/// Write coerced arguments back as an argument string, skipping defaults.
pub fn dump_argstring(bound: &[BoundArgument]) -> String {
    bound
        .iter()
        .filter(|argument| !argument.is_default)
        .map(|argument| {
            let value = argument.value.to_source();
            if argument.is_kwarg {
                format!("{}={value}", argument.name)
            } else {
                value
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn lookup<'a>(bound: &'a [BoundArgument], name: &str) -> &'a ArgValue {
    bound
        .iter()
        .find(|argument| argument.name == name)
        .map_or(&ArgValue::None, |argument| &argument.value)
}

/// Serializable record of a macro invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroCall {
    /// Identifier of the implementation, independent of the localized name.
    pub id: String,
    /// The name as written in the source.
    pub name: String,
    pub arguments: Arguments,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bound: Vec<BoundArgument>,
    pub block: bool,
}

impl MacroCall {
    pub fn arg(&self, name: &str) -> &ArgValue {
        lookup(&self.bound, name)
    }

    /// A string argument, empty when absent.
    pub fn str_arg(&self, name: &str) -> &str {
        self.arg(name).as_str().unwrap_or_default()
    }

    pub fn int_arg(&self, name: &str) -> i64 {
        self.arg(name).as_int().unwrap_or_default()
    }

    pub fn bool_arg(&self, name: &str) -> bool {
        self.arg(name).as_bool().unwrap_or_default()
    }

    /// The argument string as it would appear in the source.
    pub fn argstring(&self) -> String {
        if self.bound.is_empty() {
            self.arguments.to_source()
        } else {
            dump_argstring(&self.bound)
        }
    }

    /// The macro invocation as markup.
    pub fn wiki_representation(&self) -> String {
        let args = self.argstring();
        if args.is_empty() {
            format!("[[{}]]", self.name)
        } else {
            format!("[[{}({args})]]", self.name)
        }
    }
}

/// Serializable record of a parser block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserCall {
    pub id: String,
    pub name: String,
    pub arguments: Arguments,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bound: Vec<BoundArgument>,
    pub data: String,
}

impl ParserCall {
    pub fn arg(&self, name: &str) -> &ArgValue {
        lookup(&self.bound, name)
    }

    pub fn str_arg(&self, name: &str) -> &str {
        self.arg(name).as_str().unwrap_or_default()
    }

    pub fn argstring(&self) -> String {
        if self.bound.is_empty() {
            self.arguments.to_source()
        } else {
            dump_argstring(&self.bound)
        }
    }

    /// The parser block as markup.
    pub fn wiki_representation(&self) -> String {
        let args = self.argstring();
        let header = if args.is_empty() {
            format!("#!{}", self.name)
        } else {
            format!("#!{} {args}", self.name)
        };
        format!("{{{{{{{header}\n{}\n}}}}}}", self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SPECS: &[ArgumentSpec] = &[
        ArgumentSpec::string("pattern", ""),
        ArgumentSpec::boolean("case_sensitive", true),
        ArgumentSpec::int("per_page", 50),
        ArgumentSpec::choice("type", &[("arabic", "arabic"), ("ALPHA", "alphaupper")], "arabic"),
    ];

    fn args(positional: &[&str], keyword: &[(&str, &str)]) -> Arguments {
        Arguments {
            positional: positional.iter().map(|v| (*v).to_owned()).collect(),
            keyword: keyword
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        }
    }

    #[test]
    fn test_bind_positional_and_keyword() {
        let bound = bind_arguments(SPECS, &args(&["Wiki/*"], &[("per_page", "3")]));
        assert_eq!(lookup(&bound, "pattern"), &ArgValue::Str("Wiki/*".to_owned()));
        assert_eq!(lookup(&bound, "per_page"), &ArgValue::Int(3));
        assert!(bound[2].is_kwarg);
        assert!(bound[1].is_default);
    }

    #[test]
    fn test_coercion_failure_uses_default() {
        let bound = bind_arguments(SPECS, &args(&[], &[("per_page", "many"), ("type", "bogus")]));
        assert_eq!(lookup(&bound, "per_page"), &ArgValue::Int(50));
        assert_eq!(lookup(&bound, "type"), &ArgValue::Str("arabic".to_owned()));
        assert!(bound.iter().all(|b| b.is_default || b.name == "pattern"));
    }

    #[test]
    fn test_choice_maps_value() {
        let bound = bind_arguments(SPECS, &args(&[], &[("type", "ALPHA")]));
        assert_eq!(lookup(&bound, "type"), &ArgValue::Str("alphaupper".to_owned()));
    }

    #[test]
    fn test_parse_bool() {
        for word in ["ja", "Wahr", "positiv", "1", "true", "YES", "on"] {
            assert!(parse_bool(word), "{word}");
        }
        for word in ["nein", "0", "false", ""] {
            assert!(!parse_bool(word), "{word}");
        }
    }

    #[test]
    fn test_dump_argstring_skips_defaults() {
        let bound = bind_arguments(SPECS, &args(&["A*"], &[("case_sensitive", "nein")]));
        assert_eq!(dump_argstring(&bound), "A*, case_sensitive=nein");
    }

    #[test]
    fn test_quote_value() {
        assert_eq!(quote_value("plain"), "plain");
        assert_eq!(quote_value("a, b"), "\"a, b\"");
        assert_eq!(quote_value(""), "\"\"");
        assert_eq!(unquote_value(&quote_value("say \"hi\"")), "say \"hi\"");
        assert_eq!(unquote_value("'single'"), "single");
    }

    #[test]
    fn test_macro_wiki_representation() {
        let call = MacroCall {
            id: "include".to_owned(),
            name: "Einbinden".to_owned(),
            arguments: args(&["./Intro"], &[]),
            bound: Vec::new(),
            block: true,
        };
        assert_eq!(call.wiki_representation(), "[[Einbinden(./Intro)]]");
    }

    #[test]
    fn test_parser_wiki_representation() {
        let call = ParserCall {
            id: "code".to_owned(),
            name: "code".to_owned(),
            arguments: args(&["rust"], &[]),
            bound: Vec::new(),
            data: "fn main() {}".to_owned(),
        };
        assert_eq!(call.wiki_representation(), "{{{#!code rust\nfn main() {}\n}}}");
    }
}
