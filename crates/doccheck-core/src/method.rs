use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::tokenizer::{sub_tokenize_code, tokenize_code};

const MODIFIERS: [&str; 12] = [
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "synchronized",
    "native",
    "strictfp",
    "default",
    "transient",
    "volatile",
];

// Literals are matched too so that comment markers inside them survive.
static COMMENT_OR_LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""(?:\\.|[^"\\])*"|'(?:\\.|[^'\\])*'|//[^\n]*|(?s:/\*.*?\*/)"#)
        .expect("valid comment regex")
});
static TRAILING_IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*$").expect("valid identifier regex"));
static RETURN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\breturn\b([^;]*);").expect("valid return regex"));

/// Structural features of a method: signature pieces and returned expressions.
///
/// [`MethodFeatures::from_source`] reads them from Java-like method text with
/// regexes and bracket counting. It is a heuristic, not a parser; callers
/// holding a real syntax tree should build this directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodFeatures {
    #[serde(default)]
    pub argument_names: Vec<String>,
    #[serde(default)]
    pub argument_types: Vec<String>,
    #[serde(default)]
    pub return_type: Vec<String>,
    #[serde(default)]
    pub return_statements: Vec<String>,
    #[serde(default)]
    pub method_name: Vec<String>,
}

/// Signature pieces before tokenization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub return_type: String,
    /// `(type, name)` in declaration order.
    pub arguments: Vec<(String, String)>,
}

impl MethodFeatures {
    /// Token features of `code`, subtokenized and lowercased when `sub_tokenize` is set.
    pub fn from_source(code: &str, sub_tokenize: bool) -> Self {
        let code = extract_method_code(code);
        let signature = parse_signature(&code).unwrap_or_default();
        let statements = return_statements(&code);

        let tokens = |text: &str| {
            if sub_tokenize {
                sub_tokenize_code(text, true)
            } else {
                tokenize_code(text)
            }
        };

        Self {
            argument_names: signature
                .arguments
                .iter()
                .flat_map(|(_, name)| tokens(name))
                .collect(),
            argument_types: signature
                .arguments
                .iter()
                .flat_map(|(kind, _)| tokens(kind))
                .collect(),
            return_type: tokens(&signature.return_type),
            return_statements: statements.iter().flat_map(|stmt| tokens(stmt)).collect(),
            method_name: tokens(&signature.name),
        }
    }

    pub fn return_type_set(&self) -> HashSet<&str> {
        self.return_type.iter().map(String::as_str).collect()
    }

    pub fn return_statement_set(&self) -> HashSet<&str> {
        self.return_statements.iter().map(String::as_str).collect()
    }
}

/// Method text with every `/* */` and `//` comment removed. String and char literals are kept.
pub fn extract_method_code(code: &str) -> String {
    let stripped = COMMENT_OR_LITERAL_RE.replace_all(code, |caps: &Captures<'_>| {
        let matched = &caps[0];
        if matched.starts_with('/') {
            String::new()
        } else {
            matched.to_owned()
        }
    });
    stripped.trim().to_owned()
}

/// Reads the declaration header of the first method in `code`.
pub fn parse_signature(code: &str) -> Option<MethodSignature> {
    let code = strip_annotations(code);
    let header_end = code
        .find(|ch: char| ch == '{' || ch == ';')
        .unwrap_or(code.len());
    let header = &code[..header_end];
    let open = header.find('(')?;
    let close = matching_paren(header, open)?;

    let before = &header[..open];
    let name_match = TRAILING_IDENT_RE.captures(before)?.get(1)?;
    let name = name_match.as_str().to_owned();

    let return_type = split_top_level(&before[..name_match.start()], char::is_whitespace)
        .into_iter()
        .filter(|word| !MODIFIERS.contains(&word.as_str()) && !word.starts_with('<'))
        .next_back()
        .unwrap_or_default();

    let arguments = split_top_level(&header[open + 1..close], |ch| ch == ',')
        .into_iter()
        .filter_map(|param| parse_parameter(&param))
        .collect();

    Some(MethodSignature {
        name,
        return_type,
        arguments,
    })
}

/// Expressions of every `return <expr>;` in `code`. Bare `return;` is skipped.
pub fn return_statements(code: &str) -> Vec<String> {
    RETURN_RE
        .captures_iter(code)
        .filter_map(|caps| caps.get(1))
        .map(|expr| expr.as_str().trim().to_owned())
        .filter(|expr| !expr.is_empty())
        .collect()
}

fn parse_parameter(param: &str) -> Option<(String, String)> {
    let words = split_top_level(param, char::is_whitespace)
        .into_iter()
        .filter(|word| word != "final")
        .collect::<Vec<_>>();
    let (name, kind) = words.split_last()?;
    if kind.is_empty() {
        return None;
    }
    Some((kind.join(" "), name.clone()))
}

/// `code` with every annotation, arguments included, replaced by a space.
fn strip_annotations(code: &str) -> String {
    let mut stripped = String::with_capacity(code.len());
    let mut rest = code;

    while let Some(at) = rest.find('@') {
        stripped.push_str(&rest[..at]);
        let after_at = &rest[at + 1..];
        if !after_at.starts_with(|ch: char| ch.is_alphabetic() || ch == '_') {
            stripped.push('@');
            rest = after_at;
            continue;
        }

        let name_len = after_at
            .find(|ch: char| !(ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '.'))
            .unwrap_or(after_at.len());
        let after_name = &after_at[name_len..];
        let arguments = after_name.trim_start();
        rest = if arguments.starts_with('(') {
            let open = after_name.len() - arguments.len();
            match matching_paren(after_name, open) {
                Some(close) => &after_name[close + 1..],
                None => after_name,
            }
        } else {
            after_name
        };
        stripped.push(' ');
    }

    stripped.push_str(rest);
    stripped
}

fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, ch) in text[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits at `is_separator` characters that are not nested in `<>`, `()` or `[]`.
fn split_top_level(text: &str, is_separator: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for ch in text.chars() {
        match ch {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if depth == 0 && is_separator(ch) {
            if !current.trim().is_empty() {
                parts.push(current.trim().to_owned());
            }
            current.clear();
        } else {
            current.push(ch);
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_owned());
    }
    parts
}
