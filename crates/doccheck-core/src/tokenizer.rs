use std::sync::LazyLock;

use regex::Regex;

/// Markup dropped entirely when tags are removed.
const REDUNDANT_TAGS: [&str; 8] = [
    "{",
    "}",
    "@code",
    "@docRoot",
    "@inheritDic",
    "@link",
    "@linkplain",
    "@value",
];

/// Doc-comment field tags elided as literal substrings when tags are removed.
const COMMENT_TAGS: [&str; 6] = [
    "@return",
    "@ return",
    "@param",
    "@ param",
    "@throws",
    "@ throws",
];

pub const RETURN_TAG: &str = "@return";
pub const PARAM_TAG: &str = "@param";

static DEFAULT_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9]+|[^\sa-zA-Z0-9]|[^_\sa-zA-Z0-9]").expect("valid token regex")
});
static NO_UNDERSCORE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9]+|[^_\sa-zA-Z0-9]").expect("valid token regex")
});
static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<.*?>").expect("valid html tag regex"));
static CAMEL_CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("valid camel case regex"));

/// Character classes a token may be drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenRule {
    /// Alphanumeric runs plus any other single non-whitespace character.
    #[default]
    Standard,
    /// Like [`TokenRule::Standard`] but underscores are never emitted.
    NoUnderscore,
}

impl TokenRule {
    fn regex(self) -> &'static Regex {
        match self {
            Self::Standard => &DEFAULT_TOKEN_RE,
            Self::NoUnderscore => &NO_UNDERSCORE_TOKEN_RE,
        }
    }
}

/// Alphanumeric runs become tokens and every other non-whitespace character
/// stands alone.
pub fn tokenize_text(text: &str, remove_tags: bool) -> Vec<String> {
    tokenize_text_with(text, remove_tags, TokenRule::Standard)
}

pub fn tokenize_text_with(text: &str, remove_tags: bool, rule: TokenRule) -> Vec<String> {
    let mut cleaned = text.to_owned();
    if remove_tags {
        cleaned = remove_comment_tags(&cleaned);
        cleaned = remove_html_tags(&cleaned);
    }
    let cleaned = cleaned.replace('\n', " ");

    rule.regex()
        .find_iter(cleaned.trim())
        .map(|found| found.as_str().to_owned())
        .collect()
}

pub fn sub_tokenize_text(text: &str, remove_tags: bool, lowercase: bool) -> Vec<String> {
    let tokens = tokenize_text(text, remove_tags);
    sub_tokenize_tokens(&tokens, lowercase)
}

/// Splits every token at camelCase boundaries: `tokenABC` becomes `token`, `ABC`.
pub fn sub_tokenize_tokens<S: AsRef<str>>(tokens: &[S], lowercase: bool) -> Vec<String> {
    let mut sub_tokens = Vec::with_capacity(tokens.len());
    for token in tokens {
        let spaced = CAMEL_CASE_RE.replace_all(token.as_ref().trim(), "$1 $2");
        sub_tokens.extend(spaced.split(' ').map(|piece| {
            if lowercase {
                piece.to_lowercase()
            } else {
                piece.to_owned()
            }
        }));
    }
    sub_tokens
}

pub fn tokenize_comment(comment: &str) -> Vec<String> {
    let stripped = strip_comment_decoration(comment);
    match tag_prefix(&stripped) {
        Some(prefix) => {
            let mut tokens = vec![prefix.to_owned()];
            tokens.extend(tokenize_text(&stripped, true));
            tokens
        }
        None => tokenize_text(&stripped, false),
    }
}

pub fn sub_tokenize_comment(comment: &str) -> Vec<String> {
    let stripped = strip_comment_decoration(comment);
    match tag_prefix(&stripped) {
        Some(prefix) => {
            let mut tokens = vec![prefix.to_owned()];
            tokens.extend(sub_tokenize_text(&stripped, true, true));
            tokens
        }
        None => sub_tokenize_text(&stripped, false, true),
    }
}

pub fn tokenize_code(code: &str) -> Vec<String> {
    tokenize_text(code, false)
}

pub fn sub_tokenize_code(code: &str, lowercase: bool) -> Vec<String> {
    let tokens = tokenize_code(code);
    let mut processed = Vec::with_capacity(tokens.len());
    for token in &tokens {
        processed.extend(
            DEFAULT_TOKEN_RE
                .find_iter(token)
                .map(|found| found.as_str().to_owned()),
        );
    }
    sub_tokenize_tokens(&processed, lowercase)
}

/// Subtokens carrying no letters (numbers, punctuation) are noise for metrics.
pub fn has_letters(sub_token: &str) -> bool {
    sub_token.chars().any(char::is_alphabetic)
}

pub fn strip_comment_decoration(comment: &str) -> String {
    comment.chars().filter(|ch| *ch != '/' && *ch != '*').collect()
}

// Both tags map to the `@return` marker; the pretrained models were fed this way.
fn tag_prefix(stripped_comment: &str) -> Option<&'static str> {
    let trimmed = stripped_comment.trim();
    if trimmed.starts_with(RETURN_TAG) || trimmed.starts_with(PARAM_TAG) {
        Some(RETURN_TAG)
    } else {
        None
    }
}

fn remove_html_tags(line: &str) -> String {
    let mut cleaned = HTML_TAG_RE.replace_all(line, "").into_owned();
    for tag in REDUNDANT_TAGS {
        cleaned = cleaned.replace(tag, "");
    }
    cleaned
}

fn remove_comment_tags(line: &str) -> String {
    let mut cleaned = line.to_owned();
    for tag in COMMENT_TAGS {
        cleaned = cleaned.replace(tag, "");
    }
    cleaned
}
