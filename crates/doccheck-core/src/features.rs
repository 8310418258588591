use std::collections::{HashMap, HashSet};

use crate::diff::CodeDiff;
use crate::markers::{DELETE, DiffCommand, INSERT, KEEP, REPLACE_NEW, is_edit};
use crate::method::MethodFeatures;
use crate::tokenizer::{PARAM_TAG, RETURN_TAG, sub_tokenize_tokens};

pub const NUM_CODE_FEATURES: usize = 19;
pub const NUM_NL_FEATURES: usize = 53;

/// Slot offset of the part-of-speech one-hot block in comment rows.
const POS_OFFSET: usize = 17;
/// Every comment subtoken is tagged as "other"; no tagger runs.
const OTHER_POS_INDEX: usize = 35;

pub type CodeFeatureRow = [u32; NUM_CODE_FEATURES];
pub type CommentFeatureRow = [u32; NUM_NL_FEATURES];

pub const STOP_WORDS: [&str; 179] = [
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

pub const JAVA_KEYWORDS: [&str; 49] = [
    "abstract",
    "assert",
    "boolean",
    "break",
    "byte",
    "case",
    "catch",
    "char",
    "class",
    "continue",
    "default",
    "do",
    "double",
    "else",
    "enum",
    "extends",
    "final",
    "finally",
    "float",
    "for",
    "if",
    "implements",
    "import",
    "instanceof",
    "int",
    "interface",
    "long",
    "native",
    "new",
    "null",
    "package",
    "private",
    "protected",
    "public",
    "return",
    "short",
    "static",
    "strictfp",
    "super",
    "switch",
    "synchronized",
    "this",
    "throw",
    "throws",
    "transient",
    "try",
    "void",
    "volatile",
    "while",
];

/// Overlap of a token with the old and new versions of one method feature.
struct OverlapSets<'a> {
    old: HashSet<&'a str>,
    new: HashSet<&'a str>,
}

impl<'a> OverlapSets<'a> {
    fn new(old: HashSet<&'a str>, new: HashSet<&'a str>) -> Self {
        Self { old, new }
    }

    /// 0 both versions, 1 old only, 2 new only, 3 neither.
    fn class_of(&self, token: &str) -> usize {
        match (self.old.contains(token), self.new.contains(token)) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        }
    }
}

fn is_operator(token: &str) -> bool {
    token.chars().all(|ch| !ch.is_alphanumeric())
}

/// Features of the flat code span sequence, one row per span token.
///
/// Rows line up with the padded code ids: truncated to `max_code_len` and
/// zero-filled past the end of the input.
pub fn code_features<S: AsRef<str>, C: AsRef<str>>(
    span_sequence: &[S],
    comment_sub_tokens: &[C],
    old_features: &MethodFeatures,
    new_features: &MethodFeatures,
    max_code_len: usize,
) -> Vec<CodeFeatureRow> {
    let types = OverlapSets::new(old_features.return_type_set(), new_features.return_type_set());
    let statements = OverlapSets::new(
        old_features.return_statement_set(),
        new_features.return_statement_set(),
    );
    let comment_set = comment_sub_tokens
        .iter()
        .map(|token| token.as_ref())
        .collect::<HashSet<&str>>();

    let mut features = vec![[0u32; NUM_CODE_FEATURES]; max_code_len];
    let mut last_command = "";

    for (row, token) in features.iter_mut().zip(span_sequence) {
        let token = token.as_ref();
        row[types.class_of(token)] = 1;
        row[4 + statements.class_of(token)] = 1;

        if is_edit(token) {
            row[8] = 1;
        } else if JAVA_KEYWORDS.contains(&token) {
            row[9] = 1;
        } else if is_operator(token) {
            row[10] = 1;
        } else if comment_set.contains(token) {
            row[11] = 1;
        }

        if is_edit(token) {
            last_command = token;
        } else {
            let slot = match last_command {
                KEEP => 12,
                INSERT => 13,
                DELETE => 14,
                REPLACE_NEW => 15,
                _ => 16,
            };
            row[slot] = 1;
        }
        // 17 and 18 (code subtoken label and index) are never set.
    }

    features
}

/// Features of the comment subtokens, one row per subtoken.
///
/// `comment_tokens` are the surface tokens the subtokens were split from;
/// they drive the split flag and index slots.
pub fn comment_features<T: AsRef<str>, S: AsRef<str>>(
    comment_tokens: &[T],
    comment_sub_tokens: &[S],
    code_diff: &CodeDiff,
    old_features: &MethodFeatures,
    new_features: &MethodFeatures,
    max_comment_len: usize,
) -> Vec<CommentFeatureRow> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in comment_sub_tokens {
        *counts.entry(token.as_ref()).or_default() += 1;
    }
    let duplicates = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(token, _)| token)
        .collect::<HashSet<_>>();

    let code_tokens = |command: DiffCommand| code_diff.tokens_with(command).collect::<HashSet<_>>();
    let diff_sets = [
        code_tokens(DiffCommand::Insert),
        code_tokens(DiffCommand::Keep),
        code_tokens(DiffCommand::Delete),
        code_tokens(DiffCommand::ReplaceOld),
        code_tokens(DiffCommand::ReplaceNew),
    ];

    let types = OverlapSets::new(old_features.return_type_set(), new_features.return_type_set());
    let statements = OverlapSets::new(
        old_features.return_statement_set(),
        new_features.return_statement_set(),
    );

    let labels = sub_token_labels(comment_tokens, true);

    let mut features = vec![[0u32; NUM_NL_FEATURES]; max_comment_len];
    for (index, (row, sub_token)) in features.iter_mut().zip(comment_sub_tokens).enumerate() {
        let token = sub_token.as_ref().to_lowercase();
        let token = token.as_str();

        row[types.class_of(token)] = 1;
        row[4 + statements.class_of(token)] = 1;
        for (offset, set) in diff_sets.iter().enumerate() {
            row[8 + offset] = u32::from(set.contains(token));
        }
        row[13] = u32::from(STOP_WORDS.contains(&token));
        row[14] = u32::from(duplicates.contains(token));

        let (split, position) = labels.get(index).copied().unwrap_or_default();
        row[15] = u32::from(split);
        row[16] = position;
        row[POS_OFFSET + OTHER_POS_INDEX] = 1;
    }

    features
}

/// For every subtoken of `tokens`: whether its token was split, and its index inside it.
///
/// With `parse_comment` the doc tags `@return` and `@param` count as one piece.
pub fn sub_token_labels<S: AsRef<str>>(tokens: &[S], parse_comment: bool) -> Vec<(bool, u32)> {
    let mut labels = Vec::with_capacity(tokens.len());
    for token in tokens {
        let token = token.as_ref();
        let pieces = if parse_comment && (token == RETURN_TAG || token == PARAM_TAG) {
            1
        } else {
            sub_tokenize_tokens(&[token], true).len()
        };

        if pieces == 1 {
            labels.push((false, 0));
        } else {
            labels.extend((0..pieces as u32).map(|position| (true, position)));
        }
    }
    labels
}

/// Row-major `f32` copy of a feature matrix, the layout the classifier takes.
pub fn flatten_features<const W: usize>(rows: &[[u32; W]]) -> Vec<f32> {
    rows.iter()
        .flat_map(|row| row.iter().map(|value| *value as f32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute_code_diffs;
    use crate::markers::{KEEP_END, REPLACE_END, REPLACE_OLD};

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|token| (*token).to_owned()).collect()
    }

    fn features(return_type: &[&str], return_statements: &[&str]) -> MethodFeatures {
        MethodFeatures {
            return_type: strings(return_type),
            return_statements: strings(return_statements),
            ..MethodFeatures::default()
        }
    }

    fn set_slots(row: &[u32]) -> Vec<usize> {
        row.iter()
            .enumerate()
            .filter(|(_, value)| **value != 0)
            .map(|(slot, _)| slot)
            .collect()
    }

    #[test]
    fn stop_words_contain_common_english() {
        assert!(STOP_WORDS.contains(&"the"));
        assert!(STOP_WORDS.contains(&"wouldn't"));
        assert!(!STOP_WORDS.contains(&"value"));
    }

    #[test]
    fn code_features_have_fixed_shape() {
        let old = MethodFeatures::default();
        let spans = strings(&[KEEP, "int", KEEP_END]);
        let rows = code_features(&spans, &Vec::<String>::new(), &old, &old, 5);
        assert_eq!(rows.len(), 5);
        assert!(rows[3..].iter().all(|row| row.iter().all(|value| *value == 0)));

        let truncated = code_features(&spans, &Vec::<String>::new(), &old, &old, 2);
        assert_eq!(truncated.len(), 2);
    }

    #[test]
    fn code_features_flag_markers_keywords_operators_and_comment_words() {
        let old = features(&["int"], &["count"]);
        let new = features(&["long"], &["count"]);
        let spans = strings(&[
            REPLACE_OLD, "int", REPLACE_NEW, "long", REPLACE_END, KEEP, "count", ";", KEEP_END,
        ]);
        let comment = strings(&["the", "count"]);
        let rows = code_features(&spans, &comment, &old, &new, 10);

        // marker: neither set for types and statements, edit flag, no command slot
        assert_eq!(set_slots(&rows[0]), vec![3, 7, 8]);
        // "int" after REPLACE_OLD: old-only type, keyword, unmatched command
        assert_eq!(set_slots(&rows[1]), vec![1, 7, 9, 16]);
        // "long" after REPLACE_NEW: new-only type, keyword
        assert_eq!(set_slots(&rows[3]), vec![2, 7, 9, 15]);
        // "count" after KEEP: shared return statement, appears in comment
        assert_eq!(set_slots(&rows[6]), vec![3, 4, 11, 12]);
        // ";" is an operator
        assert_eq!(set_slots(&rows[7]), vec![3, 7, 10, 12]);
    }

    #[test]
    fn comment_features_mark_diff_membership_and_reserved_slot() {
        let diff = compute_code_diffs(
            &strings(&["return", "old", "value", ";"]),
            &strings(&["return", "new", "value", ";"]),
        );
        let method = MethodFeatures::default();
        let tokens = strings(&["the", "oldValue", "value"]);
        let sub_tokens = strings(&["the", "old", "value", "value"]);
        let rows = comment_features(&tokens, &sub_tokens, &diff, &method, &method, 6);

        assert_eq!(rows.len(), 6);
        // "the": stop word, unsplit
        assert_eq!(set_slots(&rows[0]), vec![3, 7, 13, 52]);
        // "old": replaced in code, first piece of a split token
        assert_eq!(set_slots(&rows[1]), vec![3, 7, 11, 15, 52]);
        // "value": kept in code, duplicate, second piece of "oldValue"
        assert_eq!(set_slots(&rows[2]), vec![3, 7, 9, 14, 15, 16, 52]);
        assert_eq!(rows[2][16], 1);
        assert!(rows[4].iter().all(|value| *value == 0));
    }

    #[test]
    fn sub_token_labels_mark_split_tokens() {
        let labels = sub_token_labels(&["@return", "maxValue", "of"], true);
        assert_eq!(labels, vec![(false, 0), (true, 0), (true, 1), (false, 0)]);

        let unparsed = sub_token_labels(&["@param"], false);
        assert_eq!(unparsed, vec![(false, 0)]);
    }

    #[test]
    fn flatten_features_is_row_major() {
        let rows = [[1u32, 0, 2], [0, 3, 0]];
        assert_eq!(flatten_features(&rows[..]), vec![1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
    }
}
