pub mod diff;
pub mod features;
pub mod markers;
pub mod method;
pub mod tokenizer;

pub use diff::{
    CodeDiff, EditGraph, EditNode, EditType, NodeId, TokenCommand, coarse_diff_structure,
    compute_code_diffs, compute_minimal_comment_diffs, frequency, full_replace_span,
    valid_positions, valid_positions_in_text,
};
pub use features::{
    CodeFeatureRow, CommentFeatureRow, JAVA_KEYWORDS, NUM_CODE_FEATURES, NUM_NL_FEATURES,
    STOP_WORDS, code_features, comment_features, flatten_features, sub_token_labels,
};
pub use markers::DiffCommand;
pub use method::{
    MethodFeatures, MethodSignature, extract_method_code, parse_signature, return_statements,
};
pub use tokenizer::{
    TokenRule, has_letters, strip_comment_decoration, sub_tokenize_code, sub_tokenize_comment,
    sub_tokenize_text, sub_tokenize_tokens, tokenize_code, tokenize_comment, tokenize_text,
    tokenize_text_with,
};
