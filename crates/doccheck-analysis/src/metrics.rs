use std::collections::HashSet;

use doccheck_core::{
    CodeDiff, compute_code_diffs, compute_minimal_comment_diffs, has_letters, sub_tokenize_code,
    sub_tokenize_comment,
};
use doccheck_infer::{SimilarityModel, VocabularyKind};
use serde::{Deserialize, Serialize};

use crate::AnalysisError;
use crate::change::MethodChange;

/// Statistics of one method change, as used for dataset filtering and labelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodMetric {
    pub is_renamed: bool,
    pub is_param_added: bool,
    pub is_param_removed: bool,
    pub is_return_type_changed: bool,
    pub is_param_type_changed: bool,
    pub is_param_renamed: bool,
    pub old_code_len: usize,
    pub new_code_len: usize,
    pub comment_len: usize,
    pub changed_code_len: usize,
    pub percentage_code_changed: f64,
    pub delete_comment_intersection_len: usize,
    pub percentage_comment_intersection_delete: f64,
    pub old_code_comment_sim: f64,
    pub new_code_comment_sim: f64,
    pub new_old_code_comment_sim_distance: f64,
    pub old_changed_comment_sim: f64,
    pub new_changed_comment_sim: f64,
    pub old_new_changed_sim_dist: f64,
    pub added_statement_size: usize,
    pub deleted_statement_size: usize,
}

/// Letter-bearing subtokens of both revisions and their diffs.
struct FilteredChange {
    old_code: Vec<String>,
    new_code: Vec<String>,
    comment: Vec<String>,
    code_diff: CodeDiff,
    comment_spans: Vec<String>,
}

impl FilteredChange {
    fn new(old_comment: &str, old_code: &str, new_comment: &str, new_code: &str) -> Self {
        let old_code = letter_tokens(sub_tokenize_code(old_code, true));
        let new_code = letter_tokens(sub_tokenize_code(new_code, true));
        let comment = letter_tokens(sub_tokenize_comment(new_comment));
        let old_comment = letter_tokens(sub_tokenize_comment(old_comment));

        let code_diff = compute_code_diffs(&old_code, &new_code);
        let comment_spans = compute_minimal_comment_diffs(&old_comment, &comment);

        Self {
            old_code,
            new_code,
            comment,
            code_diff,
            comment_spans,
        }
    }

    fn is_unchanged(&self) -> bool {
        self.code_diff.changed_code_len() == 0 && self.comment_spans.is_empty()
    }
}

fn letter_tokens(tokens: Vec<String>) -> Vec<String> {
    tokens.into_iter().filter(|token| has_letters(token)).collect()
}

/// False when neither the code nor the comment changed in any letter-bearing subtoken.
pub fn is_method_changed(
    old_comment: &str,
    old_code: &str,
    new_comment: &str,
    new_code: &str,
) -> bool {
    !FilteredChange::new(old_comment, old_code, new_comment, new_code).is_unchanged()
}

#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    similarity: SimilarityModel,
}

impl MetricsCalculator {
    pub fn new(similarity: SimilarityModel) -> Self {
        Self { similarity }
    }

    pub fn similarity_model(&self) -> &SimilarityModel {
        &self.similarity
    }

    /// Metric of `change`, or `None` when the change is trivial or one side has no tokens.
    pub fn calculate(&self, change: &MethodChange) -> Result<Option<MethodMetric>, AnalysisError> {
        let flags = change.refactoring_flags();
        let filtered = FilteredChange::new(
            &change.old_comment,
            &change.old_code,
            &change.new_comment,
            &change.new_code,
        );

        if filtered.is_unchanged() {
            tracing::debug!("skipping metric: code and comment unchanged");
            return Ok(None);
        }
        if filtered.old_code.is_empty()
            || filtered.new_code.is_empty()
            || filtered.comment.is_empty()
        {
            tracing::debug!(
                old_code_len = filtered.old_code.len(),
                new_code_len = filtered.new_code.len(),
                comment_len = filtered.comment.len(),
                "skipping metric: empty token sequence"
            );
            return Ok(None);
        }

        let FilteredChange {
            old_code,
            new_code,
            comment,
            code_diff,
            ..
        } = filtered;

        let changed_code_len = code_diff.changed_code_len();
        let removed = code_diff.removed_tokens();
        let added = code_diff.added_tokens();

        let deleted_or_replaced = removed.iter().map(String::as_str).collect::<HashSet<_>>();
        let delete_comment_intersection_len = comment
            .iter()
            .filter(|token| deleted_or_replaced.contains(token.as_str()))
            .count();

        let old_code_comment_sim = self.code_similarity(&old_code, &comment)?;
        let new_code_comment_sim = self.code_similarity(&new_code, &comment)?;
        let old_changed_comment_sim = self.changed_similarity(&removed, &comment)?;
        let new_changed_comment_sim = self.changed_similarity(&added, &comment)?;

        let metric = MethodMetric {
            is_renamed: flags.is_renamed,
            is_param_added: flags.is_param_added,
            is_param_removed: flags.is_param_removed,
            is_return_type_changed: flags.is_return_type_changed,
            is_param_type_changed: flags.is_param_type_changed,
            is_param_renamed: flags.is_param_renamed,
            old_code_len: old_code.len(),
            new_code_len: new_code.len(),
            comment_len: comment.len(),
            changed_code_len,
            percentage_code_changed: changed_code_len as f64 / old_code.len() as f64,
            delete_comment_intersection_len,
            percentage_comment_intersection_delete: delete_comment_intersection_len as f64
                / comment.len() as f64,
            old_code_comment_sim,
            new_code_comment_sim,
            new_old_code_comment_sim_distance: (old_code_comment_sim - new_code_comment_sim).abs(),
            old_changed_comment_sim,
            new_changed_comment_sim,
            old_new_changed_sim_dist: (new_changed_comment_sim - old_changed_comment_sim).abs(),
            added_statement_size: added.len(),
            deleted_statement_size: removed.len(),
        };

        tracing::debug!(
            changed_code_len,
            comment_len = metric.comment_len,
            old_code_comment_sim,
            new_code_comment_sim,
            "computed method metric"
        );
        Ok(Some(metric))
    }

    // Both sides go through the code vocabulary.
    fn code_similarity(&self, code: &[String], comment: &[String]) -> Result<f64, AnalysisError> {
        Ok(self.similarity.similarity(code, comment, VocabularyKind::Code)?)
    }

    fn changed_similarity(
        &self,
        changed: &[String],
        comment: &[String],
    ) -> Result<f64, AnalysisError> {
        if changed.is_empty() {
            return Ok(0.0);
        }
        self.code_similarity(changed, comment)
    }
}
