use std::sync::Arc;

use doccheck_core::{
    code_features, comment_features, compute_code_diffs, extract_method_code, sub_tokenize_code,
    sub_tokenize_comment, tokenize_comment,
};
use doccheck_infer::{ClassifierInputs, ConsistencyClassifier, EmbeddingConfig, VocabularyKind};
use serde::{Deserialize, Serialize};

use crate::AnalysisError;
use crate::change::MethodChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Consistent,
    Inconsistent,
    /// The new method has no comment to judge.
    NotApplicable,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Consistent => "consistent",
            Self::Inconsistent => "inconsistent",
            Self::NotApplicable => "not_applicable",
        }
    }

    pub fn is_inconsistent(self) -> Option<bool> {
        match self {
            Self::Consistent => Some(false),
            Self::Inconsistent => Some(true),
            Self::NotApplicable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub verdict: Verdict,
    /// Probability of the inconsistent class; absent when not applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f32>,
}

impl Prediction {
    pub fn not_applicable() -> Self {
        Self {
            verdict: Verdict::NotApplicable,
            probability: None,
        }
    }
}

/// Just-in-time detector: judges the new comment against the code change that came with it.
#[derive(Clone)]
pub struct JitDetector {
    config: Arc<EmbeddingConfig>,
    classifier: Arc<dyn ConsistencyClassifier>,
    threshold: f32,
}

impl std::fmt::Debug for JitDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitDetector")
            .field("classifier", &self.classifier.backend_name())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl JitDetector {
    pub fn new(
        config: Arc<EmbeddingConfig>,
        classifier: Arc<dyn ConsistencyClassifier>,
        threshold: f32,
    ) -> Self {
        Self {
            config,
            classifier,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// The classifier's six inputs for `change`, or `None` without a new comment.
    pub fn build_inputs(
        &self,
        change: &MethodChange,
    ) -> Result<Option<ClassifierInputs>, AnalysisError> {
        if !change.has_new_comment() {
            return Ok(None);
        }

        let old_features = change.old_method_features();
        let new_features = change.new_method_features();
        let old_code = extract_method_code(&change.old_code);
        let new_code = extract_method_code(&change.new_code);

        let comment_sub_tokens = sub_tokenize_comment(&change.new_comment);
        let comment_tokens = tokenize_comment(&change.new_comment);
        let old_sub_tokens = sub_tokenize_code(&old_code, true);
        let new_sub_tokens = sub_tokenize_code(&new_code, true);

        let diff = compute_code_diffs(&old_sub_tokens, &new_sub_tokens);
        let code_rows = code_features(
            &diff.spans,
            &comment_sub_tokens,
            &old_features,
            &new_features,
            self.config.max_code_len,
        );
        let comment_rows = comment_features(
            &comment_tokens,
            &comment_sub_tokens,
            &diff,
            &old_features,
            &new_features,
            self.config.max_comment_len,
        );

        let comment_ids = self
            .config
            .padded_ids(&comment_sub_tokens, VocabularyKind::Comment);
        let comment_len = self
            .config
            .clamped_len(comment_sub_tokens.len(), VocabularyKind::Comment);
        let code_ids = self.config.padded_ids(&diff.spans, VocabularyKind::Code);
        let code_len = self
            .config
            .clamped_len(diff.spans.len(), VocabularyKind::Code);

        Ok(Some(ClassifierInputs::new(
            &comment_ids,
            comment_len,
            &comment_rows,
            &code_ids,
            code_len,
            &code_rows,
        )?))
    }

    pub fn predict(&self, change: &MethodChange) -> Result<Prediction, AnalysisError> {
        let Some(inputs) = self.build_inputs(change)? else {
            tracing::debug!("no new comment, skipping classifier");
            return Ok(Prediction::not_applicable());
        };

        let probability = self.classifier.inconsistency_probability(&inputs)?;
        let verdict = if probability > self.threshold {
            Verdict::Inconsistent
        } else {
            Verdict::Consistent
        };

        tracing::info!(
            probability,
            threshold = self.threshold,
            verdict = verdict.as_str(),
            "classified comment change"
        );

        Ok(Prediction {
            verdict,
            probability: Some(probability),
        })
    }
}
