use serde::{Deserialize, Serialize};

use crate::change::MethodChange;
use crate::detector::Verdict;
use crate::metrics::MethodMetric;

/// A method change as mined from history, before metrics are attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDatasetSample {
    pub old_code: String,
    pub new_code: String,
    pub old_comment: String,
    pub new_comment: String,
    pub old_method_name: String,
    pub new_method_name: String,
    pub commit_id: String,
    pub commit_time: String,
    pub new_file_name: String,
}

impl RawDatasetSample {
    pub fn to_change(&self) -> MethodChange {
        MethodChange::new(
            self.old_code.clone(),
            self.new_code.clone(),
            self.old_comment.clone(),
            self.new_comment.clone(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentUpdateLabel {
    Inconsistency,
    Consistency,
}

impl CommentUpdateLabel {
    pub fn from_verdict(verdict: Verdict) -> Option<Self> {
        verdict.is_inconsistent().map(|inconsistent| {
            if inconsistent {
                Self::Inconsistency
            } else {
                Self::Consistency
            }
        })
    }
}

/// A labelled change between two commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSample {
    pub project: String,
    pub old_commit: String,
    pub new_commit: String,
    pub old_code: String,
    pub new_code: String,
    pub old_comment: String,
    pub new_comment: String,
    pub metric: MethodMetric,
    pub new_file_name: String,
    pub label: CommentUpdateLabel,
}

impl DatasetSample {
    /// Sample whose old side is `raw`'s commit and whose new side is `new_commit`.
    pub fn from_raw(
        project: impl Into<String>,
        raw: RawDatasetSample,
        new_commit: impl Into<String>,
        metric: MethodMetric,
        label: CommentUpdateLabel,
    ) -> Self {
        Self {
            project: project.into(),
            old_commit: raw.commit_id,
            new_commit: new_commit.into(),
            old_code: raw.old_code,
            new_code: raw.new_code,
            old_comment: raw.old_comment,
            new_comment: raw.new_comment,
            metric,
            new_file_name: raw.new_file_name,
            label,
        }
    }
}
