use doccheck_core::MethodFeatures;
use serde::{Deserialize, Serialize};

use crate::refactoring::{RefactoringFlags, RefactoringKind};

/// One method before and after a change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodChange {
    pub old_code: String,
    pub new_code: String,
    #[serde(default)]
    pub old_comment: String,
    /// Blank when the new method carries no comment.
    #[serde(default)]
    pub new_comment: String,
    #[serde(default)]
    pub refactorings: Vec<RefactoringKind>,
    /// Structural features of the old method; derived from `old_code` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_features: Option<MethodFeatures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_features: Option<MethodFeatures>,
}

impl MethodChange {
    pub fn new(
        old_code: impl Into<String>,
        new_code: impl Into<String>,
        old_comment: impl Into<String>,
        new_comment: impl Into<String>,
    ) -> Self {
        Self {
            old_code: old_code.into(),
            new_code: new_code.into(),
            old_comment: old_comment.into(),
            new_comment: new_comment.into(),
            ..Self::default()
        }
    }

    pub fn with_refactorings(mut self, kinds: impl IntoIterator<Item = RefactoringKind>) -> Self {
        self.refactorings = kinds.into_iter().collect();
        self
    }

    pub fn refactoring_flags(&self) -> RefactoringFlags {
        RefactoringFlags::from_kinds(self.refactorings.iter().copied())
    }

    pub fn has_new_comment(&self) -> bool {
        !self.new_comment.trim().is_empty()
    }

    pub fn old_method_features(&self) -> MethodFeatures {
        self.old_features
            .clone()
            .unwrap_or_else(|| MethodFeatures::from_source(&self.old_code, true))
    }

    pub fn new_method_features(&self) -> MethodFeatures {
        self.new_features
            .clone()
            .unwrap_or_else(|| MethodFeatures::from_source(&self.new_code, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_fills_defaults() {
        let change: MethodChange =
            serde_json::from_str(r#"{"old_code": "int a() {}", "new_code": "int b() {}"}"#)
                .expect("parse change");

        assert!(change.old_comment.is_empty());
        assert!(!change.has_new_comment());
        assert!(change.refactorings.is_empty());
        assert_eq!(change.refactoring_flags(), RefactoringFlags::default());
    }

    #[test]
    fn supplied_features_take_precedence() {
        let mut change = MethodChange::new(
            "public int size() { return count; }",
            "public long size() { return total; }",
            "",
            "Returns the size.",
        );
        assert_eq!(change.old_method_features().return_type, vec!["int"]);
        assert_eq!(change.new_method_features().return_statements, vec!["total"]);

        change.new_features = Some(MethodFeatures {
            return_type: vec!["custom".to_owned()],
            ..MethodFeatures::default()
        });
        assert_eq!(change.new_method_features().return_type, vec!["custom"]);
    }
}
