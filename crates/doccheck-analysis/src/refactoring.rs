use serde::{Deserialize, Serialize};

/// Refactoring observed on a method between two revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefactoringKind {
    RenameMethod,
    RenameParameter,
    AddParameter,
    RemoveParameter,
    ChangeReturnType,
    ChangeParameterType,
    #[serde(other)]
    Other,
}

impl RefactoringKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RenameMethod => "rename_method",
            Self::RenameParameter => "rename_parameter",
            Self::AddParameter => "add_parameter",
            Self::RemoveParameter => "remove_parameter",
            Self::ChangeReturnType => "change_return_type",
            Self::ChangeParameterType => "change_parameter_type",
            Self::Other => "other",
        }
    }
}

/// One flag per refactoring kind: was at least one of that kind observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefactoringFlags {
    pub is_renamed: bool,
    pub is_param_added: bool,
    pub is_param_removed: bool,
    pub is_return_type_changed: bool,
    pub is_param_type_changed: bool,
    pub is_param_renamed: bool,
}

impl RefactoringFlags {
    pub fn from_kinds(kinds: impl IntoIterator<Item = RefactoringKind>) -> Self {
        let mut flags = Self::default();
        for kind in kinds {
            match kind {
                RefactoringKind::RenameMethod => flags.is_renamed = true,
                RefactoringKind::RenameParameter => flags.is_param_renamed = true,
                RefactoringKind::AddParameter => flags.is_param_added = true,
                RefactoringKind::RemoveParameter => flags.is_param_removed = true,
                RefactoringKind::ChangeReturnType => flags.is_return_type_changed = true,
                RefactoringKind::ChangeParameterType => flags.is_param_type_changed = true,
                RefactoringKind::Other => {}
            }
        }
        flags
    }
}
