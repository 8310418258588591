use serde::{Deserialize, Serialize};

// Marker strings are read by the pretrained classifier and by mined datasets.
// Tokenizer output never contains `<`, so markers cannot collide with content.
pub const REPLACE: &str = "<REPLACE>";
pub const REPLACE_OLD: &str = "<REPLACE_OLD>";
pub const REPLACE_NEW: &str = "<REPLACE_NEW>";
pub const REPLACE_END: &str = "<REPLACE_END>";
pub const REPLACE_OLD_KEEP_BEFORE: &str = "<REPLACE_OLD_KEEP_BEFORE>";
pub const REPLACE_NEW_KEEP_BEFORE: &str = "<REPLACE_NEW_KEEP_BEFORE>";
pub const REPLACE_OLD_KEEP_AFTER: &str = "<REPLACE_OLD_KEEP_AFTER>";
pub const REPLACE_NEW_KEEP_AFTER: &str = "<REPLACE_NEW_KEEP_AFTER>";
pub const REPLACE_OLD_DELETE_KEEP_BEFORE: &str = "<REPLACE_OLD_DELETE_KEEP_BEFORE>";
pub const REPLACE_NEW_DELETE_KEEP_BEFORE: &str = "<REPLACE_NEW_DELETE_KEEP_BEFORE>";
pub const REPLACE_OLD_DELETE_KEEP_AFTER: &str = "<REPLACE_OLD_DELETE_KEEP_AFTER>";
pub const REPLACE_NEW_DELETE_KEEP_AFTER: &str = "<REPLACE_NEW_DELETE_KEEP_AFTER>";

pub const INSERT: &str = "<INSERT>";
pub const INSERT_OLD: &str = "<INSERT_OLD>";
pub const INSERT_NEW: &str = "<INSERT_NEW>";
pub const INSERT_END: &str = "<INSERT_END>";
pub const INSERT_OLD_KEEP_BEFORE: &str = "<INSERT_OLD_KEEP_BEFORE>";
pub const INSERT_NEW_KEEP_BEFORE: &str = "<INSERT_NEW_KEEP_BEFORE>";
pub const INSERT_OLD_KEEP_AFTER: &str = "<INSERT_OLD_KEEP_AFTER>";
pub const INSERT_NEW_KEEP_AFTER: &str = "<INSERT_NEW_KEEP_AFTER>";

pub const DELETE: &str = "<DELETE>";
pub const DELETE_END: &str = "<DELETE_END>";

pub const KEEP: &str = "<KEEP>";
pub const KEEP_END: &str = "<KEEP_END>";
pub const COPY_SEQUENCE: &str = "<COPY_SEQUENCE>";

pub const REPLACE_KEYWORDS: [&str; 12] = [
    REPLACE,
    REPLACE_OLD,
    REPLACE_NEW,
    REPLACE_END,
    REPLACE_OLD_KEEP_BEFORE,
    REPLACE_NEW_KEEP_BEFORE,
    REPLACE_OLD_KEEP_AFTER,
    REPLACE_NEW_KEEP_AFTER,
    REPLACE_OLD_DELETE_KEEP_BEFORE,
    REPLACE_NEW_DELETE_KEEP_BEFORE,
    REPLACE_OLD_DELETE_KEEP_AFTER,
    REPLACE_NEW_DELETE_KEEP_AFTER,
];

pub const INSERT_KEYWORDS: [&str; 8] = [
    INSERT,
    INSERT_OLD,
    INSERT_NEW,
    INSERT_END,
    INSERT_OLD_KEEP_BEFORE,
    INSERT_NEW_KEEP_BEFORE,
    INSERT_OLD_KEEP_AFTER,
    INSERT_NEW_KEEP_AFTER,
];

pub const DELETE_KEYWORDS: [&str; 2] = [DELETE, DELETE_END];
pub const KEEP_KEYWORDS: [&str; 2] = [KEEP, KEEP_END];

pub fn is_insert(token: &str) -> bool {
    INSERT_KEYWORDS.contains(&token)
}

pub fn is_keep(token: &str) -> bool {
    KEEP_KEYWORDS.contains(&token)
}

pub fn is_replace(token: &str) -> bool {
    REPLACE_KEYWORDS.contains(&token)
}

pub fn is_delete(token: &str) -> bool {
    DELETE_KEYWORDS.contains(&token)
}

pub fn is_edit(token: &str) -> bool {
    is_insert(token) || is_keep(token) || is_replace(token) || is_delete(token)
}

/// Command that produced a content token in the flat code diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffCommand {
    Keep,
    ReplaceOld,
    ReplaceNew,
    Insert,
    Delete,
}

impl DiffCommand {
    pub fn marker(self) -> &'static str {
        match self {
            Self::Keep => KEEP,
            Self::ReplaceOld => REPLACE_OLD,
            Self::ReplaceNew => REPLACE_NEW,
            Self::Insert => INSERT,
            Self::Delete => DELETE,
        }
    }

    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            KEEP => Some(Self::Keep),
            REPLACE_OLD => Some(Self::ReplaceOld),
            REPLACE_NEW => Some(Self::ReplaceNew),
            INSERT => Some(Self::Insert),
            DELETE => Some(Self::Delete),
            _ => None,
        }
    }

    /// Old-side commands: the token existed before the change and is gone after it.
    pub fn is_removal(self) -> bool {
        matches!(self, Self::ReplaceOld | Self::Delete)
    }

    pub fn is_addition(self) -> bool {
        matches!(self, Self::ReplaceNew | Self::Insert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_families_are_disjoint() {
        for token in REPLACE_KEYWORDS {
            assert!(!is_insert(token) && !is_keep(token) && !is_delete(token));
        }
        for token in INSERT_KEYWORDS {
            assert!(!is_replace(token) && !is_keep(token) && !is_delete(token));
        }
        assert!(!is_edit(COPY_SEQUENCE));
        assert!(!is_edit("return"));
    }

    #[test]
    fn diff_command_round_trips_through_marker() {
        for command in [
            DiffCommand::Keep,
            DiffCommand::ReplaceOld,
            DiffCommand::ReplaceNew,
            DiffCommand::Insert,
            DiffCommand::Delete,
        ] {
            assert_eq!(DiffCommand::from_marker(command.marker()), Some(command));
        }
        assert_eq!(DiffCommand::from_marker(KEEP_END), None);
    }
}
