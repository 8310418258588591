use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::InferError;

/// Which token space a sequence belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VocabularyKind {
    Code,
    Comment,
}

impl VocabularyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Comment => "comment",
        }
    }
}

pub type Vocabulary = HashMap<String, u32>;

/// Vocabularies and sequence limits shipped next to the pretrained models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub max_code_len: usize,
    #[serde(rename = "max_nl_len")]
    pub max_comment_len: usize,
    #[serde(rename = "unk")]
    pub unknown_token: String,
    #[serde(rename = "pad")]
    pub padding_token: String,
    #[serde(rename = "nl")]
    pub comment_vocab: Vocabulary,
    #[serde(rename = "code")]
    pub code_vocab: Vocabulary,
}

impl EmbeddingConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, InferError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn vocab(&self, kind: VocabularyKind) -> &Vocabulary {
        match kind {
            VocabularyKind::Code => &self.code_vocab,
            VocabularyKind::Comment => &self.comment_vocab,
        }
    }

    pub fn max_len(&self, kind: VocabularyKind) -> usize {
        match kind {
            VocabularyKind::Code => self.max_code_len,
            VocabularyKind::Comment => self.max_comment_len,
        }
    }

    /// Id of `token`, falling back to the unknown token's id and then to 0.
    pub fn id_or_unk(&self, token: &str, kind: VocabularyKind) -> u32 {
        let vocab = self.vocab(kind);
        vocab
            .get(token)
            .or_else(|| vocab.get(&self.unknown_token))
            .copied()
            .unwrap_or(0)
    }

    pub fn ids<S: AsRef<str>>(&self, tokens: &[S], kind: VocabularyKind) -> Vec<u32> {
        tokens
            .iter()
            .map(|token| self.id_or_unk(token.as_ref(), kind))
            .collect()
    }

    pub fn pad_id(&self, kind: VocabularyKind) -> u32 {
        self.id_or_unk(&self.padding_token, kind)
    }

    /// Ids truncated to the kind's maximum length and right-padded with the pad id.
    pub fn padded_ids<S: AsRef<str>>(&self, tokens: &[S], kind: VocabularyKind) -> Vec<u32> {
        let max_len = self.max_len(kind);
        let mut ids = self.ids(&tokens[..tokens.len().min(max_len)], kind);
        ids.resize(max_len, self.pad_id(kind));
        ids
    }

    /// Number of real (non-padding) positions in a padded sequence of `len` tokens.
    pub fn clamped_len(&self, len: usize, kind: VocabularyKind) -> usize {
        len.min(self.max_len(kind))
    }
}
