use std::sync::Arc;

use candle_core::Tensor;

use crate::embedding::TokenEmbedder;
use crate::vocab::{EmbeddingConfig, VocabularyKind};
use crate::InferError;

/// Token-embedding similarity between two token sequences.
///
/// Holds the vocabularies and one embedder per token space. Cheap to clone and
/// safe to share between threads.
#[derive(Clone)]
pub struct SimilarityModel {
    config: Arc<EmbeddingConfig>,
    code_embedder: Arc<dyn TokenEmbedder>,
    comment_embedder: Arc<dyn TokenEmbedder>,
}

impl std::fmt::Debug for SimilarityModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityModel")
            .field("code_backend", &self.code_embedder.backend_name())
            .field("comment_backend", &self.comment_embedder.backend_name())
            .finish()
    }
}

impl SimilarityModel {
    pub fn new(
        config: Arc<EmbeddingConfig>,
        code_embedder: Arc<dyn TokenEmbedder>,
        comment_embedder: Arc<dyn TokenEmbedder>,
    ) -> Self {
        Self {
            config,
            code_embedder,
            comment_embedder,
        }
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    fn embedder(&self, kind: VocabularyKind) -> &dyn TokenEmbedder {
        match kind {
            VocabularyKind::Code => self.code_embedder.as_ref(),
            VocabularyKind::Comment => self.comment_embedder.as_ref(),
        }
    }

    /// Embeds `tokens` as a `(len, dim)` matrix through the `kind` vocabulary.
    pub fn embed<S: AsRef<str>>(
        &self,
        tokens: &[S],
        kind: VocabularyKind,
    ) -> Result<Tensor, InferError> {
        let ids = self.config.ids(tokens, kind);
        self.embedder(kind).embed_ids(&ids)
    }

    /// Similarity of two sequences drawn from the same token space.
    pub fn similarity<A: AsRef<str>, B: AsRef<str>>(
        &self,
        left: &[A],
        right: &[B],
        kind: VocabularyKind,
    ) -> Result<f64, InferError> {
        self.similarity_between(left, kind, right, kind)
    }

    /// Similarity of two sequences that may use different vocabularies.
    ///
    /// Both sequences must be non-empty.
    pub fn similarity_between<A: AsRef<str>, B: AsRef<str>>(
        &self,
        left: &[A],
        left_kind: VocabularyKind,
        right: &[B],
        right_kind: VocabularyKind,
    ) -> Result<f64, InferError> {
        if left.is_empty() || right.is_empty() {
            return Err(InferError::ShapeMismatch(format!(
                "similarity needs two non-empty sequences, got {} and {} tokens",
                left.len(),
                right.len()
            )));
        }

        let left = self.embed(left, left_kind)?;
        let right = self.embed(right, right_kind)?;
        let score = liu_similarity(&left, &right)?;

        tracing::trace!(
            left_vocab = left_kind.as_str(),
            right_vocab = right_kind.as_str(),
            score,
            "computed sequence similarity"
        );
        Ok(score)
    }
}

/// Bidirectional max-mean cosine similarity of two embedding matrices (Liu et al. 2018).
///
/// Every row of `left` is matched with its most similar row of `right` and the
/// matches are averaged; the same is done from `right` to `left`, and the two
/// averages are averaged. Zero rows have similarity 0 with everything.
pub fn liu_similarity(left: &Tensor, right: &Tensor) -> Result<f64, InferError> {
    let (left_rows, left_dim) = left.dims2()?;
    let (right_rows, right_dim) = right.dims2()?;
    if left_dim != right_dim {
        return Err(InferError::ShapeMismatch(format!(
            "embedding widths differ: {left_dim} vs {right_dim}"
        )));
    }
    if left_rows == 0 || right_rows == 0 {
        return Err(InferError::ShapeMismatch(
            "similarity of an empty embedding matrix".to_owned(),
        ));
    }

    let cosine = cosine_matrix(left, right)?;
    let left_to_right = cosine.max(1)?.mean_all()?.to_scalar::<f32>()?;
    let right_to_left = cosine.max(0)?.mean_all()?.to_scalar::<f32>()?;
    Ok((f64::from(left_to_right) + f64::from(right_to_left)) / 2.0)
}

/// Pairwise cosine similarities, shape `(left rows, right rows)`.
pub fn cosine_matrix(left: &Tensor, right: &Tensor) -> Result<Tensor, InferError> {
    let left = unit_rows(left)?;
    let right = unit_rows(right)?;
    Ok(left.matmul(&right.t()?)?)
}

fn unit_rows(matrix: &Tensor) -> Result<Tensor, InferError> {
    let norms = matrix.sqr()?.sum_keepdim(1)?.sqrt()?.affine(1.0, 1e-12)?;
    Ok(matrix.broadcast_div(&norms)?)
}
