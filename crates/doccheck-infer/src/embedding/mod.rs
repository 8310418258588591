use candle_core::{DType, Device, Tensor};

use crate::InferError;

pub mod candle;
#[cfg(feature = "onnx")]
pub mod onnx;

pub const EMBEDDING_DIM: usize = 64;

/// Per-token embedding lookup.
pub trait TokenEmbedder: Send + Sync {
    fn dim(&self) -> usize;

    /// Embeds every id; the result has shape `(ids.len(), dim)` and dtype `f32`.
    fn embed_ids(&self, ids: &[u32]) -> Result<Tensor, InferError>;

    fn backend_name(&self) -> &str;
}

/// Deterministic hash-derived embeddings for tests and model-less runs.
///
/// Distinct ids get distinct, non-zero, unit-length vectors.
#[derive(Debug, Clone)]
pub struct MockTokenEmbedder {
    dim: usize,
    seed: u64,
}

impl MockTokenEmbedder {
    pub fn new() -> Self {
        Self {
            dim: EMBEDDING_DIM,
            seed: 0,
        }
    }

    /// Different seeds give unrelated embedding tables.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim.max(1);
        self
    }

    fn row(&self, id: u32) -> Vec<f32> {
        let mut row = (0..self.dim)
            .map(|index| {
                let mut bytes = Vec::with_capacity(20);
                bytes.extend_from_slice(&self.seed.to_le_bytes());
                bytes.extend_from_slice(&id.to_le_bytes());
                bytes.extend_from_slice(&(index as u64).to_le_bytes());
                let hash = fnv1a_64(&bytes);
                ((hash >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) as f32
            })
            .collect::<Vec<_>>();
        l2_normalize(&mut row);
        row
    }
}

impl Default for MockTokenEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenEmbedder for MockTokenEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_ids(&self, ids: &[u32]) -> Result<Tensor, InferError> {
        let rows = ids.iter().map(|id| self.row(*id)).collect();
        stack_rows(rows, self.dim)
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

/// Stacks per-token rows into one `(n, dim)` matrix, checking every width.
pub(crate) fn stack_rows(rows: Vec<Vec<f32>>, dim: usize) -> Result<Tensor, InferError> {
    let count = rows.len();
    let mut values = Vec::with_capacity(count * dim);
    for row in rows {
        if row.len() != dim {
            return Err(InferError::ShapeMismatch(format!(
                "expected {dim} embedding dimensions, got {}",
                row.len()
            )));
        }
        values.extend(row);
    }
    Ok(Tensor::from_vec(values, (count, dim), &Device::Cpu)?.to_dtype(DType::F32)?)
}

fn l2_normalize(embedding: &mut [f32]) {
    let norm = embedding
        .iter()
        .map(|value| value * value)
        .fold(0.0f32, |acc, value| acc + value)
        .sqrt();
    if norm < 1e-8 {
        embedding.fill(0.0);
        return;
    }
    for value in embedding.iter_mut() {
        *value /= norm;
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_embeddings_are_deterministic_and_normalized() {
        let embedder = MockTokenEmbedder::new();
        let first = embedder
            .embed_ids(&[3, 7])
            .expect("embed")
            .to_vec2::<f32>()
            .expect("rows");
        let second = embedder
            .embed_ids(&[3, 7])
            .expect("embed")
            .to_vec2::<f32>()
            .expect("rows");

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].len(), EMBEDDING_DIM);
        assert_ne!(first[0], first[1]);
        for row in &first {
            let norm_sq = row.iter().map(|value| value * value).sum::<f32>();
            assert!((norm_sq - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn seeds_change_the_table() {
        let left = MockTokenEmbedder::new().embed_ids(&[1]).expect("embed");
        let right = MockTokenEmbedder::new()
            .with_seed(9)
            .embed_ids(&[1])
            .expect("embed");
        assert_ne!(
            left.to_vec2::<f32>().expect("rows"),
            right.to_vec2::<f32>().expect("rows")
        );
    }

    #[test]
    fn empty_ids_give_empty_matrix() {
        let embedded = MockTokenEmbedder::new().embed_ids(&[]).expect("embed");
        assert_eq!(embedded.dims(), &[0, EMBEDDING_DIM]);
    }

    #[test]
    fn stack_rows_rejects_ragged_widths() {
        let result = stack_rows(vec![vec![1.0, 2.0], vec![3.0]], 2);
        assert!(matches!(result, Err(InferError::ShapeMismatch(_))));

        let stacked = stack_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]], 2).expect("stack");
        assert_eq!(stacked.dims(), &[2, 2]);
    }

    #[test]
    fn l2_normalize_zero_vector_returns_zeros() {
        let mut embedding = vec![0.0f32; 4];
        l2_normalize(&mut embedding);
        assert!(embedding.iter().all(|value| *value == 0.0));
    }
}
