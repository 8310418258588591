use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::Embedding;

use crate::embedding::TokenEmbedder;
use crate::InferError;

pub const CANDLE_BACKEND_NAME: &str = "candle";
const WEIGHT_NAMES: [&str; 3] = ["weight", "embedding.weight", "embeddings.weight"];

/// Embedding table read from a safetensors file and served by `candle_nn::Embedding`.
#[derive(Debug, Clone)]
pub struct CandleTokenEmbedder {
    path: PathBuf,
    embedding: Embedding,
    vocab_size: usize,
    dim: usize,
}

impl CandleTokenEmbedder {
    /// Loads the `(vocab_size, dim)` table. A file holding a single tensor may use
    /// any name; otherwise one of `weight`, `embedding.weight` or
    /// `embeddings.weight` is required.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(InferError::ModelUnavailable(format!(
                "embedding table not found at {}",
                path.display()
            )));
        }

        let mut tensors = candle_core::safetensors::load(path, &Device::Cpu)?;
        let name = WEIGHT_NAMES
            .iter()
            .find(|name| tensors.contains_key(**name))
            .map(|name| (*name).to_owned())
            .or_else(|| {
                (tensors.len() == 1)
                    .then(|| tensors.keys().next().cloned())
                    .flatten()
            })
            .ok_or_else(|| {
                InferError::InvalidModelResponse(format!(
                    "no embedding weight tensor in {} (found {} tensors)",
                    path.display(),
                    tensors.len()
                ))
            })?;
        let table = tensors
            .remove(&name)
            .ok_or_else(|| InferError::InvalidModelResponse(format!("tensor {name} vanished")))?;

        let (vocab_size, dim) = table.dims2().map_err(|_| {
            InferError::ShapeMismatch(format!(
                "embedding table {name} must be two dimensional, got {:?}",
                table.dims()
            ))
        })?;
        let table = table.to_dtype(DType::F32)?;

        tracing::info!(
            path = %path.display(),
            tensor = %name,
            vocab_size,
            dim,
            "loaded token embedding table"
        );

        Ok(Self {
            path: path.to_path_buf(),
            embedding: Embedding::new(table, dim),
            vocab_size,
            dim,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }
}

impl TokenEmbedder for CandleTokenEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_ids(&self, ids: &[u32]) -> Result<Tensor, InferError> {
        if let Some(id) = ids.iter().find(|id| **id as usize >= self.vocab_size) {
            return Err(InferError::ShapeMismatch(format!(
                "token id {id} outside embedding table of {} rows",
                self.vocab_size
            )));
        }
        let ids = Tensor::from_vec(ids.to_vec(), ids.len(), &Device::Cpu)?;
        Ok(self.embedding.forward(&ids)?)
    }

    fn backend_name(&self) -> &str {
        CANDLE_BACKEND_NAME
    }
}
