use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};

use crate::embedding::{EMBEDDING_DIM, TokenEmbedder, stack_rows};
use crate::onnx::OnnxSession;
use crate::InferError;

pub const ONNX_BACKEND_NAME: &str = "onnx";
const ID_INPUT: &str = "id";

/// Embedding model exported as an ONNX graph taking one `id` and returning its vector.
#[derive(Debug, Clone)]
pub struct OnnxTokenEmbedder {
    session: OnnxSession,
}

impl OnnxTokenEmbedder {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferError> {
        Ok(Self {
            session: OnnxSession::load(path)?,
        })
    }
}

impl TokenEmbedder for OnnxTokenEmbedder {
    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn embed_ids(&self, ids: &[u32]) -> Result<Tensor, InferError> {
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let input = Tensor::from_vec(vec![i64::from(*id)], 1, &Device::Cpu)?;
            let output = self
                .session
                .run(HashMap::from([(ID_INPUT.to_owned(), input)]))?;
            rows.push(output.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?);
        }
        stack_rows(rows, EMBEDDING_DIM)
    }

    fn backend_name(&self) -> &str {
        ONNX_BACKEND_NAME
    }
}
