use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::Tensor;
use candle_onnx::onnx::ModelProto;

use crate::InferError;

/// A parsed ONNX graph evaluated with `candle-onnx`.
#[derive(Debug, Clone)]
pub struct OnnxSession {
    path: PathBuf,
    model: ModelProto,
    output_name: String,
}

impl OnnxSession {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(InferError::ModelUnavailable(format!(
                "ONNX model not found at {}",
                path.display()
            )));
        }

        let model = candle_onnx::read_file(path)?;
        let output_name = model
            .graph
            .as_ref()
            .and_then(|graph| graph.output.first())
            .map(|output| output.name.clone())
            .ok_or_else(|| {
                InferError::InvalidModelResponse(format!(
                    "ONNX model {} declares no outputs",
                    path.display()
                ))
            })?;

        tracing::info!(path = %path.display(), output = %output_name, "loaded ONNX model");

        Ok(Self {
            path: path.to_path_buf(),
            model,
            output_name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs the graph and returns its first declared output.
    pub fn run(&self, inputs: HashMap<String, Tensor>) -> Result<Tensor, InferError> {
        let mut outputs = candle_onnx::simple_eval(&self.model, inputs)?;
        outputs.remove(&self.output_name).ok_or_else(|| {
            InferError::InvalidModelResponse(format!(
                "ONNX model {} produced no `{}` output",
                self.path.display(),
                self.output_name
            ))
        })
    }
}
