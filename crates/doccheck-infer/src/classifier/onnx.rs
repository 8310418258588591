use std::path::Path;

use candle_core::{DType, Device};

use crate::classifier::{ClassifierInputs, ConsistencyClassifier};
use crate::onnx::OnnxSession;
use crate::InferError;

/// The pretrained JIT classifier graph.
#[derive(Debug, Clone)]
pub struct OnnxClassifier {
    session: OnnxSession,
}

impl OnnxClassifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferError> {
        Ok(Self {
            session: OnnxSession::load(path)?,
        })
    }
}

impl ConsistencyClassifier for OnnxClassifier {
    fn logits(&self, inputs: &ClassifierInputs) -> Result<[f32; 2], InferError> {
        inputs.validate()?;
        let output = self.session.run(inputs.to_tensors(&Device::Cpu)?)?;
        let values = output.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
        match values.as_slice() {
            [negative, positive] => Ok([*negative, *positive]),
            _ => Err(InferError::InvalidModelResponse(format!(
                "classifier {} returned {} logits, expected 2",
                self.session.path().display(),
                values.len()
            ))),
        }
    }

    fn backend_name(&self) -> &str {
        "onnx"
    }
}
