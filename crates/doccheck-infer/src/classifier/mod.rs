use std::collections::HashMap;

use candle_core::{Device, Tensor};
use doccheck_core::{
    CodeFeatureRow, CommentFeatureRow, NUM_CODE_FEATURES, NUM_NL_FEATURES, flatten_features,
};

use crate::InferError;

#[cfg(feature = "onnx")]
pub mod onnx;

pub const NL_IDS_INPUT: &str = "nl_ids";
pub const NL_LENS_INPUT: &str = "nl_lens";
pub const NL_FEATURES_INPUT: &str = "nl_features";
pub const CODE_IDS_INPUT: &str = "code_ids";
pub const CODE_LENS_INPUT: &str = "code_lens";
pub const CODE_FEATURES_INPUT: &str = "code_features";

/// The six named tensors of one classifier call, batch size 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierInputs {
    pub comment_ids: Vec<i64>,
    pub comment_len: i64,
    /// Row-major `(comment_ids.len(), NUM_NL_FEATURES)`.
    pub comment_features: Vec<f32>,
    pub code_ids: Vec<i64>,
    pub code_len: i64,
    /// Row-major `(code_ids.len(), NUM_CODE_FEATURES)`.
    pub code_features: Vec<f32>,
}

impl ClassifierInputs {
    pub fn new(
        comment_ids: &[u32],
        comment_len: usize,
        comment_features: &[CommentFeatureRow],
        code_ids: &[u32],
        code_len: usize,
        code_features: &[CodeFeatureRow],
    ) -> Result<Self, InferError> {
        let inputs = Self {
            comment_ids: comment_ids.iter().map(|id| i64::from(*id)).collect(),
            comment_len: comment_len as i64,
            comment_features: flatten_features(comment_features),
            code_ids: code_ids.iter().map(|id| i64::from(*id)).collect(),
            code_len: code_len as i64,
            code_features: flatten_features(code_features),
        };
        inputs.validate()?;
        Ok(inputs)
    }

    /// Ids and feature rows must line up and lengths must fit inside the padding.
    pub fn validate(&self) -> Result<(), InferError> {
        check_stream(
            "comment",
            &self.comment_ids,
            self.comment_len,
            &self.comment_features,
            NUM_NL_FEATURES,
        )?;
        check_stream(
            "code",
            &self.code_ids,
            self.code_len,
            &self.code_features,
            NUM_CODE_FEATURES,
        )
    }

    pub fn to_tensors(&self, device: &Device) -> Result<HashMap<String, Tensor>, InferError> {
        let comment_rows = self.comment_ids.len();
        let code_rows = self.code_ids.len();

        Ok(HashMap::from([
            (
                NL_IDS_INPUT.to_owned(),
                Tensor::from_vec(self.comment_ids.clone(), (1, comment_rows), device)?,
            ),
            (
                NL_LENS_INPUT.to_owned(),
                Tensor::from_vec(vec![self.comment_len], 1, device)?,
            ),
            (
                NL_FEATURES_INPUT.to_owned(),
                Tensor::from_vec(
                    self.comment_features.clone(),
                    (1, comment_rows, NUM_NL_FEATURES),
                    device,
                )?,
            ),
            (
                CODE_IDS_INPUT.to_owned(),
                Tensor::from_vec(self.code_ids.clone(), (1, code_rows), device)?,
            ),
            (
                CODE_LENS_INPUT.to_owned(),
                Tensor::from_vec(vec![self.code_len], 1, device)?,
            ),
            (
                CODE_FEATURES_INPUT.to_owned(),
                Tensor::from_vec(
                    self.code_features.clone(),
                    (1, code_rows, NUM_CODE_FEATURES),
                    device,
                )?,
            ),
        ]))
    }
}

fn check_stream(
    stream: &str,
    ids: &[i64],
    len: i64,
    features: &[f32],
    width: usize,
) -> Result<(), InferError> {
    if features.len() != ids.len() * width {
        return Err(InferError::ShapeMismatch(format!(
            "{stream} features hold {} values, expected {} rows of {width}",
            features.len(),
            ids.len()
        )));
    }
    if len < 0 || len as usize > ids.len() {
        return Err(InferError::ShapeMismatch(format!(
            "{stream} length {len} outside padded length {}",
            ids.len()
        )));
    }
    Ok(())
}

/// Pretrained binary consistency classifier.
pub trait ConsistencyClassifier: Send + Sync {
    /// Raw `[consistent, inconsistent]` logits.
    fn logits(&self, inputs: &ClassifierInputs) -> Result<[f32; 2], InferError>;

    fn backend_name(&self) -> &str;

    /// Softmax probability of the inconsistent class.
    fn inconsistency_probability(&self, inputs: &ClassifierInputs) -> Result<f32, InferError> {
        Ok(positive_probability(self.logits(inputs)?))
    }
}

/// Softmax of two logits, returning the second class's share.
pub fn positive_probability(logits: [f32; 2]) -> f32 {
    let max = logits[0].max(logits[1]);
    let negative = (logits[0] - max).exp();
    let positive = (logits[1] - max).exp();
    positive / (negative + positive)
}

/// Classifier returning fixed logits, after checking the inputs are well formed.
#[derive(Debug, Clone, PartialEq)]
pub struct MockClassifier {
    logits: [f32; 2],
}

impl MockClassifier {
    pub fn new() -> Self {
        Self { logits: [0.0, 0.0] }
    }

    pub fn with_logits(mut self, logits: [f32; 2]) -> Self {
        self.logits = logits;
        self
    }

    /// Logits whose softmax puts `probability` on the inconsistent class.
    pub fn with_probability(self, probability: f32) -> Self {
        let probability = probability.clamp(1e-6, 1.0 - 1e-6);
        self.with_logits([0.0, (probability / (1.0 - probability)).ln()])
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsistencyClassifier for MockClassifier {
    fn logits(&self, inputs: &ClassifierInputs) -> Result<[f32; 2], InferError> {
        inputs.validate()?;
        Ok(self.logits)
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> ClassifierInputs {
        let comment_rows = vec![[0u32; NUM_NL_FEATURES]; 3];
        let code_rows = vec![[1u32; NUM_CODE_FEATURES]; 4];
        ClassifierInputs::new(&[5, 6, 0], 2, &comment_rows, &[1, 2, 3, 0], 3, &code_rows)
            .expect("inputs")
    }

    #[test]
    fn softmax_probability_matches_closed_form() {
        assert!((positive_probability([0.0, 0.0]) - 0.5).abs() < 1e-6);
        let expected = 1.0 / (1.0 + (-2.0f32).exp());
        assert!((positive_probability([1.0, 3.0]) - expected).abs() < 1e-6);
        assert!(positive_probability([0.0, 1000.0]).is_finite());
    }

    #[test]
    fn tensors_have_batch_of_one() {
        let tensors = inputs().to_tensors(&Device::Cpu).expect("tensors");
        assert_eq!(tensors.len(), 6);
        assert_eq!(tensors[NL_IDS_INPUT].dims(), &[1, 3]);
        assert_eq!(tensors[NL_LENS_INPUT].dims(), &[1]);
        assert_eq!(tensors[NL_FEATURES_INPUT].dims(), &[1, 3, NUM_NL_FEATURES]);
        assert_eq!(tensors[CODE_IDS_INPUT].dims(), &[1, 4]);
        assert_eq!(tensors[CODE_FEATURES_INPUT].dims(), &[1, 4, NUM_CODE_FEATURES]);
        assert_eq!(
            tensors[CODE_LENS_INPUT].to_vec1::<i64>().expect("lens"),
            vec![3]
        );
    }

    #[test]
    fn misaligned_inputs_are_rejected() {
        let comment_rows = vec![[0u32; NUM_NL_FEATURES]; 2];
        let code_rows = vec![[0u32; NUM_CODE_FEATURES]; 1];
        let result = ClassifierInputs::new(&[1, 2, 3], 1, &comment_rows, &[1], 1, &code_rows);
        assert!(matches!(result, Err(InferError::ShapeMismatch(_))));

        let mut inputs = inputs();
        inputs.code_len = 9;
        assert!(matches!(
            MockClassifier::new().logits(&inputs),
            Err(InferError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn mock_classifier_reproduces_requested_probability() {
        let classifier = MockClassifier::new().with_probability(0.8);
        let probability = classifier
            .inconsistency_probability(&inputs())
            .expect("probability");
        assert!((probability - 0.8).abs() < 1e-5);
    }
}
