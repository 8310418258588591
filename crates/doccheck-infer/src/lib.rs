use std::path::Path;
use std::sync::Arc;

use doccheck_config::{ModelBackendKind, ModelFilesConfig};
use thiserror::Error;

mod checksum;
mod classifier;
mod embedding;
#[cfg(feature = "onnx")]
mod onnx;
mod similarity;
mod vocab;

pub use checksum::{CHECKSUMS_FILE, verify_checksums, write_checksums};
#[cfg(feature = "onnx")]
pub use classifier::onnx::OnnxClassifier;
pub use classifier::{
    CODE_FEATURES_INPUT, CODE_IDS_INPUT, CODE_LENS_INPUT, ClassifierInputs,
    ConsistencyClassifier, MockClassifier, NL_FEATURES_INPUT, NL_IDS_INPUT, NL_LENS_INPUT,
    positive_probability,
};
pub use embedding::candle::{CANDLE_BACKEND_NAME, CandleTokenEmbedder};
#[cfg(feature = "onnx")]
pub use embedding::onnx::{ONNX_BACKEND_NAME, OnnxTokenEmbedder};
pub use embedding::{EMBEDDING_DIM, MockTokenEmbedder, TokenEmbedder};
pub use similarity::{SimilarityModel, cosine_matrix, liu_similarity};
pub use vocab::{EmbeddingConfig, Vocabulary, VocabularyKind};

#[derive(Debug, Error)]
pub enum InferError {
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("model config decoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("candle model operation failed: {0}")]
    Candle(#[from] candle_core::Error),
    #[error("invalid model response: {0}")]
    InvalidModelResponse(String),
    #[error("{0}")]
    ModelUnavailable(String),
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

pub fn load_embedding_config(files: &ModelFilesConfig) -> Result<EmbeddingConfig, InferError> {
    require_file(&files.embedding_config_path, "embedding config")?;
    EmbeddingConfig::from_file(&files.embedding_config_path)
}

/// Loads both embedding tables and the vocabularies for the configured backend.
pub fn load_similarity_model(files: &ModelFilesConfig) -> Result<SimilarityModel, InferError> {
    verify_model_files(
        files,
        &[
            files.code_embedding_path.as_path(),
            files.comment_embedding_path.as_path(),
            files.embedding_config_path.as_path(),
        ],
    )?;

    let config = Arc::new(load_embedding_config(files)?);
    let code_embedder = load_token_embedder(files.backend, &files.code_embedding_path)?;
    let comment_embedder = load_token_embedder(files.backend, &files.comment_embedding_path)?;

    tracing::info!(
        backend = files.backend.as_str(),
        model_dir = %files.model_root.display(),
        max_code_len = config.max_code_len,
        max_comment_len = config.max_comment_len,
        "loaded similarity model"
    );

    Ok(SimilarityModel::new(config, code_embedder, comment_embedder))
}

fn load_token_embedder(
    backend: ModelBackendKind,
    path: &Path,
) -> Result<Arc<dyn TokenEmbedder>, InferError> {
    match backend {
        ModelBackendKind::Safetensors => Ok(Arc::new(CandleTokenEmbedder::load(path)?)),
        #[cfg(feature = "onnx")]
        ModelBackendKind::Onnx => Ok(Arc::new(OnnxTokenEmbedder::load(path)?)),
        #[cfg(not(feature = "onnx"))]
        ModelBackendKind::Onnx => Err(onnx_disabled(path)),
    }
}

/// Loads the pretrained JIT classifier graph.
pub fn load_classifier(
    files: &ModelFilesConfig,
) -> Result<Arc<dyn ConsistencyClassifier>, InferError> {
    verify_model_files(files, &[files.classifier_path.as_path()])?;
    require_file(&files.classifier_path, "classifier")?;
    open_classifier(&files.classifier_path)
}

#[cfg(feature = "onnx")]
fn open_classifier(path: &Path) -> Result<Arc<dyn ConsistencyClassifier>, InferError> {
    Ok(Arc::new(OnnxClassifier::load(path)?))
}

#[cfg(not(feature = "onnx"))]
fn open_classifier(path: &Path) -> Result<Arc<dyn ConsistencyClassifier>, InferError> {
    Err(onnx_disabled(path))
}

fn require_file(path: &Path, what: &str) -> Result<(), InferError> {
    if path.exists() {
        Ok(())
    } else {
        Err(InferError::ModelUnavailable(format!(
            "{what} not found at {}",
            path.display()
        )))
    }
}

fn verify_model_files(files: &ModelFilesConfig, paths: &[&Path]) -> Result<(), InferError> {
    let names = paths
        .iter()
        .filter_map(|path| path.strip_prefix(&files.model_root).ok())
        .filter_map(|relative| relative.to_str())
        .collect::<Vec<_>>();
    verify_checksums(&files.model_root, &names)?;
    Ok(())
}

#[cfg(not(feature = "onnx"))]
fn onnx_disabled(path: &Path) -> InferError {
    InferError::ModelUnavailable(format!(
        "{} needs an ONNX runtime; rebuild doccheck-infer with the `onnx` feature",
        path.display()
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use candle_core::{Device, Tensor};
    use doccheck_config::{DoccheckConfig, model_files};
    use tempfile::tempdir;

    use super::*;

    fn write_table(path: &Path, rows: usize, dim: usize) {
        let values = (0..rows * dim).map(|value| value as f32 + 1.0).collect();
        let table = Tensor::from_vec(values, (rows, dim), &Device::Cpu).expect("table");
        candle_core::safetensors::save(&HashMap::from([("weight".to_owned(), table)]), path)
            .expect("save safetensors");
    }

    fn write_models(root: &Path) -> ModelFilesConfig {
        let files = model_files(root, &DoccheckConfig::default());
        fs::create_dir_all(&files.model_root).expect("create model dir");
        write_table(&files.code_embedding_path, 4, 3);
        write_table(&files.comment_embedding_path, 3, 3);
        fs::write(
            &files.embedding_config_path,
            r#"{
                "max_code_len": 6,
                "max_nl_len": 4,
                "unk": "<UNK>",
                "pad": "<PAD>",
                "nl": {"<PAD>": 0, "<UNK>": 1, "count": 2},
                "code": {"<PAD>": 0, "<UNK>": 1, "count": 2, "return": 3}
            }"#,
        )
        .expect("write embedding config");
        files
    }

    #[test]
    fn loads_safetensors_similarity_model() {
        let temp = tempdir().expect("tempdir");
        let files = write_models(temp.path());

        let model = load_similarity_model(&files).expect("load similarity model");
        assert_eq!(model.config().max_code_len, 6);

        let score = model
            .similarity(&["return", "count"], &["count"], VocabularyKind::Code)
            .expect("similarity");
        assert!(score > 0.0 && score <= 1.0 + 1e-6);
    }

    #[test]
    fn missing_embedding_config_is_model_unavailable() {
        let temp = tempdir().expect("tempdir");
        let files = write_models(temp.path());
        fs::remove_file(&files.embedding_config_path).expect("remove config");

        assert!(matches!(
            load_similarity_model(&files),
            Err(InferError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn checksum_mismatch_blocks_loading() {
        let temp = tempdir().expect("tempdir");
        let files = write_models(temp.path());
        write_checksums(
            &files.model_root,
            &["code_embeddings.safetensors", "comment_embeddings.safetensors"],
        )
        .expect("write checksums");
        write_table(&files.code_embedding_path, 5, 3);

        assert!(matches!(
            load_similarity_model(&files),
            Err(InferError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn missing_classifier_is_model_unavailable() {
        let temp = tempdir().expect("tempdir");
        let files = write_models(temp.path());

        assert!(matches!(
            load_classifier(&files),
            Err(InferError::ModelUnavailable(_))
        ));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn onnx_backend_needs_the_onnx_feature() {
        let temp = tempdir().expect("tempdir");
        let mut files = write_models(temp.path());
        files.backend = ModelBackendKind::Onnx;

        assert!(matches!(
            load_similarity_model(&files),
            Err(InferError::ModelUnavailable(_))
        ));

        fs::write(&files.classifier_path, b"not a graph").expect("write classifier");
        assert!(matches!(
            load_classifier(&files),
            Err(InferError::ModelUnavailable(_))
        ));
    }
}
