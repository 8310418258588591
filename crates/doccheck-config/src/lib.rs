use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DOCCHECK_DIR_NAME: &str = ".doccheck";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_MODELS_DIR: &str = ".doccheck/models";
pub const DEFAULT_CODE_EMBEDDING_FILE: &str = "code_embeddings.safetensors";
pub const DEFAULT_COMMENT_EMBEDDING_FILE: &str = "comment_embeddings.safetensors";
pub const DEFAULT_CLASSIFIER_FILE: &str = "model.onnx";
pub const DEFAULT_EMBEDDING_CONFIG_FILE: &str = "model_embedding_config.json";
pub const DEFAULT_DETECTOR_THRESHOLD: f32 = 0.5;
pub const DEFAULT_PIPELINE_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelBackendKind {
    #[default]
    Safetensors,
    Onnx,
}

impl ModelBackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safetensors => "safetensors",
            Self::Onnx => "onnx",
        }
    }
}

impl std::str::FromStr for ModelBackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "safetensors" => Ok(Self::Safetensors),
            "onnx" => Ok(Self::Onnx),
            other => Err(format!(
                "invalid model backend '{other}', expected one of: safetensors, onnx"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DoccheckConfig {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_models_dir")]
    pub dir: String,
    #[serde(default)]
    pub backend: ModelBackendKind,
    #[serde(default = "default_code_embedding_file")]
    pub code_embedding_file: String,
    #[serde(default = "default_comment_embedding_file")]
    pub comment_embedding_file: String,
    #[serde(default = "default_classifier_file")]
    pub classifier_file: String,
    #[serde(default = "default_embedding_config_file")]
    pub embedding_config_file: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
            backend: ModelBackendKind::Safetensors,
            code_embedding_file: default_code_embedding_file(),
            comment_embedding_file: default_comment_embedding_file(),
            classifier_file: default_classifier_file(),
            embedding_config_file: default_embedding_config_file(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_detector_threshold")]
    pub threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: default_detector_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_concurrency")]
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_pipeline_concurrency(),
        }
    }
}

/// Resolved on-disk locations of every model artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFilesConfig {
    pub model_root: PathBuf,
    pub backend: ModelBackendKind,
    pub code_embedding_path: PathBuf,
    pub comment_embedding_path: PathBuf,
    pub classifier_path: PathBuf,
    pub embedding_config_path: PathBuf,
}

impl ModelFilesConfig {
    pub fn from_models_config(workspace_root: impl AsRef<Path>, models: &ModelsConfig) -> Self {
        let dir = PathBuf::from(&models.dir);
        let model_root = if dir.is_absolute() {
            dir
        } else {
            workspace_root.as_ref().join(dir)
        };

        Self {
            backend: models.backend,
            code_embedding_path: model_root.join(&models.code_embedding_file),
            comment_embedding_path: model_root.join(&models.comment_embedding_file),
            classifier_path: model_root.join(&models.classifier_file),
            embedding_config_path: model_root.join(&models.embedding_config_file),
            model_root,
        }
    }

    pub fn missing_files(&self) -> Vec<&Path> {
        [
            self.code_embedding_path.as_path(),
            self.comment_embedding_path.as_path(),
            self.classifier_path.as_path(),
            self.embedding_config_path.as_path(),
        ]
        .into_iter()
        .filter(|path| !path.exists())
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn doccheck_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(DOCCHECK_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    doccheck_dir(workspace_root).join(CONFIG_FILE_NAME)
}

pub fn model_files(workspace_root: impl AsRef<Path>, config: &DoccheckConfig) -> ModelFilesConfig {
    ModelFilesConfig::from_models_config(workspace_root, &config.models)
}

pub fn load_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<DoccheckConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(DoccheckConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: DoccheckConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<DoccheckConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(doccheck_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = DoccheckConfig::default();
    let content = toml::to_string_pretty(&config)?;
    fs::write(path, content)?;

    Ok(config)
}

pub fn validate_config(config: &DoccheckConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    let threshold = config.detector.threshold;
    if threshold <= 0.0 || threshold >= 1.0 {
        warnings.push(ConfigWarning {
            code: "detector_threshold_degenerate",
            message: format!(
                "detector threshold {threshold} makes every verdict identical; expected a value strictly between 0 and 1"
            ),
        });
    }

    let expected_extension = match config.models.backend {
        ModelBackendKind::Safetensors => ".safetensors",
        ModelBackendKind::Onnx => ".onnx",
    };
    for file in [
        &config.models.code_embedding_file,
        &config.models.comment_embedding_file,
    ] {
        if !file.ends_with(expected_extension) {
            warnings.push(ConfigWarning {
                code: "embedding_backend_mismatch",
                message: format!(
                    "embedding file '{file}' does not look like a {} artifact",
                    config.models.backend.as_str()
                ),
            });
        }
    }

    warnings
}

fn default_models_dir() -> String {
    DEFAULT_MODELS_DIR.to_owned()
}

fn default_code_embedding_file() -> String {
    DEFAULT_CODE_EMBEDDING_FILE.to_owned()
}

fn default_comment_embedding_file() -> String {
    DEFAULT_COMMENT_EMBEDDING_FILE.to_owned()
}

fn default_classifier_file() -> String {
    DEFAULT_CLASSIFIER_FILE.to_owned()
}

fn default_embedding_config_file() -> String {
    DEFAULT_EMBEDDING_CONFIG_FILE.to_owned()
}

fn default_detector_threshold() -> f32 {
    DEFAULT_DETECTOR_THRESHOLD
}

fn default_pipeline_concurrency() -> usize {
    DEFAULT_PIPELINE_CONCURRENCY
}

fn normalize_or_default(value: &str, default: fn() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default()
    } else {
        trimmed.to_owned()
    }
}

fn normalize_config(mut config: DoccheckConfig) -> DoccheckConfig {
    let models = &mut config.models;
    models.dir = normalize_or_default(&models.dir, default_models_dir);
    models.code_embedding_file =
        normalize_or_default(&models.code_embedding_file, default_code_embedding_file);
    models.comment_embedding_file =
        normalize_or_default(&models.comment_embedding_file, default_comment_embedding_file);
    models.classifier_file = normalize_or_default(&models.classifier_file, default_classifier_file);
    models.embedding_config_file =
        normalize_or_default(&models.embedding_config_file, default_embedding_config_file);

    if config.detector.threshold.is_nan() {
        config.detector.threshold = default_detector_threshold();
    }
    config.detector.threshold = config.detector.threshold.clamp(0.0, 1.0);
    config.pipeline.concurrency = config.pipeline.concurrency.max(1);

    config
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn ensure_workspace_config_creates_default_file() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();

        let config = ensure_workspace_config(workspace).expect("ensure config");

        assert_eq!(config.models.backend, ModelBackendKind::Safetensors);
        assert_eq!(config.detector.threshold, DEFAULT_DETECTOR_THRESHOLD);
        assert_eq!(config.pipeline.concurrency, DEFAULT_PIPELINE_CONCURRENCY);
        assert!(config_path(workspace).exists());

        let content = fs::read_to_string(config_path(workspace)).expect("read config file");
        assert!(content.contains("[models]"));
        assert!(content.contains("[detector]"));
        assert!(content.contains("backend = \"safetensors\""));
    }

    #[test]
    fn load_workspace_config_parses_and_normalizes_values() {
        let temp = tempdir().expect("tempdir");
        let workspace = temp.path();
        fs::create_dir_all(doccheck_dir(workspace)).expect("create .doccheck");

        let raw = r#"
[models]
dir = "/opt/doccheck/models"
backend = "onnx"
classifier_file = "  "

[detector]
threshold = 0.9

[pipeline]
concurrency = 0
"#;
        fs::write(config_path(workspace), raw).expect("write config");

        let config = load_workspace_config(workspace).expect("load config");

        assert_eq!(config.models.backend, ModelBackendKind::Onnx);
        assert_eq!(config.models.dir, "/opt/doccheck/models");
        assert_eq!(config.models.classifier_file, DEFAULT_CLASSIFIER_FILE);
        assert!((config.detector.threshold - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.pipeline.concurrency, 1);
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let temp = tempdir().expect("tempdir");
        let config = load_workspace_config(temp.path()).expect("load config");
        assert_eq!(config, DoccheckConfig::default());
    }

    #[test]
    fn model_files_resolve_relative_to_workspace() {
        let temp = tempdir().expect("tempdir");
        let files = model_files(temp.path(), &DoccheckConfig::default());

        assert_eq!(files.model_root, temp.path().join(DEFAULT_MODELS_DIR));
        assert_eq!(
            files.embedding_config_path,
            temp.path()
                .join(DEFAULT_MODELS_DIR)
                .join(DEFAULT_EMBEDDING_CONFIG_FILE)
        );
        assert_eq!(files.missing_files().len(), 4);
    }

    #[test]
    fn validate_config_flags_degenerate_threshold() {
        let mut config = DoccheckConfig::default();
        config.detector.threshold = 1.0;

        let warnings = validate_config(&config);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "detector_threshold_degenerate");
    }

    #[test]
    fn validate_config_flags_embedding_files_of_the_other_backend() {
        let mut config = DoccheckConfig::default();
        assert!(validate_config(&config).is_empty());

        config.models.backend = ModelBackendKind::Onnx;
        config.models.code_embedding_file = "code_embeddings.onnx".to_owned();

        let warnings = validate_config(&config);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, "embedding_backend_mismatch");
        assert!(warnings[0].message.contains("comment_embeddings.safetensors"));
    }

    #[test]
    fn backend_kind_parses_from_str() {
        assert_eq!(
            "onnx".parse::<ModelBackendKind>(),
            Ok(ModelBackendKind::Onnx)
        );
        assert!("tflite".parse::<ModelBackendKind>().is_err());
    }
}
