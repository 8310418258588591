use std::fs;
use std::path::Path;
use std::sync::Arc;

use doccheck_config::{DoccheckConfig, load_workspace_config, model_files, validate_config};
use doccheck_infer::{InferError, load_classifier, load_similarity_model};

use crate::AnalysisError;
use crate::batch::BatchRunner;
use crate::change::MethodChange;
use crate::detector::JitDetector;
use crate::metrics::MetricsCalculator;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PipelineOverrides {
    pub threshold: Option<f32>,
    pub metrics_only: bool,
}

/// Loads the workspace config and every model it names into a ready batch runner.
pub fn load_pipeline(
    workspace: impl AsRef<Path>,
    overrides: PipelineOverrides,
) -> Result<(DoccheckConfig, BatchRunner), AnalysisError> {
    let workspace = workspace.as_ref();
    let mut config = load_workspace_config(workspace)?;
    if let Some(threshold) = overrides.threshold {
        config.detector.threshold = threshold.clamp(0.0, 1.0);
    }
    for warning in validate_config(&config) {
        tracing::warn!(code = warning.code, "{}", warning.message);
    }

    let files = model_files(workspace, &config);
    let missing = files
        .missing_files()
        .into_iter()
        .filter(|path| !(overrides.metrics_only && *path == files.classifier_path.as_path()))
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(InferError::ModelUnavailable(format!(
            "missing model files: {}",
            missing.join(", ")
        ))
        .into());
    }

    let similarity = load_similarity_model(&files)?;
    let embedding_config = Arc::new(similarity.config().clone());
    let metrics = Arc::new(MetricsCalculator::new(similarity));
    let mut runner = BatchRunner::from_config(&config).with_metrics(metrics);

    if !overrides.metrics_only {
        let classifier = load_classifier(&files)?;
        runner = runner.with_detector(Arc::new(JitDetector::new(
            embedding_config,
            classifier,
            config.detector.threshold,
        )));
    }

    tracing::info!(
        workspace = %workspace.display(),
        threshold = config.detector.threshold,
        metrics_only = overrides.metrics_only,
        concurrency = runner.concurrency(),
        "pipeline ready"
    );
    Ok((config, runner))
}

/// Reads a JSON array of changes.
pub fn read_changes(path: impl AsRef<Path>) -> Result<Vec<MethodChange>, AnalysisError> {
    let raw = fs::read_to_string(path)?;
    parse_changes(&raw)
}

pub fn parse_changes(raw: &str) -> Result<Vec<MethodChange>, AnalysisError> {
    Ok(serde_json::from_str(raw)?)
}
