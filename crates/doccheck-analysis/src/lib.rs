use thiserror::Error;

mod batch;
mod change;
mod dataset;
mod detector;
mod metrics;
mod pipeline;
mod refactoring;

pub use batch::{BatchRunner, ChangeOutcome};
pub use change::MethodChange;
pub use dataset::{CommentUpdateLabel, DatasetSample, RawDatasetSample};
pub use detector::{JitDetector, Prediction, Verdict};
pub use metrics::{MethodMetric, MetricsCalculator, is_method_changed};
pub use pipeline::{PipelineOverrides, load_pipeline, parse_changes, read_changes};
pub use refactoring::{RefactoringFlags, RefactoringKind};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("config error: {0}")]
    Config(#[from] doccheck_config::ConfigError),
    #[error("inference error: {0}")]
    Infer(#[from] doccheck_infer::InferError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}
