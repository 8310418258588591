use std::sync::Arc;

use doccheck_config::DoccheckConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::AnalysisError;
use crate::change::MethodChange;
use crate::detector::{JitDetector, Prediction};
use crate::metrics::{MethodMetric, MetricsCalculator};

/// Result of evaluating one change of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeOutcome {
    /// Position of the change in the submitted batch.
    pub index: usize,
    pub metric: Option<MethodMetric>,
    pub prediction: Option<Prediction>,
}

/// Evaluates independent method changes on a bounded pool of blocking workers.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    metrics: Option<Arc<MetricsCalculator>>,
    detector: Option<Arc<JitDetector>>,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(concurrency: usize) -> Self {
        Self {
            metrics: None,
            detector: None,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(config: &DoccheckConfig) -> Self {
        Self::new(config.pipeline.concurrency)
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCalculator>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_detector(mut self, detector: Arc<JitDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Evaluates one change on the calling thread.
    pub fn evaluate(
        &self,
        index: usize,
        change: &MethodChange,
    ) -> Result<ChangeOutcome, AnalysisError> {
        evaluate_change(
            index,
            change,
            self.metrics.as_deref(),
            self.detector.as_deref(),
        )
    }

    /// One result per change, in input order. A failing change does not stop the batch.
    pub async fn run(
        &self,
        changes: Vec<MethodChange>,
    ) -> Result<Vec<Result<ChangeOutcome, AnalysisError>>, AnalysisError> {
        let total = changes.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for (index, change) in changes.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let metrics = self.metrics.clone();
            let detector = self.detector.clone();

            join_set.spawn(async move {
                let permit = semaphore.acquire_owned().await;
                let _permit = match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            Err(AnalysisError::Message("batch semaphore closed".to_owned())),
                        );
                    }
                };

                let evaluated = tokio::task::spawn_blocking(move || {
                    evaluate_change(index, &change, metrics.as_deref(), detector.as_deref())
                })
                .await;

                match evaluated {
                    Ok(result) => (index, result),
                    Err(err) => (
                        index,
                        Err(AnalysisError::Message(format!(
                            "evaluation worker for change {index} failed: {err}"
                        ))),
                    ),
                }
            });
        }

        let mut slots = (0..total).map(|_| None).collect::<Vec<_>>();
        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined.map_err(|err| {
                AnalysisError::Message(format!("batch task join error: {err}"))
            })?;
            if let Err(err) = &result {
                tracing::warn!(index, error = %err, "change evaluation failed");
            }
            slots[index] = Some(result);
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    Err(AnalysisError::Message(format!(
                        "change {index} produced no result"
                    )))
                })
            })
            .collect::<Vec<_>>();

        let failed = results.iter().filter(|result| result.is_err()).count();
        tracing::info!(total, failed, concurrency = self.concurrency, "batch finished");
        Ok(results)
    }
}

fn evaluate_change(
    index: usize,
    change: &MethodChange,
    metrics: Option<&MetricsCalculator>,
    detector: Option<&JitDetector>,
) -> Result<ChangeOutcome, AnalysisError> {
    let metric = match metrics {
        Some(metrics) => metrics.calculate(change)?,
        None => None,
    };
    let prediction = match detector {
        Some(detector) => Some(detector.predict(change)?),
        None => None,
    };

    Ok(ChangeOutcome {
        index,
        metric,
        prediction,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use doccheck_infer::{
        ClassifierInputs, ConsistencyClassifier, EmbeddingConfig, InferError, MockClassifier,
        MockTokenEmbedder, SimilarityModel,
    };

    use super::*;
    use crate::detector::Verdict;

    fn embedding_config() -> Arc<EmbeddingConfig> {
        let vocab = ["<PAD>", "<UNK>", "get", "count", "total", "return", "the"]
            .iter()
            .enumerate()
            .map(|(id, word)| ((*word).to_owned(), id as u32))
            .collect::<HashMap<_, _>>();
        Arc::new(EmbeddingConfig {
            max_code_len: 24,
            max_comment_len: 8,
            unknown_token: "<UNK>".to_owned(),
            padding_token: "<PAD>".to_owned(),
            comment_vocab: vocab.clone(),
            code_vocab: vocab,
        })
    }

    fn metrics() -> Arc<MetricsCalculator> {
        Arc::new(MetricsCalculator::new(SimilarityModel::new(
            embedding_config(),
            Arc::new(MockTokenEmbedder::new()),
            Arc::new(MockTokenEmbedder::new()),
        )))
    }

    fn detector(classifier: Arc<dyn ConsistencyClassifier>) -> Arc<JitDetector> {
        Arc::new(JitDetector::new(embedding_config(), classifier, 0.5))
    }

    fn changes() -> Vec<MethodChange> {
        vec![
            MethodChange::new(
                "int getCount() { return count; }",
                "int getCount() { return total; }",
                "Returns the count",
                "Returns the count",
            ),
            MethodChange::new("int a;", "int a;", "x", "x"),
            MethodChange::new(
                "int getCount() { return count; }",
                "int getTotal() { return total; }",
                "Returns the count",
                "",
            ),
            MethodChange::new(
                "int getCount() { return count; }",
                "int getCount() { return count + 1; }",
                "Returns the count",
                "Returns the count plus one, never negative",
            ),
        ]
    }

    /// Fails for comments longer than four subtokens.
    struct ShortCommentClassifier;

    impl ConsistencyClassifier for ShortCommentClassifier {
        fn logits(&self, inputs: &ClassifierInputs) -> Result<[f32; 2], InferError> {
            if inputs.comment_len > 4 {
                return Err(InferError::InvalidModelResponse("comment too long".to_owned()));
            }
            Ok([0.0, 2.0])
        }

        fn backend_name(&self) -> &str {
            "short-comment"
        }
    }

    #[tokio::test]
    async fn results_come_back_in_input_order() {
        let runner = BatchRunner::new(2)
            .with_metrics(metrics())
            .with_detector(detector(Arc::new(MockClassifier::new().with_probability(0.9))));

        let results = runner.run(changes()).await.expect("run batch");
        assert_eq!(results.len(), 4);
        for (position, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().expect("outcome").index, position);
        }

        let first = results[0].as_ref().expect("first");
        assert!(first.metric.is_some());
        assert_eq!(
            first.prediction.map(|prediction| prediction.verdict),
            Some(Verdict::Inconsistent)
        );

        let unchanged = results[1].as_ref().expect("unchanged");
        assert!(unchanged.metric.is_none());

        let uncommented = results[2].as_ref().expect("uncommented");
        assert_eq!(
            uncommented.prediction.map(|prediction| prediction.verdict),
            Some(Verdict::NotApplicable)
        );
    }

    #[tokio::test]
    async fn failing_change_does_not_stop_the_batch() {
        let runner = BatchRunner::new(3).with_detector(detector(Arc::new(ShortCommentClassifier)));

        let results = runner.run(changes()).await.expect("run batch");
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].is_ok());
        assert!(matches!(
            results[3],
            Err(AnalysisError::Infer(InferError::InvalidModelResponse(_)))
        ));
    }

    #[tokio::test]
    async fn metrics_only_runner_skips_classification() {
        let runner = BatchRunner::from_config(&DoccheckConfig::default()).with_metrics(metrics());
        assert_eq!(runner.concurrency(), 4);

        let results = runner.run(changes()).await.expect("run batch");
        assert!(results.iter().all(|result| {
            result
                .as_ref()
                .is_ok_and(|outcome| outcome.prediction.is_none())
        }));
    }

    #[tokio::test]
    async fn empty_batch_is_empty() {
        let runner = BatchRunner::new(0);
        assert_eq!(runner.concurrency(), 1);
        assert!(runner.run(Vec::new()).await.expect("run batch").is_empty());
    }

    #[test]
    fn evaluate_runs_inline() {
        let runner = BatchRunner::new(1).with_metrics(metrics());
        let outcome = runner.evaluate(7, &changes()[0]).expect("evaluate");
        assert_eq!(outcome.index, 7);
        assert!(outcome.metric.is_some());
    }
}
