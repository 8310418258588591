use std::collections::HashMap;
use std::sync::Arc;

use doccheck_analysis::{
    BatchRunner, CommentUpdateLabel, DatasetSample, JitDetector, MethodChange, MetricsCalculator,
    RawDatasetSample, RefactoringKind, Verdict, is_method_changed,
};
use doccheck_infer::{EmbeddingConfig, MockClassifier, MockTokenEmbedder, SimilarityModel};

fn embedding_config() -> Arc<EmbeddingConfig> {
    let vocab = [
        "<PAD>", "<UNK>", "int", "a", "get", "count", "size", "return", "returns", "the",
    ]
    .iter()
    .enumerate()
    .map(|(id, word)| ((*word).to_owned(), id as u32))
    .collect::<HashMap<_, _>>();
    Arc::new(EmbeddingConfig {
        max_code_len: 32,
        max_comment_len: 12,
        unknown_token: "<UNK>".to_owned(),
        padding_token: "<PAD>".to_owned(),
        comment_vocab: vocab.clone(),
        code_vocab: vocab,
    })
}

fn calculator() -> MetricsCalculator {
    MetricsCalculator::new(SimilarityModel::new(
        embedding_config(),
        Arc::new(MockTokenEmbedder::new()),
        Arc::new(MockTokenEmbedder::new().with_seed(7)),
    ))
}

#[test]
fn untouched_method_yields_no_metric() {
    assert!(!is_method_changed("x", "int a;", "x", "int a;"));

    let change = MethodChange::new("int a;", "int a;", "x", "x");
    assert_eq!(calculator().calculate(&change).expect("calculate"), None);
}

#[test]
fn renamed_getter_is_measured_and_labelled() {
    let raw = RawDatasetSample {
        old_code: "int getCount() { return count; }".to_owned(),
        new_code: "int getSize() { return size; }".to_owned(),
        old_comment: "Returns the count".to_owned(),
        new_comment: "Returns the count".to_owned(),
        commit_id: "c0ffee".to_owned(),
        new_file_name: "src/Counter.java".to_owned(),
        ..RawDatasetSample::default()
    };
    let change = raw
        .to_change()
        .with_refactorings([RefactoringKind::RenameMethod]);
    assert!(is_method_changed(
        &change.old_comment,
        &change.old_code,
        &change.new_comment,
        &change.new_code
    ));

    let metric = calculator()
        .calculate(&change)
        .expect("calculate")
        .expect("metric for a real change");
    assert!(metric.is_renamed);
    assert!(!metric.is_param_added);
    assert!(metric.changed_code_len > 0);
    assert!(metric.percentage_code_changed > 0.0);
    // "count" appears in the comment and in the removed code.
    assert!(metric.delete_comment_intersection_len >= 1);

    let detector = JitDetector::new(
        embedding_config(),
        Arc::new(MockClassifier::new().with_probability(0.9)),
        0.5,
    );
    let prediction = detector.predict(&change).expect("predict");
    assert_eq!(prediction.verdict, Verdict::Inconsistent);

    let label = CommentUpdateLabel::from_verdict(prediction.verdict).expect("applicable");
    let sample = DatasetSample::from_raw("counter", raw, "d00d", metric, label);
    assert_eq!(sample.old_commit, "c0ffee");
    assert_eq!(sample.label, CommentUpdateLabel::Inconsistency);
}

#[tokio::test]
async fn batch_mixes_metrics_and_verdicts() {
    let runner = BatchRunner::new(2)
        .with_metrics(Arc::new(calculator()))
        .with_detector(Arc::new(JitDetector::new(
            embedding_config(),
            Arc::new(MockClassifier::new().with_probability(0.1)),
            0.5,
        )));

    let changes = vec![
        MethodChange::new("int a;", "int a;", "x", "x"),
        MethodChange::new(
            "int getCount() { return count; }",
            "int getSize() { return size; }",
            "Returns the count",
            "Returns the size",
        ),
    ];

    let outcomes = runner
        .run(changes)
        .await
        .expect("run")
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .expect("no failures");

    assert!(outcomes[0].metric.is_none());
    assert!(outcomes[1].metric.is_some());
    assert_eq!(
        outcomes[1].prediction.map(|prediction| prediction.verdict),
        Some(Verdict::Consistent)
    );
}
