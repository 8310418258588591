use std::collections::HashMap;
use std::fs;
use std::path::Path;

use candle_core::{Device, Tensor};
use doccheck_analysis::{PipelineOverrides, load_pipeline};
use doccheck_config::{DoccheckConfig, model_files};
use doccheckd::report::{ReportEntry, evaluate_changes, load_changes, write_report};
use tempfile::tempdir;

fn write_table(path: &Path, rows: usize) {
    let values = (0..rows * 3).map(|value| (value % 4) as f32 - 1.5).collect();
    let table = Tensor::from_vec(values, (rows, 3), &Device::Cpu).expect("table");
    candle_core::safetensors::save(&HashMap::from([("weight".to_owned(), table)]), path)
        .expect("save safetensors");
}

fn write_models(workspace: &Path) {
    let files = model_files(workspace, &DoccheckConfig::default());
    fs::create_dir_all(&files.model_root).expect("model dir");
    write_table(&files.code_embedding_path, 7);
    write_table(&files.comment_embedding_path, 7);
    fs::write(
        &files.embedding_config_path,
        r#"{"max_code_len": 32, "max_nl_len": 16, "unk": "<UNK>", "pad": "<PAD>",
            "nl": {"<PAD>": 0, "<UNK>": 1},
            "code": {"<PAD>": 0, "<UNK>": 1, "int": 2, "get": 3, "count": 4, "total": 5, "returns": 6}}"#,
    )
    .expect("embedding config");
}

#[tokio::test]
async fn metrics_only_report_covers_every_change() {
    let temp = tempdir().expect("tempdir");
    write_models(temp.path());

    let input = temp.path().join("changes.json");
    fs::write(
        &input,
        r#"[
            {"old_code": "int getCount() { return count; }",
             "new_code": "int getTotal() { return total; }",
             "old_comment": "Returns the count",
             "new_comment": "Returns the count",
             "refactorings": ["rename_method"]},
            {"old_code": "int a;", "new_code": "int a;", "old_comment": "x", "new_comment": "x"}
        ]"#,
    )
    .expect("write changes");

    let (_config, runner) = load_pipeline(
        temp.path(),
        PipelineOverrides {
            threshold: None,
            metrics_only: true,
        },
    )
    .expect("load pipeline");
    let changes = load_changes(Some(input.as_path()), std::io::empty()).expect("load changes");
    let entries = evaluate_changes(&runner, changes)
        .await
        .expect("evaluate");
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|entry| !entry.is_flagged()));

    let mut out = Vec::new();
    write_report(&mut out, &entries).expect("write report");
    let report: serde_json::Value = serde_json::from_slice(&out).expect("report json");

    assert_eq!(report[0]["index"], 0);
    assert_eq!(report[0]["metric"]["isRenamed"], true);
    assert!(report[0]["prediction"].is_null());
    assert_eq!(report[1]["index"], 1);
    assert!(report[1]["metric"].is_null());

    match &entries[1] {
        ReportEntry::Outcome(outcome) => assert!(outcome.metric.is_none()),
        ReportEntry::Failed { error, .. } => panic!("unchanged method failed: {error}"),
    }
}

#[test]
fn missing_input_file_is_reported_with_its_path() {
    let temp = tempdir().expect("tempdir");
    let missing = temp.path().join("absent.json");

    let err = load_changes(Some(missing.as_path()), std::io::empty()).expect_err("missing file");
    assert!(err.to_string().contains("absent.json"));
}
