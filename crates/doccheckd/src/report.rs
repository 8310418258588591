use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use doccheck_analysis::{
    AnalysisError, BatchRunner, ChangeOutcome, MethodChange, parse_changes, read_changes,
};
use serde::Serialize;

/// One element of the JSON array printed on stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Outcome(ChangeOutcome),
    Failed { index: usize, error: String },
}

impl ReportEntry {
    pub fn from_result(index: usize, result: Result<ChangeOutcome, AnalysisError>) -> Self {
        match result {
            Ok(outcome) => Self::Outcome(outcome),
            Err(err) => Self::Failed {
                index,
                error: err.to_string(),
            },
        }
    }

    pub fn is_flagged(&self) -> bool {
        match self {
            Self::Outcome(outcome) => outcome
                .prediction
                .is_some_and(|prediction| prediction.verdict.is_inconsistent() == Some(true)),
            Self::Failed { .. } => false,
        }
    }
}

/// Reads changes from `input`, or from `stdin` when no path is given.
pub fn load_changes(input: Option<&Path>, mut stdin: impl Read) -> Result<Vec<MethodChange>> {
    match input {
        Some(path) => read_changes(path)
            .with_context(|| format!("failed to read changes from {}", path.display())),
        None => {
            let mut raw = String::new();
            stdin
                .read_to_string(&mut raw)
                .context("failed to read changes from stdin")?;
            parse_changes(&raw).context("failed to parse changes from stdin")
        }
    }
}

pub async fn evaluate_changes(
    runner: &BatchRunner,
    changes: Vec<MethodChange>,
) -> Result<Vec<ReportEntry>> {
    let results = runner
        .run(changes)
        .await
        .context("batch evaluation failed")?;
    let entries = results
        .into_iter()
        .enumerate()
        .map(|(index, result)| ReportEntry::from_result(index, result))
        .collect::<Vec<_>>();

    let flagged = entries.iter().filter(|entry| entry.is_flagged()).count();
    tracing::info!(total = entries.len(), flagged, "evaluation complete");
    Ok(entries)
}

pub fn write_report(out: &mut impl Write, entries: &[ReportEntry]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, entries).context("failed to serialize report")?;
    writeln!(out).context("failed to write report")?;
    Ok(())
}
