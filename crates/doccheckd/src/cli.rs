use std::path::PathBuf;

use clap::Parser;
use doccheck_analysis::PipelineOverrides;
use tracing::Level;

#[derive(Debug, Clone, Parser)]
#[command(
    author,
    version,
    about = "Just-in-time checker for comments left stale by code changes"
)]
pub struct Cli {
    #[arg(
        long,
        default_value = ".",
        help = "Workspace root holding .doccheck/config.toml and the model directory"
    )]
    pub workspace: PathBuf,

    #[arg(
        long,
        conflicts_with = "init",
        help = "JSON array of method changes to evaluate (reads stdin when omitted)"
    )]
    pub input: Option<PathBuf>,

    #[arg(
        long,
        value_parser = parse_threshold,
        conflicts_with = "metrics_only",
        help = "Inconsistency probability above which a comment is flagged (overrides [detector] threshold)"
    )]
    pub threshold: Option<f32>,

    #[arg(long, help = "Compute change metrics only, without loading the classifier")]
    pub metrics_only: bool,

    #[arg(long, help = "Emit logs on stderr as JSON lines")]
    pub log_json: bool,

    #[arg(
        long,
        default_value = "info",
        value_parser = parse_log_level,
        help = "Log level when RUST_LOG is unset: trace, debug, info, warn, or error"
    )]
    pub log_level: Level,

    #[arg(
        long,
        conflicts_with_all = ["threshold", "metrics_only"],
        help = "Write the default workspace config if missing and exit"
    )]
    pub init: bool,
}

impl Cli {
    pub fn overrides(&self) -> PipelineOverrides {
        PipelineOverrides {
            threshold: self.threshold,
            metrics_only: self.metrics_only,
        }
    }
}

pub fn parse_threshold(value: &str) -> Result<f32, String> {
    let parsed = value
        .trim()
        .parse::<f32>()
        .map_err(|_| format!("invalid threshold '{value}', expected a number in [0, 1]"))?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(format!("threshold {parsed} is outside [0, 1]"));
    }
    Ok(parsed)
}

pub fn parse_log_level(value: &str) -> Result<Level, String> {
    value.trim().parse::<Level>().map_err(|_| {
        format!("invalid log level '{value}', expected one of: trace, debug, info, warn, error")
    })
}
