use std::ffi::OsStr;
use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use doccheck_analysis::load_pipeline;
use doccheck_config::{config_path, ensure_workspace_config, validate_config};
use doccheckd::cli::Cli;
use doccheckd::report::{evaluate_changes, load_changes, write_report};
use doccheckd::telemetry::init_tracing;

fn main() -> Result<()> {
    let cli = parse_cli();
    run(cli)
}

fn parse_cli() -> Cli {
    let mut args: Vec<_> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == OsStr::new("--")) {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.log_json, cli.log_level);

    let workspace = cli.workspace.canonicalize().with_context(|| {
        format!(
            "failed to resolve workspace path {}",
            cli.workspace.display()
        )
    })?;

    if cli.init {
        let config = ensure_workspace_config(&workspace).with_context(|| {
            format!(
                "failed to load or create workspace config at {}",
                config_path(&workspace).display()
            )
        })?;
        for warning in validate_config(&config) {
            eprintln!(
                "doccheck config warning [{}]: {}",
                warning.code, warning.message
            );
        }
        println!("{}", config_path(&workspace).display());
        return Ok(());
    }

    let (_config, runner) = load_pipeline(&workspace, cli.overrides()).with_context(|| {
        format!(
            "failed to load detector models for workspace {}",
            workspace.display()
        )
    })?;
    let changes = load_changes(cli.input.as_deref(), io::stdin().lock())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    let entries = runtime.block_on(evaluate_changes(&runner, changes))?;

    let mut out = io::stdout().lock();
    write_report(&mut out, &entries)
}
