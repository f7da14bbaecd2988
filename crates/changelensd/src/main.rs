use std::ffi::OsStr;

use anyhow::{Context, Result};
use changelens_config::{config_path, ensure_workspace_config, validate_config};
use changelensd::cli::Cli;
use changelensd::commands::run_command;
use changelensd::logging::init_tracing;
use changelensd::session::{Session, SessionOverrides};
use clap::Parser;

fn main() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.log_format)?;
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
    let config = ensure_workspace_config(&cli.workspace).with_context(|| {
        format!(
            "failed to load workspace config at {}",
            config_path(&cli.workspace).display()
        )
    })?;
    for warning in validate_config(&config) {
        tracing::warn!(code = warning.code, "{}", warning.message);
    }

    let session = Session::from_config(
        &config,
        SessionOverrides {
            backend_url: cli.backend_url.clone(),
            analysis_provider: cli.analysis_provider,
            analysis_endpoint: cli.analysis_endpoint.clone(),
        },
    )?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let mut out = std::io::stdout().lock();
    runtime.block_on(run_command(&session, &cli.command, &mut out))
}
