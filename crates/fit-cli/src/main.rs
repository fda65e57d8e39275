use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod check;
mod cli;
mod error;
mod project;
mod validate;

use cli::{Cli, Command};

/// Logs go to stderr so stdout carries only the summary.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("FITGATE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let code = match cli.command {
        Command::Validate(args) => validate::run(&args).unwrap_or_else(|e| {
            error!(error = %e, "validation aborted");
            eprintln!("fitgate: {e}");
            e.exit_code()
        }),
        Command::CheckReport(args) => check::run(&args),
    };
    ExitCode::from(code)
}
