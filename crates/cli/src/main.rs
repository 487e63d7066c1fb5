// coreport CLI entry point.

use std::process::ExitCode as ProcessExitCode;

use clap::Parser;

mod commands;
mod exit_code;
mod output;

#[derive(Parser)]
#[command(name = "coreport", about = "Collaborative report editing toolkit")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> ProcessExitCode {
    // Logs go to stderr so command output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match commands::run(cli.command) {
        Ok(()) => exit_code::ExitCode::Success.into(),
        Err(error) => exit_code::ExitCode::from_error(&error).into(),
    }
}
