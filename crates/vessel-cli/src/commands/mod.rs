//! CLI command definitions and dispatch.

pub mod map;
pub mod run;

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

/// vessel: single-container launcher.
#[derive(Parser, Debug)]
#[command(name = "vessel", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Log output format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Formats accepted by `--log-format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch a container and wait for it to exit.
    Run(run::RunArgs),
    /// Write the uid/gid maps of a waiting container process.
    Map(map::MapArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Run(args) => run::execute(&args),
        Command::Map(args) => map::execute(&args),
    }
}
