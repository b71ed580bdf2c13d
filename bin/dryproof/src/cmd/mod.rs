//! Built-in `dryproof` commands.
use clap::Parser;
use clap::Subcommand;

use crate::logging::LogOpt;

pub mod kinds;
pub mod run;

/// Verify API servers never persist changes requested as dry-runs.
#[derive(Debug, Parser)]
#[command(version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration listing the API server and scenarios to verify.
    #[arg(short = 'c', long = "config", global = true)]
    #[arg(default_value_t = String::from("dryproof.yaml"))]
    pub config: String,

    /// Select the dryproof command to run.
    #[command(subcommand)]
    pub command: Command,

    /// Configure how `dryproof` logs are emitted.
    #[command(flatten)]
    pub log: LogOpt,
}

/// Select the dryproof command to run.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the configured scenarios and the verbs they verify.
    Kinds,

    /// Run the configured scenarios against the API server.
    #[command(alias = "verify")]
    Run(run::RunCli),
}
