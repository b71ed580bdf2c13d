//! Verify API servers honour dry-run requests from a Command Line Interface.
use anyhow::Context as _;
use anyhow::Result;
use clap::Parser;

mod cmd;
mod conf;
mod logging;
mod utils;

pub use self::cmd::Cli;
pub use self::conf::Conf;
pub use self::conf::Error as ConfError;

use dryproof_context::Context;

/// Failed to initialise the async runtime for the process.
#[derive(Debug, thiserror::Error)]
#[error("failed to initialise the async runtime")]
pub struct RuntimeInit;

/// Invoke the selected command implementation.
pub async fn execute(cli: Cli, conf: Conf, context: Context) -> Result<i32> {
    match &cli.command {
        cmd::Command::Kinds => cmd::kinds::run(&conf),
        cmd::Command::Run(args) => cmd::run::run(&context, &conf, args).await,
    }
}

/// Initialise the dryproof process and invoke [`execute`].
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    let conf = conf::load(&utils::resolve_home(&cli.config)?)?;
    let logger = logging::configure(&cli.log)?;
    let context = Context::root(logger).build();
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context(RuntimeInit)?
        .block_on(execute(cli, conf, context))
}
