//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`] or [`validate`]. Each handler lives in
//! its own submodule.

pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::PortmuxError;

pub async fn dispatch(cli: Cli) -> Result<(), PortmuxError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  portmux v{version} \u{2014} multi-port HTTP reverse proxy\n\n  \
         No command provided. To get started:\n\n    \
         portmux run                      Start every port listed in ./config.json\n    \
         portmux run -c routes.json       Start with a specific config file\n    \
         portmux validate routes.json     Check a config file\n    \
         portmux --help                   See all commands and options\n"
    );
}
