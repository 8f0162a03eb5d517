//! CLI command implementations

mod generate;
mod info;
mod render;
mod train;
mod validate;

#[cfg(test)]
mod tests;

use crate::cli::LogLevel;
use crate::config::{Cli, Command};

/// Execute a CLI command based on the parsed arguments
pub fn run_command(cli: Cli) -> Result<(), String> {
    let log_level = LogLevel::from_flags(cli.verbose, cli.quiet);

    match cli.command {
        Command::Render(args) => render::run_render(args, log_level),
        Command::Train(args) => train::run_train(args, log_level),
        Command::Generate(args) => generate::run_generate(args, log_level),
        Command::Validate(args) => validate::run_validate(args, log_level),
        Command::Info(args) => info::run_info(args, log_level),
    }
}
