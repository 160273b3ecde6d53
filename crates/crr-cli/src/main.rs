use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

mod cli;
mod commands;
mod config;
mod env;
mod runner;

use cli::{Cli, Commands};

/// `EINVAL`: every bootstrap failure is reported as an invalid argument.
const EXIT_INVALID_ARGUMENT: u8 = 22;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_INVALID_ARGUMENT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Also matches the crr_* library targets.
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "crr=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("Error: {:#}", e).red());
            if runner::is_configuration_error(&e) {
                eprintln!(
                    "{}",
                    "Fix the replication config and try again (see `crr check`).".yellow()
                );
            }
            ExitCode::from(EXIT_INVALID_ARGUMENT)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { force } => commands::cmd_init(&cli.config, force),
        Commands::Check { overrides } => {
            env::load_dotenv_from_ancestors(cli.env.as_deref())?;
            let config = config::load_config(&cli.config, &overrides)?;
            commands::cmd_check(config).await
        }
        Commands::Run { overrides } => {
            env::load_dotenv_from_ancestors(cli.env.as_deref())?;
            let config = config::load_config(&cli.config, &overrides)?;
            commands::cmd_run(config).await
        }
    }
}
