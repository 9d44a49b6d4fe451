use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::process::ExitCode;
use std::str::FromStr;
use surge_config::LogLevel;
use tracing::{error, info};

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};
use commands::{load_config, load_plan};

/// Exit code when the run completed but a threshold was crossed
const THRESHOLDS_FAILED: u8 = 99;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", "✗".bright_red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    // Config subcommands manage files and never need the full configuration
    if let Some(Commands::Config { config_cmd }) = &cli.command {
        surge_logging::init_simple_tracing(cli.log_level.as_deref().unwrap_or("warn"))?;
        match config_cmd {
            ConfigCommands::Validate { config_file } => {
                commands::config::handle_config_validate(config_file)?
            }
            ConfigCommands::Generate { output, force } => {
                commands::config::handle_config_generate(output.as_ref(), *force)?
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = LogLevel::from_str(level).map_err(anyhow::Error::msg)?;
    }
    surge_logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    match cli.command {
        Some(Commands::Run {
            workflow,
            base_url,
            summary_export,
        }) => {
            if let Some(base_url) = base_url {
                config.target.base_url = base_url;
            }
            let plan = load_plan(workflow.as_deref().or(config.workflow.as_deref()))?;
            info!(
                "Running workflow '{}' against {}",
                plan.spec().name,
                config.target.base_url
            );

            if commands::run::handle_run(&config, plan, summary_export.as_ref()).await? {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(THRESHOLDS_FAILED))
            }
        }
        Some(Commands::Plan { workflow }) => {
            let plan = load_plan(workflow.as_deref().or(config.workflow.as_deref()))?;
            commands::plan::handle_plan(&config, &plan)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Config { .. }) => Ok(ExitCode::SUCCESS),
        None => {
            // If no subcommand is provided, print help
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            cmd.print_help().context("Failed to print help")?;
            println!();
            Ok(ExitCode::SUCCESS)
        }
    }
}
