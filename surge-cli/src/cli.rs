//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authenticate, run the load profile and evaluate thresholds
    Run {
        /// Workflow definition; the built-in cadastre workflow when omitted
        #[arg(long, value_name = "PATH")]
        workflow: Option<PathBuf>,

        /// Override the target base URL
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,

        /// Write the end-of-run summary as JSON
        #[arg(long, value_name = "PATH")]
        summary_export: Option<PathBuf>,
    },

    /// Show the iteration schedule and workflow stages without sending requests
    Plan {
        /// Workflow definition; the built-in cadastre workflow when omitted
        #[arg(long, value_name = "PATH")]
        workflow: Option<PathBuf>,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Configuration file to validate
        #[arg(value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Write a sample configuration file with every default spelled out
    Generate {
        /// Output file; printed to stdout when omitted
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "surge",
            "--config",
            "surge.yaml",
            "run",
            "--summary-export",
            "out.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("surge.yaml")));
        match cli.command {
            Some(Commands::Run {
                workflow,
                summary_export,
                base_url,
            }) => {
                assert!(workflow.is_none());
                assert!(base_url.is_none());
                assert_eq!(summary_export, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_config_commands() {
        let cli = Cli::try_parse_from(["surge", "config", "validate", "surge.yaml"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                config_cmd: ConfigCommands::Validate { .. }
            })
        ));

        let cli = Cli::try_parse_from(["surge", "plan", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Some(Commands::Plan { workflow: None })));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["surge", "serve"]).is_err());
    }
}
