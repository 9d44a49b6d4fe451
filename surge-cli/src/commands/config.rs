//! `surge config` subcommands

use super::{load_config, load_plan};
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::PathBuf;
use surge_config::SurgeConfig;
use surge_report::parse_thresholds;
use tracing::{error, info};

/// Handle configuration validation
pub fn handle_config_validate(config_file: &PathBuf) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    let checked = load_config(Some(config_file)).and_then(|config| {
        parse_thresholds(config.thresholds.pairs()).context("Invalid threshold")?;
        if let Some(workflow) = &config.workflow {
            load_plan(Some(workflow))?;
        }
        Ok(())
    });

    match checked {
        Ok(()) => {
            println!("{} Configuration file is valid", "✓".bright_green().bold());
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!(
                "{} Configuration validation failed: {:#}",
                "✗".bright_red().bold(),
                e
            );
            error!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

/// Handle configuration generation
pub fn handle_config_generate(output: Option<&PathBuf>, force: bool) -> Result<()> {
    let content = SurgeConfig::generate_sample();

    let Some(output) = output else {
        print!("{}", content);
        return Ok(());
    };

    info!("Generating configuration at: {:?}", output);
    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, content)
        .with_context(|| format!("Failed to write configuration to {:?}", output))?;

    println!(
        "{} Configuration written to {}",
        "✓".bright_green().bold(),
        output.display()
    );
    Ok(())
}
