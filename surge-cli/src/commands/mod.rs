//! Subcommand implementations

pub mod config;
pub mod plan;
pub mod run;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use surge_config::{ConfigLoader, SurgeConfig};
use surge_workflow::{WorkflowPlan, WorkflowSpec};
use tracing::{debug, info, warn};

/// Load configuration from file or use defaults
pub fn load_config(config_path: Option<&PathBuf>) -> Result<SurgeConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                info!("Loading configuration from: {:?}", path);
                loader
                    .from_file(path)
                    .with_context(|| format!("Failed to load configuration from {:?}", path))
            } else {
                warn!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

/// Load and validate the workflow: explicit path, then config, then built-in
pub fn load_plan(workflow: Option<&Path>) -> Result<WorkflowPlan> {
    let spec = match workflow {
        Some(path) => {
            info!("Loading workflow from: {:?}", path);
            WorkflowSpec::from_file(path)
                .with_context(|| format!("Failed to load workflow from {:?}", path))?
        }
        None => WorkflowSpec::builtin().context("Failed to load the built-in workflow")?,
    };

    let name = spec.name.clone();
    WorkflowPlan::new(spec).with_context(|| format!("Workflow '{}' is invalid", name))
}
