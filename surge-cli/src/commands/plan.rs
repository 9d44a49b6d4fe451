//! `surge plan`: show what a run would do

use anyhow::{Context, Result};
use colored::*;
use surge_config::SurgeConfig;
use surge_scheduler::RateSchedule;
use surge_workflow::WorkflowPlan;

pub fn handle_plan(config: &SurgeConfig, plan: &WorkflowPlan) -> Result<()> {
    let schedule =
        RateSchedule::from_load_config(&config.load).context("Invalid load profile")?;
    print!("{}", render_plan(config, &schedule, plan));
    Ok(())
}

fn render_plan(config: &SurgeConfig, schedule: &RateSchedule, plan: &WorkflowPlan) -> String {
    let mut out = String::new();
    let load = &config.load;

    out.push_str(&format!("{}\n", "Schedule".bright_cyan().bold()));
    out.push_str(&format!(
        "  start ............. {:.2} it/s ({} req/s)\n",
        schedule.start_rate(),
        load.start_request_rate
    ));
    for (index, (stage, configured)) in schedule.stages().iter().zip(&load.stages).enumerate() {
        out.push_str(&format!(
            "  stage {} ........... {:.2} it/s ({} req/s) over {}s\n",
            index + 1,
            stage.target,
            configured.target_request_rate,
            stage.duration.as_secs_f64()
        ));
    }
    out.push_str(&format!(
        "  total ............. {:.0} iterations in {}s\n",
        schedule.expected_iterations(),
        schedule.total_duration().as_secs_f64()
    ));
    out.push_str(&format!(
        "  workers ........... {} pre-allocated, {} max\n\n",
        load.pre_allocated_workers, load.max_workers
    ));

    out.push_str(&format!(
        "{} {}\n",
        "Workflow".bright_cyan().bold(),
        plan.spec().name
    ));
    for (index, stage) in plan.stages().enumerate() {
        let names: Vec<&str> = stage.iter().map(|node| node.name.as_str()).collect();
        out.push_str(&format!("  {:>2}. {}\n", index + 1, names.join(", ")));
    }
    let cleanup: Vec<&str> = plan
        .topological_order()
        .rev()
        .map(|node| node.name.as_str())
        .collect();
    out.push_str(&format!("  cleanup: {}\n\n", cleanup.join(" → ")));

    let estimate = plan.estimate_requests();
    out.push_str(&format!("{}\n", "Requests per iteration".bright_cyan().bold()));
    out.push_str(&format!(
        "  {} creates, {} lookups, {} updates, {} queries, {} deletes = {}\n",
        estimate.creates,
        estimate.lookups,
        estimate.updates,
        estimate.queries,
        estimate.deletes,
        estimate.total()
    ));
    if (estimate.total() as f64 - load.requests_per_iteration).abs() >= 1.0 {
        out.push_str(&format!(
            "  {} configured requests_per_iteration is {}\n",
            "!".bright_yellow().bold(),
            load.requests_per_iteration
        ));
    }
    out
}
