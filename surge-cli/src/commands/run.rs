//! `surge run`: bootstrap a session, drive the schedule, report

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use surge_config::SurgeConfig;
use surge_http::{ReqwestTransport, SessionBootstrap, StepExecutor, TransportConfig};
use surge_metrics::MetricsRegistry;
use surge_report::{evaluate_all, parse_thresholds, RunReport};
use surge_scheduler::{Dispatcher, DispatcherConfig, RateSchedule};
use surge_workflow::{WorkflowPlan, WorkflowRunner};
use tracing::{info, warn};

/// Execute a full run and return whether every threshold passed
pub async fn handle_run(
    config: &SurgeConfig,
    plan: WorkflowPlan,
    summary_export: Option<&PathBuf>,
) -> Result<bool> {
    // Fail on configuration problems before any request is sent
    let thresholds = parse_thresholds(config.thresholds.pairs()).context("Invalid threshold")?;
    let schedule =
        RateSchedule::from_load_config(&config.load).context("Invalid load profile")?;

    let transport_config = TransportConfig::from(config.http.clone());
    let metrics = Arc::new(MetricsRegistry::new());

    let credential = {
        let transport = ReqwestTransport::new(&transport_config)
            .context("Failed to build HTTP client")?;
        let executor = StepExecutor::new(Arc::new(transport), metrics.clone());
        SessionBootstrap::new(
            executor,
            &config.target.base_url,
            config.target.auth_path.clone(),
            config.target.session_cookie.clone(),
        )?
        .authenticate(&config.target.password)
        .await
        .context("Session bootstrap failed")?
    };
    info!("Session established ({})", credential.cookie_name);

    let transport = ReqwestTransport::with_session(&transport_config, &credential)
        .context("Failed to build session HTTP client")?;
    let executor = StepExecutor::new(Arc::new(transport), metrics.clone());
    let runner = Arc::new(
        WorkflowRunner::new(Arc::new(plan), executor, &config.target.base_url)
            .context("Failed to prepare workflow")?,
    );

    let dispatcher = Dispatcher::new(
        schedule,
        DispatcherConfig::from(&config.load),
        metrics.clone(),
    );
    let shutdown = dispatcher.shutdown_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, no new iterations will start");
            shutdown.trigger();
        }
    });

    let summary = dispatcher.run(runner).await;
    interrupt.abort();
    let summary = summary.context("Scheduler failed")?;

    let snapshot = metrics.snapshot();
    let results = evaluate_all(&thresholds, &snapshot).context("Failed to evaluate thresholds")?;
    let report = RunReport::new(summary, snapshot, results);

    println!("{}", report.render());
    if let Some(path) = summary_export {
        report
            .export(path)
            .with_context(|| format!("Failed to export summary to {:?}", path))?;
    }

    for failed in report.failed_thresholds() {
        warn!("Threshold crossed: {} {}", failed.metric, failed.expression);
    }
    Ok(report.passed())
}
