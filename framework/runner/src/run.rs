use std::sync::Arc;

use anyhow::Context;
use stampede_core::prelude::{FinishHandle, FlowSelector, SeededRng};
use stampede_instruments::StatsAggregator;
use stampede_summary_model::Summary;

use crate::config::RunConfig;
use crate::monitor::start_monitor;
use crate::pool::{PoolSettings, WorkerPool};
use crate::process::ProcessRunner;
use crate::progress::RunProgress;
use crate::setup::run_setup;
use crate::types::StampedeResult;

/// Run the worker `config.total_runs` times and return the summary of all the runs.
///
/// Runs that fail are part of the summary, only problems that stop the invocation as a whole are
/// returned as errors.
pub fn run(config: RunConfig) -> StampedeResult<Summary> {
    log::info!(
        "Running {} with {} runs and seed {}",
        config.worker.to_vec().join(" "),
        config.total_runs,
        config.seed
    );

    if let Some(setup) = &config.setup {
        run_setup(setup)?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    let mut rng = SeededRng::new(config.seed)?;
    // Weighted flows draw from the generator before any run is launched.
    let flows = FlowSelector::new(&config.flow_mode, config.total_runs, &mut rng)?;

    let reporter = Arc::new(config.report_config().init());
    let aggregator = StatsAggregator::new(
        nanoid::nanoid!(),
        chrono::Utc::now().timestamp(),
        config.parameters(),
    );

    let finish_handle = FinishHandle::new();
    if let Err(e) = start_monitor(finish_handle.new_listener()) {
        log::warn!("Resource monitor not started: {e:?}");
    }

    let progress = if config.no_progress {
        RunProgress::hidden()
    } else {
        RunProgress::new(config.total_runs)?
    };

    let pool = WorkerPool::new(
        PoolSettings {
            total_runs: config.total_runs,
            profile: config.profile.clone(),
            flows,
            tick_interval: config.tick_interval,
        },
        rng,
        ProcessRunner::new(config.worker.clone()),
        aggregator,
        reporter.clone(),
    )
    .with_progress(progress)
    .with_finish_handle(finish_handle);

    let outcome = runtime.block_on(pool.run());
    log::debug!(
        "Started {} runs with at most {} active, {} steps started and {} finished",
        outcome.runs_started,
        outcome.peak_active,
        outcome.steps_started,
        outcome.steps_finished
    );
    if outcome.report_errors > 0 {
        log::warn!("Reporting failed for {} runs", outcome.report_errors);
    }

    let summary = outcome.aggregator.finalize();
    if let Err(e) = reporter.finalize(&summary) {
        log::warn!("Failed to report the summary: {e:?}");
    }

    Ok(summary)
}
