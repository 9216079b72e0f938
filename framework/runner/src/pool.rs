use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use stampede_core::prelude::{ConcurrencyProfile, FinishHandle, FlowSelector, SeededRng};
use stampede_instruments::{Reporter, StatsAggregator};
use stampede_summary_model::{RunOutput, RunRecord};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::{Instant, MissedTickBehavior};

use crate::progress::{ProgressSnapshot, RunProgress};
use crate::protocol::ProtocolEvent;

/// Everything a launcher needs to start one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSpec {
    /// 1-based and unique, assigned in launch order
    pub run_index: usize,
    pub flow: usize,
    /// A draw in `[0, 1)` from the shared generator
    pub random: f64,
    pub total_runs: usize,
}

/// Messages from a running run back to the pool.
///
/// Each run sends any number of [RunEvent::Step]s, then exactly one [RunEvent::Exited] followed by
/// exactly one [RunEvent::Completed].
#[derive(Debug)]
pub enum RunEvent {
    Step {
        run_index: usize,
        event: ProtocolEvent,
    },
    Exited {
        run_index: usize,
        exit_code: Option<i32>,
    },
    Completed(CompletedRun),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub run_index: usize,
    pub duration: Duration,
    /// `None` if the process was killed by a signal or could not be started
    pub exit_code: Option<i32>,
    pub output: RunOutput,
    pub stderr: String,
}

/// Starts runs for the [WorkerPool].
///
/// Launching must not block. The launcher reports back through `events` as the run progresses and
/// must always finish with [RunEvent::Completed], or the pool will wait for that run forever.
pub trait RunLauncher {
    fn launch(&mut self, spec: RunSpec, events: UnboundedSender<RunEvent>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Idle,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Spawned,
    Streaming,
    Exited,
    Parsed,
}

/// A run that has been launched and not yet recorded.
#[derive(Debug)]
struct RunTask {
    flow: usize,
    state: RunState,
    steps_started: usize,
    steps_finished: usize,
}

impl RunTask {
    fn new(flow: usize) -> Self {
        Self {
            flow,
            state: RunState::Spawned,
            steps_started: 0,
            steps_finished: 0,
        }
    }

    fn transition(&mut self, run_index: usize, to: RunState) {
        if self.state != to {
            log::trace!("Run {run_index}: {:?} -> {:?}", self.state, to);
            self.state = to;
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub total_runs: usize,
    pub profile: ConcurrencyProfile,
    pub flows: FlowSelector,
    pub tick_interval: Duration,
}

/// What the pool hands back once every run has been recorded.
#[derive(Debug)]
pub struct PoolOutcome {
    pub elapsed: Duration,
    pub aggregator: StatsAggregator,
    pub runs_started: usize,
    /// The most runs that were active at once
    pub peak_active: usize,
    /// Number of times a report collector failed
    pub report_errors: usize,
    pub steps_started: usize,
    pub steps_finished: usize,
}

/// Schedules runs against a [ConcurrencyProfile] until every run has finished.
///
/// On every tick the profile decides how many runs may be active, and new runs are launched until
/// that many are active or every run has been started. Runs already launched are always waited
/// for, the pool never cuts a run short.
pub struct WorkerPool<L: RunLauncher> {
    settings: PoolSettings,
    rng: SeededRng,
    launcher: L,
    aggregator: StatsAggregator,
    reporter: Arc<Reporter>,
    progress: RunProgress,
    finish_handle: FinishHandle,
    state: PoolState,
    active: BTreeMap<usize, RunTask>,
    runs_started: usize,
    runs_finished: usize,
    peak_active: usize,
    report_errors: usize,
    steps_started: usize,
    steps_finished: usize,
}

impl<L: RunLauncher> WorkerPool<L> {
    pub fn new(
        settings: PoolSettings,
        rng: SeededRng,
        launcher: L,
        aggregator: StatsAggregator,
        reporter: Arc<Reporter>,
    ) -> Self {
        Self {
            settings,
            rng,
            launcher,
            aggregator,
            reporter,
            progress: RunProgress::hidden(),
            finish_handle: FinishHandle::new(),
            state: PoolState::Idle,
            active: BTreeMap::new(),
            runs_started: 0,
            runs_finished: 0,
            peak_active: 0,
            report_errors: 0,
            steps_started: 0,
            steps_finished: 0,
        }
    }

    pub fn with_progress(mut self, progress: RunProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Use an existing handle for the end signal so listeners can be created before the pool.
    pub fn with_finish_handle(mut self, finish_handle: FinishHandle) -> Self {
        self.finish_handle = finish_handle;
        self
    }

    pub fn finish_handle(&self) -> &FinishHandle {
        &self.finish_handle
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    /// Run until every run has been launched and recorded.
    pub async fn run(mut self) -> PoolOutcome {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let mut ticker = tokio::time::interval(self.settings.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let start = Instant::now();
        self.state = PoolState::Running;
        log::info!(
            "Starting {} runs, up to {} at a time, reaching the final target after {}s",
            self.settings.total_runs,
            self.settings.profile.peak(),
            self.settings.profile.settle_time_s()
        );

        while self.runs_finished < self.settings.total_runs {
            tokio::select! {
                _ = ticker.tick() => {
                    self.launch_due(start.elapsed(), &events_tx);
                }
                Some(event) = events_rx.recv() => {
                    self.handle_event(event);
                }
            }
        }

        let elapsed = start.elapsed();
        self.state = PoolState::Finished;
        self.aggregator.set_elapsed(elapsed);
        self.progress.finish();
        self.finish_handle.finish(elapsed);

        log::info!(
            "All {} runs finished in {:.2}s ({} succeeded, {} failed)",
            self.runs_finished,
            elapsed.as_secs_f64(),
            self.aggregator.success().count(),
            self.aggregator.error().count()
        );

        PoolOutcome {
            elapsed,
            aggregator: self.aggregator,
            runs_started: self.runs_started,
            peak_active: self.peak_active,
            report_errors: self.report_errors,
            steps_started: self.steps_started,
            steps_finished: self.steps_finished,
        }
    }

    fn launch_due(&mut self, elapsed: Duration, events: &UnboundedSender<RunEvent>) {
        let slots = self.settings.profile.slots(elapsed.as_secs_f64());

        while self.active.len() < slots && self.runs_started < self.settings.total_runs {
            self.runs_started += 1;
            let run_index = self.runs_started;
            let flow = self.settings.flows.flow_for(run_index);
            let random = self.rng.next_unit();

            self.active.insert(run_index, RunTask::new(flow));
            self.peak_active = self.peak_active.max(self.active.len());

            log::debug!("Launching run {run_index} with flow {flow}");
            self.launcher.launch(
                RunSpec {
                    run_index,
                    flow,
                    random,
                    total_runs: self.settings.total_runs,
                },
                events.clone(),
            );
        }

        self.update_progress();
    }

    fn handle_event(&mut self, event: RunEvent) {
        match event {
            RunEvent::Step { run_index, event } => {
                let Some(task) = self.active.get_mut(&run_index) else {
                    log::warn!("Step reported for unknown run {run_index}");
                    return;
                };
                task.transition(run_index, RunState::Streaming);
                match event {
                    ProtocolEvent::StepStarted => {
                        task.steps_started += 1;
                        self.steps_started += 1;
                    }
                    ProtocolEvent::StepFinished => {
                        task.steps_finished += 1;
                        self.steps_finished += 1;
                    }
                }
                self.update_progress();
            }
            RunEvent::Exited {
                run_index,
                exit_code,
            } => {
                if let Some(task) = self.active.get_mut(&run_index) {
                    log::trace!("Run {run_index} exited with {exit_code:?}");
                    task.transition(run_index, RunState::Exited);
                }
            }
            RunEvent::Completed(completed) => self.retire(completed),
        }
    }

    fn retire(&mut self, completed: CompletedRun) {
        let run_index = completed.run_index;
        let Some(mut task) = self.active.remove(&run_index) else {
            log::warn!("Completion reported for unknown run {run_index}");
            return;
        };
        task.transition(run_index, RunState::Parsed);

        let success = completed.exit_code == Some(0) && completed.output.is_parsed();
        let record = RunRecord {
            run_index,
            flow: task.flow,
            success,
            duration_ms: completed.duration.as_secs_f64() * 1000.0,
            exit_code: completed.exit_code,
            output: completed.output,
            stderr: completed.stderr,
        };

        if success {
            log::debug!(
                "Run {run_index} succeeded in {:.2}ms after {} steps",
                record.duration_ms,
                task.steps_finished
            );
        } else {
            log::warn!(
                "Run {run_index} failed with exit code {:?} after {}/{} steps",
                record.exit_code,
                task.steps_finished,
                task.steps_started
            );
            if let RunOutput::Invalid { error, .. } = &record.output {
                log::warn!("Run {run_index} output could not be parsed: {error}");
            }
            if !record.stderr.is_empty() {
                log::warn!("Run {run_index} stderr: {}", record.stderr.trim_end());
            }
        }
        if let RunOutput::Parsed(result) = &record.output {
            if let Some(log) = &result.log {
                log::debug!("Run {run_index} log: {log}");
            }
        }

        self.aggregator.record_run(&record);
        if let Err(e) = self.reporter.add_run(&record) {
            self.report_errors += 1;
            log::warn!("Failed to report run {run_index}: {e:?}");
        }

        self.runs_finished += 1;
        self.update_progress();
    }

    fn update_progress(&self) {
        self.progress.update(ProgressSnapshot {
            finished: self.runs_finished,
            active: self.active.len(),
            succeeded: self.aggregator.success().count(),
            failed: self.aggregator.error().count(),
            steps_started: self.steps_started,
            steps_finished: self.steps_finished,
        });
    }
}
