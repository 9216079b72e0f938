use std::path::PathBuf;
use std::time::Duration;

use stampede_core::prelude::{ConcurrencyProfile, ConfigError, ControlPoint, FlowMode, SeededRng};
use stampede_instruments::ReportConfig;
use stampede_summary_model::RunParameters;

use crate::cli::StampedeCli;
use crate::process::WorkerCommand;
use crate::types::StampedeResult;
use crate::worker_binary::worker_path;

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// The builder for a [RunConfig].
///
/// Start from the worker command, either directly with [RunConfigBuilder::new] or from the command
/// line with [RunConfigBuilder::from_cli], then call [RunConfigBuilder::build] to validate it.
#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    worker: WorkerCommand,
    runs: usize,
    concurrency: usize,
    ramp_up_s: f64,
    /// Custom profile points. When set, these replace `concurrency` and `ramp_up_s`.
    stages: Vec<(f64, f64)>,
    flow_weights: Option<Vec<f64>>,
    flow_pattern: Option<Vec<usize>>,
    seed: Option<i64>,
    tick_interval: Duration,
    setup: Option<String>,
    run_log: Option<PathBuf>,
    summary_file: Option<PathBuf>,
    no_progress: bool,
}

/// A validated run configuration, ready to be passed to [crate::prelude::run].
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub total_runs: usize,
    pub profile: ConcurrencyProfile,
    pub flow_mode: FlowMode,
    pub seed: i64,
    pub worker: WorkerCommand,
    pub tick_interval: Duration,
    pub setup: Option<String>,
    pub run_log: Option<PathBuf>,
    pub summary_file: Option<PathBuf>,
    pub no_progress: bool,
}

impl RunConfigBuilder {
    pub fn new(worker: WorkerCommand) -> Self {
        Self {
            worker,
            runs: 1,
            concurrency: 1,
            ramp_up_s: 0.0,
            stages: Vec::new(),
            flow_weights: None,
            flow_pattern: None,
            seed: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            setup: None,
            run_log: None,
            summary_file: None,
            no_progress: false,
        }
    }

    /// Start from parsed command line arguments, resolving the worker program on the way.
    pub fn from_cli(cli: StampedeCli) -> StampedeResult<Self> {
        let mut worker = cli.worker.into_iter();
        let program = worker.next().unwrap_or_default();
        let command = WorkerCommand::new(worker_path(&program)?).with_args(worker);

        let mut builder = Self::new(command)
            .with_runs(cli.runs)
            .with_concurrency(cli.concurrency)
            .with_ramp_up(cli.ramp_up)
            .with_stages(cli.stage)
            .with_tick_interval(Duration::from_millis(cli.tick_ms))
            .with_no_progress(cli.no_progress);

        builder.flow_weights = cli.flow_weights;
        builder.flow_pattern = cli.flow_pattern;
        builder.seed = cli.seed;
        builder.setup = cli.setup;
        builder.run_log = cli.run_log;
        builder.summary_file = cli.summary;

        Ok(builder)
    }

    pub fn with_runs(mut self, runs: usize) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Seconds taken to go from zero to the full concurrency.
    pub fn with_ramp_up(mut self, ramp_up_s: f64) -> Self {
        self.ramp_up_s = ramp_up_s;
        self
    }

    /// Use custom `(seconds, target)` control points for the concurrency profile.
    pub fn with_stages(mut self, stages: Vec<(f64, f64)>) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_flow_weights(mut self, weights: Vec<f64>) -> Self {
        self.flow_weights = Some(weights);
        self
    }

    pub fn with_flow_pattern(mut self, pattern: Vec<usize>) -> Self {
        self.flow_pattern = Some(pattern);
        self
    }

    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval.max(MIN_TICK_INTERVAL);
        self
    }

    pub fn with_setup(mut self, command: impl Into<String>) -> Self {
        self.setup = Some(command.into());
        self
    }

    pub fn with_run_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_log = Some(path.into());
        self
    }

    pub fn with_summary_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_file = Some(path.into());
        self
    }

    pub fn with_no_progress(mut self, no_progress: bool) -> Self {
        self.no_progress = no_progress;
        self
    }

    /// Validate everything and settle the seed.
    pub fn build(self) -> Result<RunConfig, ConfigError> {
        if self.runs == 0 {
            return Err(ConfigError::ZeroRuns);
        }

        let profile = if self.stages.is_empty() {
            ConcurrencyProfile::ramp(self.ramp_up_s, self.concurrency)?
        } else {
            if self.ramp_up_s > 0.0 {
                log::warn!("Ramp-up of {}s is ignored because stages were given", self.ramp_up_s);
            }
            ConcurrencyProfile::new(
                self.stages
                    .iter()
                    .map(|(time_s, target)| ControlPoint::new(*time_s, *target))
                    .collect(),
            )?
        };

        let flow_mode = FlowMode::from_options(self.flow_weights, self.flow_pattern)?;
        flow_mode.validate()?;

        let seed = match self.seed {
            Some(seed) => SeededRng::new(seed)?.seed() as i64,
            None => {
                let seed = SeededRng::random_seed();
                log::info!("No seed given, using random seed {seed}. Pass --seed={seed} to repeat this run");
                seed
            }
        };

        Ok(RunConfig {
            total_runs: self.runs,
            profile,
            flow_mode,
            seed,
            worker: self.worker,
            tick_interval: self.tick_interval,
            setup: self.setup,
            run_log: self.run_log,
            summary_file: self.summary_file,
            no_progress: self.no_progress,
        })
    }
}

impl RunConfig {
    /// The parameters to record in the summary.
    pub fn parameters(&self) -> RunParameters {
        let (flow_weights, flow_pattern) = match &self.flow_mode {
            FlowMode::Default => (None, None),
            FlowMode::Weighted(weights) => (Some(weights.clone()), None),
            FlowMode::Pattern(pattern) => (None, Some(pattern.clone())),
        };

        RunParameters {
            total_runs: self.total_runs,
            concurrency: self.profile.peak().floor() as usize,
            profile: self
                .profile
                .points()
                .iter()
                .map(|p| (p.time_s, p.target))
                .collect(),
            flow_weights,
            flow_pattern,
            seed: self.seed as u64,
            worker: self.worker.to_vec(),
        }
    }

    /// The reporting for this run: the summary table, plus any files that were asked for.
    pub fn report_config(&self) -> ReportConfig {
        let mut config = ReportConfig::default().enable_summary();
        if let Some(path) = &self.run_log {
            config = config.enable_run_log(path.clone());
        }
        if let Some(path) = &self.summary_file {
            config = config.enable_summary_file(path.clone());
        }
        config
    }
}
