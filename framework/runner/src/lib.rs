mod cli;
mod config;
mod init;
mod monitor;
mod pool;
mod process;
mod progress;
mod protocol;
mod run;
mod setup;
mod types;
mod worker_binary;

pub mod prelude {
    pub use crate::cli::StampedeCli;
    pub use crate::config::{RunConfig, RunConfigBuilder};
    pub use crate::init::init;
    pub use crate::pool::{
        CompletedRun, PoolOutcome, PoolSettings, PoolState, RunEvent, RunLauncher, RunSpec,
        RunState, WorkerPool,
    };
    pub use crate::process::{
        ProcessRunner, WorkerCommand, ENV_FLOW, ENV_RANDOM, ENV_RUN_INDEX, ENV_TOTAL_RUNS,
    };
    pub use crate::progress::{ProgressSnapshot, RunProgress};
    pub use crate::protocol::{ProtocolEvent, StreamProtocolParser};
    pub use crate::run::run;
    pub use crate::setup::{run_setup, SetupFailedError};
    pub use crate::types::StampedeResult;
    pub use crate::worker_binary::{worker_path, STAMPEDE_WORKER_PATH_ENV};
}
