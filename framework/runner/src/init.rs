use crate::cli::StampedeCli;
use clap::Parser;

/// Initialise the CLI and logging for the stampede runner.
pub fn init() -> StampedeCli {
    env_logger::init();

    StampedeCli::parse()
}
