use std::path::PathBuf;

use clap::Parser;

/// Run a worker program many times under a ramping concurrency target and summarise the results.
#[derive(Parser, Debug, Clone)]
#[command(about, version, long_about = None)]
pub struct StampedeCli {
    /// The total number of runs
    #[clap(short = 'n', long, default_value = "1")]
    pub runs: usize,

    /// The number of runs allowed to be active at once, once ramp-up is complete
    #[clap(short, long, default_value = "1")]
    pub concurrency: usize,

    /// The number of seconds taken to ramp up from zero to the full concurrency
    #[clap(long, default_value = "0")]
    pub ramp_up: f64,

    /// Use a custom concurrency profile instead of a linear ramp-up. Specify a point on the
    /// profile as `seconds:target`, for example `--stage=10:5`.
    ///
    /// Repeat the flag to add more points, in ascending order of time. The target is interpolated
    /// between points and the last target is held until every run has started.
    #[clap(long, value_parser = parse_stage)]
    pub stage: Vec<(f64, f64)>,

    /// Choose a flow for every run at random, with the given relative weights. For example
    /// `--flow-weights=3,1` runs flow 0 three times as often as flow 1.
    #[clap(long, value_delimiter = ',', conflicts_with = "flow_pattern")]
    pub flow_weights: Option<Vec<f64>>,

    /// Assign flows to runs by cycling through this sequence. For example `--flow-pattern=0,0,1`.
    #[clap(long, value_delimiter = ',')]
    pub flow_pattern: Option<Vec<usize>>,

    /// Seed for the random generator, so that a run can be repeated. A random seed is picked and
    /// logged if this isn't set.
    #[clap(long, allow_negative_numbers = true)]
    pub seed: Option<i64>,

    /// How often, in milliseconds, to check whether more runs can be started
    #[clap(long, default_value = "100")]
    pub tick_ms: u64,

    /// A shell command to run to completion before any runs are started
    #[clap(long)]
    pub setup: Option<String>,

    /// Append a JSON line for every completed run to this file
    #[clap(long)]
    pub run_log: Option<PathBuf>,

    /// Write the final summary as JSON to this file
    #[clap(long)]
    pub summary: Option<PathBuf>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// The worker program, followed by its arguments
    #[clap(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub worker: Vec<String>,
}

fn parse_stage(s: &str) -> anyhow::Result<(f64, f64)> {
    let (time, target) = s
        .split_once(':')
        .ok_or(anyhow::anyhow!("Expected a stage as `seconds:target`, got `{s}`"))?;

    let time = time
        .trim()
        .parse::<f64>()
        .map_err(|e| anyhow::anyhow!("Invalid stage time `{time}`: {e}"))?;
    let target = target
        .trim()
        .parse::<f64>()
        .map_err(|e| anyhow::anyhow!("Invalid stage target `{target}`: {e}"))?;

    Ok((time, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_full_command_line() {
        let cli = StampedeCli::try_parse_from([
            "stampede",
            "-n",
            "50",
            "-c",
            "5",
            "--ramp-up",
            "2.5",
            "--flow-pattern=0,1,1",
            "--seed",
            "17",
            "--no-progress",
            "node",
            "user.js",
            "--headless",
        ])
        .unwrap();

        assert_eq!(cli.runs, 50);
        assert_eq!(cli.concurrency, 5);
        assert_eq!(cli.ramp_up, 2.5);
        assert_eq!(cli.flow_pattern, Some(vec![0, 1, 1]));
        assert_eq!(cli.flow_weights, None);
        assert_eq!(cli.seed, Some(17));
        assert!(cli.no_progress);
        assert_eq!(cli.worker, vec!["node", "user.js", "--headless"]);
    }

    #[test]
    fn parse_stages() {
        let cli = StampedeCli::try_parse_from([
            "stampede",
            "--stage=0:1",
            "--stage",
            "10:4.5",
            "--flow-weights=2,1",
            "worker",
        ])
        .unwrap();

        assert_eq!(cli.stage, vec![(0.0, 1.0), (10.0, 4.5)]);
        assert_eq!(cli.flow_weights, Some(vec![2.0, 1.0]));
    }

    #[test]
    fn reject_bad_input() {
        assert!(StampedeCli::try_parse_from(["stampede"]).is_err());
        assert!(StampedeCli::try_parse_from(["stampede", "--stage=10", "worker"]).is_err());
        assert!(StampedeCli::try_parse_from([
            "stampede",
            "--flow-weights=1,1",
            "--flow-pattern=0",
            "worker"
        ])
        .is_err());
    }

    #[test]
    fn negative_seed_reaches_validation() {
        let cli = StampedeCli::try_parse_from(["stampede", "--seed", "-3", "worker"]).unwrap();
        assert_eq!(cli.seed, Some(-3));
    }
}
