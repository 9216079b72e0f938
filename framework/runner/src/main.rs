use stampede_runner::prelude::*;

fn main() -> anyhow::Result<()> {
    let cli = init();

    let config = RunConfigBuilder::from_cli(cli)?.build()?;
    let summary = run(config)?;

    if summary.error.durations.count > 0 {
        log::info!(
            "{} of {} runs failed",
            summary.error.durations.count,
            summary.total_runs()
        );
    }

    Ok(())
}
