use std::path::PathBuf;

use anyhow::Context;
use stampede_summary_model::{store_summary, RunRecord, Summary};

use crate::report::ReportCollector;

/// Writes the final summary to a JSON file.
pub struct SummaryFileReportCollector {
    path: PathBuf,
}

impl SummaryFileReportCollector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ReportCollector for SummaryFileReportCollector {
    fn add_run(&mut self, _record: &RunRecord) -> anyhow::Result<()> {
        Ok(())
    }

    fn finalize(&mut self, summary: &Summary) -> anyhow::Result<()> {
        let mut file = std::fs::File::create(&self.path)
            .with_context(|| format!("Failed to create '{}'", self.path.display()))?;
        store_summary(summary, &mut file)
            .with_context(|| format!("Failed to write summary to '{}'", self.path.display()))?;

        log::info!("Summary written to '{}'", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ReportConfig, RunLogReportCollector};
    use crate::StatsAggregator;
    use stampede_summary_model::{
        load_run_records, load_summary, RunOutput, RunParameters, StatusValue, WorkerResult,
    };

    #[test]
    fn write_run_log_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let run_log = dir.path().join("runs.jsonl");
        let summary_file = dir.path().join("summary.json");

        let reporter = ReportConfig::default()
            .enable_run_log(run_log.clone())
            .enable_summary_file(summary_file.clone())
            .init();

        let mut aggregator = StatsAggregator::new(
            "run".to_string(),
            0,
            RunParameters {
                total_runs: 1,
                concurrency: 1,
                profile: vec![(0.0, 1.0)],
                flow_weights: Some(vec![1.0]),
                flow_pattern: None,
                seed: 3,
                worker: vec!["w".to_string()],
            },
        );
        let record = RunRecord {
            run_index: 1,
            flow: 0,
            success: true,
            duration_ms: 4.0,
            exit_code: Some(0),
            output: RunOutput::Parsed(WorkerResult {
                status: Some(StatusValue::code(200)),
                actions: vec![],
                log: Some("all good".to_string()),
            }),
            stderr: String::new(),
        };
        aggregator.record_run(&record);
        reporter.add_run(&record).unwrap();

        let summary = aggregator.finalize();
        reporter.finalize(&summary).unwrap();

        assert_eq!(load_run_records(&run_log).unwrap(), vec![record]);
        assert_eq!(
            load_summary(std::fs::File::open(&summary_file).unwrap()).unwrap(),
            summary
        );
    }

    #[test]
    fn unwritable_run_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = RunLogReportCollector::new(dir.path().join("missing").join("runs.jsonl"));

        let result = collector.add_run(&RunRecord {
            run_index: 9,
            flow: 0,
            success: false,
            duration_ms: 1.0,
            exit_code: None,
            output: RunOutput::Invalid {
                raw: String::new(),
                error: "no output".to_string(),
            },
            stderr: String::new(),
        });

        assert!(result
            .unwrap_err()
            .to_string()
            .starts_with("Failed to append run 9"));
    }
}
