mod run_log_report;
mod summary_file_report;
mod summary_report;

use std::path::PathBuf;

use parking_lot::Mutex;
use stampede_summary_model::{RunRecord, Summary};

pub use run_log_report::RunLogReportCollector;
pub use summary_file_report::SummaryFileReportCollector;
pub use summary_report::SummaryReportCollector;

/// Receives the outcome of every run and the final summary.
///
/// Collectors own whatever I/O they need. An error from a collector is reported to the caller
/// but never stops a run.
pub trait ReportCollector: Send {
    fn add_run(&mut self, record: &RunRecord) -> anyhow::Result<()>;

    fn finalize(&mut self, summary: &Summary) -> anyhow::Result<()>;
}

/// Choose which collectors a [Reporter] sends to.
#[derive(Default)]
pub struct ReportConfig {
    enable_summary: bool,
    run_log: Option<PathBuf>,
    summary_file: Option<PathBuf>,
    custom: Vec<Box<dyn ReportCollector>>,
}

impl ReportConfig {
    /// Print a table summarising the run once it has finished.
    pub fn enable_summary(mut self) -> Self {
        self.enable_summary = true;
        self
    }

    /// Append every run to a JSON lines file.
    pub fn enable_run_log(mut self, path: PathBuf) -> Self {
        self.run_log = Some(path);
        self
    }

    /// Write the final summary as JSON.
    pub fn enable_summary_file(mut self, path: PathBuf) -> Self {
        self.summary_file = Some(path);
        self
    }

    pub fn with_collector(mut self, collector: Box<dyn ReportCollector>) -> Self {
        self.custom.push(collector);
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Box<dyn ReportCollector>> = Vec::new();

        if self.enable_summary {
            collectors.push(Box::new(SummaryReportCollector::new()));
        }
        if let Some(path) = self.run_log {
            collectors.push(Box::new(RunLogReportCollector::new(path)));
        }
        if let Some(path) = self.summary_file {
            collectors.push(Box::new(SummaryFileReportCollector::new(path)));
        }
        collectors.extend(self.custom);

        Reporter {
            collectors: Mutex::new(collectors),
        }
    }
}

/// Sends records to every configured [ReportCollector].
pub struct Reporter {
    collectors: Mutex<Vec<Box<dyn ReportCollector>>>,
}

impl Reporter {
    /// Hand a completed run to every collector.
    ///
    /// Every collector sees the record even if an earlier one fails. The first failure is returned.
    pub fn add_run(&self, record: &RunRecord) -> anyhow::Result<()> {
        let mut first_error = None;
        for collector in self.collectors.lock().iter_mut() {
            if let Err(e) = collector.add_run(record) {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Hand the final summary to every collector.
    pub fn finalize(&self, summary: &Summary) -> anyhow::Result<()> {
        let mut first_error = None;
        for collector in self.collectors.lock().iter_mut() {
            if let Err(e) = collector.finalize(summary) {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stampede_summary_model::{RunOutput, WorkerResult};

    struct FailingCollector;

    impl ReportCollector for FailingCollector {
        fn add_run(&mut self, _record: &RunRecord) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }

        fn finalize(&mut self, _summary: &Summary) -> anyhow::Result<()> {
            anyhow::bail!("disk still full")
        }
    }

    struct CountingCollector(Arc<Mutex<usize>>);

    impl ReportCollector for CountingCollector {
        fn add_run(&mut self, _record: &RunRecord) -> anyhow::Result<()> {
            *self.0.lock() += 1;
            Ok(())
        }

        fn finalize(&mut self, _summary: &Summary) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failing_collector_does_not_starve_others() {
        let seen = Arc::new(Mutex::new(0));
        let reporter = ReportConfig::default()
            .with_collector(Box::new(FailingCollector))
            .with_collector(Box::new(CountingCollector(seen.clone())))
            .init();

        let record = RunRecord {
            run_index: 1,
            flow: 0,
            success: true,
            duration_ms: 1.0,
            exit_code: Some(0),
            output: RunOutput::Parsed(WorkerResult::default()),
            stderr: String::new(),
        };

        let err = reporter.add_run(&record).unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(*seen.lock(), 1);
    }
}
