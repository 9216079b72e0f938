use std::path::PathBuf;

use anyhow::Context;
use stampede_summary_model::{append_run_record, RunRecord, Summary};

use crate::report::ReportCollector;

/// Appends every completed run to a JSON lines file as it finishes.
pub struct RunLogReportCollector {
    path: PathBuf,
}

impl RunLogReportCollector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ReportCollector for RunLogReportCollector {
    fn add_run(&mut self, record: &RunRecord) -> anyhow::Result<()> {
        append_run_record(record, &self.path).with_context(|| {
            format!(
                "Failed to append run {} to '{}'",
                record.run_index,
                self.path.display()
            )
        })
    }

    fn finalize(&mut self, _summary: &Summary) -> anyhow::Result<()> {
        log::info!("Run log written to '{}'", self.path.display());
        Ok(())
    }
}
