mod tables;

use stampede_summary_model::{RunRecord, Summary};
use tabled::settings::Style;
use tabled::Table;

use crate::report::summary_report::tables::{format_results, ActionRow, RunRow};
use crate::report::ReportCollector;

/// Prints a summary of the runs and actions once everything has finished.
#[derive(Default)]
pub struct SummaryReportCollector {}

impl SummaryReportCollector {
    pub fn new() -> Self {
        Self {}
    }

    pub(crate) fn render(summary: &Summary) -> String {
        let runs = vec![
            RunRow::new("success", &summary.success.durations, &summary.success.results),
            RunRow::new("error", &summary.error.durations, &summary.error.results),
        ];
        let mut runs_table = Table::new(runs);
        runs_table.with(Style::modern());

        let mut out = format!(
            "\nSummary of runs ({} finished in {})\n{runs_table}\n",
            summary.total_runs(),
            summary
                .elapsed_ms
                .map(|ms| format!("{:.2}s", ms as f64 / 1000.0))
                .unwrap_or_else(|| "-".to_string()),
        );

        if !summary.actions.is_empty() {
            let actions = summary
                .actions
                .iter()
                .map(|action| ActionRow {
                    action: action.name.clone(),
                    ok: action.success.count,
                    failed: action.error.count,
                    ok_mean_ms: action.success.mean,
                    ok_p95_ms: action.success.p95,
                    failed_mean_ms: action.error.mean,
                    results: format_results(&action.results),
                })
                .collect::<Vec<_>>();
            let mut actions_table = Table::new(actions);
            actions_table.with(Style::modern());

            out.push_str(&format!("\nSummary of actions\n{actions_table}\n"));
        }

        out
    }
}

impl ReportCollector for SummaryReportCollector {
    fn add_run(&mut self, _record: &RunRecord) -> anyhow::Result<()> {
        // Nothing to do until the end
        Ok(())
    }

    fn finalize(&mut self, summary: &Summary) -> anyhow::Result<()> {
        println!("{}", Self::render(summary));
        Ok(())
    }
}
