use itertools::Itertools;
use stampede_summary_model::{HistogramSummary, StatusCount};
use tabled::Tabled;

#[derive(Tabled)]
pub struct RunRow {
    pub outcome: String,
    pub runs: usize,
    #[tabled(display = "float2")]
    pub min_ms: Option<f64>,
    #[tabled(display = "float2")]
    pub mean_ms: Option<f64>,
    #[tabled(display = "float2")]
    pub p50_ms: Option<f64>,
    #[tabled(display = "float2")]
    pub p95_ms: Option<f64>,
    #[tabled(display = "float2")]
    pub p99_ms: Option<f64>,
    #[tabled(display = "float2")]
    pub max_ms: Option<f64>,
    pub results: String,
}

impl RunRow {
    pub fn new(outcome: &str, durations: &HistogramSummary, results: &[StatusCount]) -> Self {
        Self {
            outcome: outcome.to_string(),
            runs: durations.count,
            min_ms: durations.min,
            mean_ms: durations.mean,
            p50_ms: durations.p50,
            p95_ms: durations.p95,
            p99_ms: durations.p99,
            max_ms: durations.max,
            results: format_results(results),
        }
    }
}

#[derive(Tabled)]
pub struct ActionRow {
    pub action: String,
    pub ok: usize,
    pub failed: usize,
    #[tabled(display = "float2")]
    pub ok_mean_ms: Option<f64>,
    #[tabled(display = "float2")]
    pub ok_p95_ms: Option<f64>,
    #[tabled(display = "float2")]
    pub failed_mean_ms: Option<f64>,
    pub results: String,
}

pub fn format_results(results: &[StatusCount]) -> String {
    results
        .iter()
        .map(|r| format!("{} x{}", r.status, r.count))
        .join(", ")
}

fn float2(n: &Option<f64>) -> String {
    match n {
        Some(n) => format!("{:.2}", n),
        None => "-".to_string(),
    }
}
