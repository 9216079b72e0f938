mod aggregator;
mod counter;
mod histogram;
mod report;

pub use aggregator::{RunBucket, StatsAggregator};
pub use counter::ResultsCounter;
pub use histogram::Histogram;
pub use report::{
    ReportCollector, ReportConfig, Reporter, RunLogReportCollector, SummaryFileReportCollector,
    SummaryReportCollector,
};
