use stampede_summary_model::HistogramSummary;

/// Highest trackable value before the histogram resizes, one hour in microseconds.
const HIGHEST_TRACKABLE_US: u64 = 3_600_000_000;
const SIGNIFICANT_FIGURES: u8 = 3;

/// An append-only set of millisecond samples.
///
/// Quantiles come from an HDR histogram recording microseconds with 3 significant figures, so
/// they are within 0.1% of the recorded values. Count, min, max and mean are kept exactly.
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    /// Created on the first sample
    quantiles: Option<hdrhistogram::Histogram<u64>>,
    count: usize,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sample_ms: f64) {
        self.count += 1;
        self.sum += sample_ms;
        self.min = Some(self.min.map_or(sample_ms, |min| min.min(sample_ms)));
        self.max = Some(self.max.map_or(sample_ms, |max| max.max(sample_ms)));

        if self.quantiles.is_none() {
            match hdrhistogram::Histogram::new_with_bounds(
                1,
                HIGHEST_TRACKABLE_US,
                SIGNIFICANT_FIGURES,
            ) {
                Ok(mut histogram) => {
                    histogram.auto(true);
                    self.quantiles = Some(histogram);
                }
                Err(e) => {
                    log::error!("Failed to create latency histogram: {e:?}");
                    return;
                }
            }
        }

        if let Some(quantiles) = &mut self.quantiles {
            // HdrHistogram lower bound must be >= 1; we clamp 0 -> 1 when recording.
            let sample_us = ((sample_ms * 1000.0).round() as u64).max(1);
            if let Err(e) = quantiles.record(sample_us) {
                log::warn!("Sample of {sample_ms}ms not added to the latency histogram: {e:?}");
            }
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }

        Some(self.sum / self.count as f64)
    }

    /// The value at percentile `pct`, in `[0, 100]`, kept within the recorded min and max.
    pub fn percentile(&self, pct: f64) -> Option<f64> {
        let quantiles = self.quantiles.as_ref().filter(|h| !h.is_empty())?;
        let (min, max) = (self.min?, self.max?);

        let value_ms = quantiles.value_at_quantile(pct / 100.0) as f64 / 1000.0;
        Some(value_ms.clamp(min, max))
    }

    pub fn summary(&self) -> HistogramSummary {
        HistogramSummary {
            count: self.count,
            min: self.min,
            max: self.max,
            mean: self.mean(),
            p50: self.percentile(50.0),
            p75: self.percentile(75.0),
            p90: self.percentile(90.0),
            p95: self.percentile(95.0),
            p99: self.percentile(99.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.unwrap();
        assert!(
            (actual - expected).abs() <= expected * 0.001,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_histogram() {
        let histogram = Histogram::new();

        assert!(histogram.is_empty());
        assert_eq!(histogram.summary(), HistogramSummary::default());
        assert_eq!(histogram.percentile(50.0), None);
    }

    #[test]
    fn summary_of_samples() {
        let mut histogram = Histogram::new();
        for sample in (1..=100).rev() {
            histogram.add(sample as f64);
        }

        let summary = histogram.summary();
        assert_eq!(summary.count, 100);
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.max, Some(100.0));
        assert_eq!(summary.mean, Some(50.5));
        assert_close(summary.p50, 50.0);
        assert_close(summary.p90, 90.0);
        assert_close(summary.p99, 99.0);
        assert_eq!(histogram.percentile(100.0), Some(100.0));
    }

    #[test]
    fn single_sample_is_every_percentile() {
        let mut histogram = Histogram::new();
        histogram.add(7.5);

        let summary = histogram.summary();
        assert_eq!(summary.min, Some(7.5));
        assert_eq!(summary.p50, Some(7.5));
        assert_eq!(summary.p99, Some(7.5));
        assert_eq!(histogram.percentile(0.0), Some(7.5));
    }

    #[test]
    fn zero_and_huge_samples_are_recorded() {
        let mut histogram = Histogram::new();
        histogram.add(0.0);
        histogram.add(0.0);
        histogram.add(0.0);
        // Two hours, beyond the initial bound.
        histogram.add(7_200_000.0);

        let summary = histogram.summary();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.min, Some(0.0));
        assert_eq!(summary.max, Some(7_200_000.0));
        // Zero is recorded as the smallest trackable value, a microsecond.
        assert!(summary.p50.unwrap() <= 0.001);
        assert_close(summary.p99, 7_200_000.0);
    }
}
