use std::cmp::Ordering;
use std::collections::HashMap;

use stampede_summary_model::{StatusCount, StatusValue};

/// Counts how often each status was seen.
#[derive(Debug, Clone, Default)]
pub struct ResultsCounter {
    counts: HashMap<StatusValue, u64>,
}

impl ResultsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, status: StatusValue) {
        *self.counts.entry(status).or_default() += 1;
    }

    pub fn get(&self, status: &StatusValue) -> u64 {
        self.counts.get(status).copied().unwrap_or_default()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Counts in a stable order: numbers ascending, then tokens alphabetically.
    pub fn summary(&self) -> Vec<StatusCount> {
        let mut counts = self
            .counts
            .iter()
            .map(|(status, count)| StatusCount {
                status: status.clone(),
                count: *count,
            })
            .collect::<Vec<_>>();
        counts.sort_by(|a, b| compare_status(&a.status, &b.status));
        counts
    }
}

fn compare_status(a: &StatusValue, b: &StatusValue) -> Ordering {
    match (a, b) {
        (StatusValue::Number(a), StatusValue::Number(b)) => a
            .as_f64()
            .unwrap_or_default()
            .total_cmp(&b.as_f64().unwrap_or_default())
            .then_with(|| a.to_string().cmp(&b.to_string())),
        (StatusValue::Number(_), StatusValue::Token(_)) => Ordering::Less,
        (StatusValue::Token(_), StatusValue::Number(_)) => Ordering::Greater,
        (StatusValue::Token(a), StatusValue::Token(b)) => a.cmp(b),
    }
}
