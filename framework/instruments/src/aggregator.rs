use std::collections::HashMap;
use std::time::Duration;

use stampede_summary_model::{
    ActionRecord, ActionSummary, BucketSummary, RunParameters, RunRecord, StatusValue, Summary,
};

use crate::counter::ResultsCounter;
use crate::histogram::Histogram;

/// Durations and statuses of either the successful or the failed runs.
#[derive(Debug, Clone, Default)]
pub struct RunBucket {
    durations: Histogram,
    results: ResultsCounter,
}

impl RunBucket {
    pub fn add(&mut self, duration_ms: f64, status: StatusValue) {
        self.durations.add(duration_ms);
        self.results.add(status);
    }

    pub fn count(&self) -> usize {
        self.durations.count()
    }

    pub fn durations(&self) -> &Histogram {
        &self.durations
    }

    pub fn results(&self) -> &ResultsCounter {
        &self.results
    }

    pub fn summary(&self) -> BucketSummary {
        BucketSummary {
            durations: self.durations.summary(),
            results: self.results.summary(),
        }
    }
}

#[derive(Debug, Clone)]
struct ActionBucket {
    name: String,
    success: Histogram,
    error: Histogram,
    results: ResultsCounter,
}

impl ActionBucket {
    fn new(name: String) -> Self {
        Self {
            name,
            success: Histogram::new(),
            error: Histogram::new(),
            results: ResultsCounter::new(),
        }
    }

    fn add(&mut self, action: &ActionRecord) {
        if action.is_success() {
            self.success.add(action.duration_ms);
        } else {
            self.error.add(action.duration_ms);
        }
        self.results.add(
            action
                .status
                .clone()
                .unwrap_or_else(|| StatusValue::token("missing")),
        );
    }

    fn summary(&self) -> ActionSummary {
        ActionSummary {
            name: self.name.clone(),
            count: self.success.count() + self.error.count(),
            success: self.success.summary(),
            error: self.error.summary(),
            results: self.results.summary(),
        }
    }
}

/// Accumulates the outcome of every run and produces the final [Summary].
///
/// Recording is order independent apart from the order of the per-action breakdown, which follows
/// the order actions were first seen in.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    run_id: String,
    started_at: i64,
    elapsed: Option<Duration>,
    parameters: RunParameters,
    success: RunBucket,
    error: RunBucket,
    actions: Vec<ActionBucket>,
    action_index: HashMap<String, usize>,
}

impl StatsAggregator {
    pub fn new(run_id: String, started_at: i64, parameters: RunParameters) -> Self {
        Self {
            run_id,
            started_at,
            elapsed: None,
            parameters,
            success: RunBucket::default(),
            error: RunBucket::default(),
            actions: Vec::new(),
            action_index: HashMap::new(),
        }
    }

    /// Add one run's outcome.
    ///
    /// Each action is classified on its own status, whatever the outcome of the run it belongs to.
    pub fn record(
        &mut self,
        duration_ms: f64,
        success: bool,
        status: StatusValue,
        actions: &[ActionRecord],
    ) {
        let bucket = if success {
            &mut self.success
        } else {
            &mut self.error
        };
        bucket.add(duration_ms, status);

        for action in actions {
            let index = match self.action_index.get(&action.name) {
                Some(index) => *index,
                None => {
                    self.actions.push(ActionBucket::new(action.name.clone()));
                    self.action_index
                        .insert(action.name.clone(), self.actions.len() - 1);
                    self.actions.len() - 1
                }
            };
            self.actions[index].add(action);
        }
    }

    pub fn record_run(&mut self, record: &RunRecord) {
        self.record(
            record.duration_ms,
            record.success,
            record.output.status(),
            record.output.actions(),
        );
    }

    /// Set the total time taken once every run has finished.
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = Some(elapsed);
    }

    pub fn success(&self) -> &RunBucket {
        &self.success
    }

    pub fn error(&self) -> &RunBucket {
        &self.error
    }

    pub fn recorded(&self) -> usize {
        self.success.count() + self.error.count()
    }

    pub fn finalize(&self) -> Summary {
        Summary {
            run_id: self.run_id.clone(),
            started_at: self.started_at,
            elapsed_ms: self.elapsed.map(|e| e.as_millis() as u64),
            parameters: self.parameters.clone(),
            fingerprint: self.parameters.fingerprint(),
            success: self.success.summary(),
            error: self.error.summary(),
            actions: self.actions.iter().map(ActionBucket::summary).collect(),
            stampede_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
