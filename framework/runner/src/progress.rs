use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Counters shown on the progress bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub finished: usize,
    pub active: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub steps_started: usize,
    pub steps_finished: usize,
}

/// Displays a progress bar while runs are in flight to show the user how many are left.
#[derive(Debug, Clone)]
pub struct RunProgress {
    pb: ProgressBar,
}

impl RunProgress {
    pub fn new(total_runs: usize) -> anyhow::Result<Self> {
        let pb = ProgressBar::new(total_runs as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} runs [{elapsed_precise}] {msg}",
            )?
            .progress_chars("#>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(250));

        Ok(Self { pb })
    }

    /// A progress bar that draws nothing, for CI and tests.
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    pub fn update(&self, snapshot: ProgressSnapshot) {
        self.pb.set_position(snapshot.finished as u64);
        self.pb.set_message(format!(
            "active {} | ok {} | failed {} | steps {}/{}",
            snapshot.active,
            snapshot.succeeded,
            snapshot.failed,
            snapshot.steps_finished,
            snapshot.steps_started
        ));
    }

    pub fn finish(&self) {
        log::trace!("Progress bar finished");
        self.pb.finish_and_clear();
    }

    pub fn position(&self) -> u64 {
        self.pb.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_bar_tracks_position() {
        let progress = RunProgress::hidden();
        progress.update(ProgressSnapshot {
            finished: 3,
            active: 2,
            succeeded: 2,
            failed: 1,
            steps_started: 5,
            steps_finished: 4,
        });

        assert_eq!(progress.position(), 3);
    }
}
