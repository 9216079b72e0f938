use rand::distributions::{Distribution, WeightedIndex};

use crate::error::ConfigError;
use crate::rng::SeededRng;

/// How flows are assigned to runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FlowMode {
    /// Every run uses flow 0.
    #[default]
    Default,
    /// Each run draws a flow with probability proportional to its weight.
    Weighted(Vec<f64>),
    /// Runs cycle through an explicit sequence of flows.
    Pattern(Vec<usize>),
}

impl FlowMode {
    /// Pick the mode from the two optional user settings, which are mutually exclusive.
    pub fn from_options(
        weights: Option<Vec<f64>>,
        pattern: Option<Vec<usize>>,
    ) -> Result<Self, ConfigError> {
        match (weights, pattern) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingFlowModes),
            (Some(weights), None) => Ok(FlowMode::Weighted(weights)),
            (None, Some(pattern)) => Ok(FlowMode::Pattern(pattern)),
            (None, None) => Ok(FlowMode::Default),
        }
    }

    /// Check the weights or pattern without drawing anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            FlowMode::Default => Ok(()),
            FlowMode::Pattern(pattern) if pattern.is_empty() => Err(ConfigError::EmptyFlowPattern),
            FlowMode::Pattern(_) => Ok(()),
            FlowMode::Weighted(weights) if weights.is_empty() => Err(ConfigError::NoFlowWeights),
            FlowMode::Weighted(weights) => match weights
                .iter()
                .enumerate()
                .find(|(_, w)| !w.is_finite() || **w <= 0.0)
            {
                Some((index, weight)) => Err(ConfigError::InvalidFlowWeight {
                    index,
                    weight: *weight,
                }),
                None => Ok(()),
            },
        }
    }
}

/// Decides the flow number of every run up front.
///
/// In weighted mode all the draws are taken from the shared generator when the selector is built,
/// so the sequence only depends on the seed, the weights and the number of runs.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowSelector {
    Default,
    Weighted(Vec<usize>),
    Pattern(Vec<usize>),
}

impl FlowSelector {
    pub fn new(
        mode: &FlowMode,
        total_runs: usize,
        rng: &mut SeededRng,
    ) -> Result<Self, ConfigError> {
        mode.validate()?;

        match mode {
            FlowMode::Default => Ok(FlowSelector::Default),
            FlowMode::Pattern(pattern) => Ok(FlowSelector::Pattern(pattern.clone())),
            FlowMode::Weighted(weights) => {
                let distribution =
                    WeightedIndex::new(weights).map_err(|_| ConfigError::InvalidFlowWeight {
                        index: 0,
                        weight: weights[0],
                    })?;

                let sequence = (0..total_runs)
                    .map(|_| distribution.sample(rng.inner_mut()))
                    .collect();

                Ok(FlowSelector::Weighted(sequence))
            }
        }
    }

    /// Flow number for a 1-based run index.
    pub fn flow_for(&self, run_index: usize) -> usize {
        let position = run_index.saturating_sub(1);
        match self {
            FlowSelector::Default => 0,
            FlowSelector::Weighted(sequence) => sequence.get(position).copied().unwrap_or(0),
            FlowSelector::Pattern(pattern) => pattern[position % pattern.len()],
        }
    }

    /// The flow numbers of runs `1..=total_runs`.
    pub fn sequence(&self, total_runs: usize) -> Vec<usize> {
        (1..=total_runs).map(|i| self.flow_for(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rng() -> SeededRng {
        SeededRng::new(1234).unwrap()
    }

    #[test]
    fn pattern_cycles() {
        let selector = FlowSelector::new(&FlowMode::Pattern(vec![0, 1, 2]), 7, &mut rng()).unwrap();

        assert_eq!(selector.sequence(7), vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn default_is_always_zero() {
        let selector = FlowSelector::new(&FlowMode::Default, 5, &mut rng()).unwrap();

        assert_eq!(selector.sequence(5), vec![0; 5]);
    }

    #[test]
    fn weighted_is_balanced_and_reproducible() {
        let mode = FlowMode::Weighted(vec![1.0, 1.0]);
        let first = FlowSelector::new(&mode, 1000, &mut rng()).unwrap().sequence(1000);
        let second = FlowSelector::new(&mode, 1000, &mut rng()).unwrap().sequence(1000);

        assert_eq!(first, second);

        let zeros = first.iter().filter(|f| **f == 0).count();
        let ones = first.iter().filter(|f| **f == 1).count();
        assert_eq!(zeros + ones, 1000);
        // Five standard deviations either side of 500.
        assert!((420..=580).contains(&zeros), "got {zeros} zeros");
    }

    #[test]
    fn weighted_follows_weights() {
        let mode = FlowMode::Weighted(vec![1.0, 3.0]);
        let sequence = FlowSelector::new(&mode, 4000, &mut rng()).unwrap().sequence(4000);

        let ones = sequence.iter().filter(|f| **f == 1).count();
        assert!((2850..=3150).contains(&ones), "got {ones} ones");
    }

    #[test]
    fn weighted_draws_advance_the_shared_generator() {
        let mut shared = rng();
        FlowSelector::new(&FlowMode::Weighted(vec![1.0, 1.0]), 10, &mut shared).unwrap();

        let mut fresh = rng();
        assert_ne!(shared.next_unit(), fresh.next_unit());
    }

    #[test]
    fn reject_conflicting_modes() {
        assert_eq!(
            FlowMode::from_options(Some(vec![1.0]), Some(vec![0])).unwrap_err(),
            ConfigError::ConflictingFlowModes
        );
    }

    #[test]
    fn reject_bad_weights_and_patterns() {
        assert_eq!(
            FlowSelector::new(&FlowMode::Weighted(vec![]), 3, &mut rng()).unwrap_err(),
            ConfigError::NoFlowWeights
        );
        assert_eq!(
            FlowSelector::new(&FlowMode::Weighted(vec![1.0, 0.0]), 3, &mut rng()).unwrap_err(),
            ConfigError::InvalidFlowWeight {
                index: 1,
                weight: 0.0
            }
        );
        assert_eq!(
            FlowSelector::new(&FlowMode::Pattern(vec![]), 3, &mut rng()).unwrap_err(),
            ConfigError::EmptyFlowPattern
        );
    }
}
