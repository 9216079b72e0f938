use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::error::ConfigError;

/// The single seeded random generator shared by everything that needs randomness during a run.
///
/// Every draw advances the same state, so draws must happen in a fixed order relative to run
/// launches for a seed to reproduce a run. Components take it by `&mut` rather than keeping their
/// own generator.
#[derive(Debug, Clone)]
pub struct SeededRng {
    seed: u64,
    inner: StdRng,
}

impl SeededRng {
    /// Create a generator from a user supplied seed, which must be positive.
    pub fn new(seed: i64) -> Result<Self, ConfigError> {
        if seed <= 0 {
            return Err(ConfigError::NonPositiveSeed(seed));
        }

        Ok(Self {
            seed: seed as u64,
            inner: StdRng::seed_from_u64(seed as u64),
        })
    }

    /// Pick a fresh positive seed from the operating system.
    pub fn random_seed() -> i64 {
        // Keep within the positive i64 range so the seed can be passed back in on the command line.
        (rand::rngs::OsRng.next_u64() >> 1).max(1) as i64
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Draw a float in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    pub(crate) fn inner_mut(&mut self) -> &mut StdRng {
        &mut self.inner
    }
}
