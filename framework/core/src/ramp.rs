use crate::error::ConfigError;

/// A single control point of a [ConcurrencyProfile].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    /// Offset from the start of the run, in seconds.
    pub time_s: f64,
    /// The number of concurrent runs wanted at that offset.
    pub target: f64,
}

impl ControlPoint {
    pub fn new(time_s: f64, target: f64) -> Self {
        Self { time_s, target }
    }
}

/// Maps elapsed time to a target concurrency level.
///
/// The target is interpolated linearly between the two control points either side of the elapsed
/// time. Before the first point the first target is used and after the last point the last target
/// is held.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyProfile {
    points: Vec<ControlPoint>,
}

impl ConcurrencyProfile {
    /// Build a profile from control points, which must be strictly ascending in time.
    pub fn new(points: Vec<ControlPoint>) -> Result<Self, ConfigError> {
        let Some(last) = points.last() else {
            return Err(ConfigError::EmptyProfile);
        };

        for (index, point) in points.iter().enumerate() {
            if !point.time_s.is_finite()
                || !point.target.is_finite()
                || point.time_s < 0.0
                || point.target < 0.0
            {
                return Err(ConfigError::InvalidProfilePoint { index });
            }
        }

        if let Some(index) = points
            .windows(2)
            .position(|pair| pair[1].time_s <= pair[0].time_s)
        {
            return Err(ConfigError::ProfileNotAscending {
                index: index + 1,
                time_s: points[index + 1].time_s,
            });
        }

        // Anything below one would leave runs waiting forever once the profile is exhausted.
        if last.target < 1.0 {
            return Err(ConfigError::ZeroFinalConcurrency);
        }

        Ok(Self { points })
    }

    /// The usual profile: ramp from zero to `concurrency` over `ramp_up_s` seconds.
    ///
    /// With no ramp-up the full concurrency is available immediately.
    pub fn ramp(ramp_up_s: f64, concurrency: usize) -> Result<Self, ConfigError> {
        if concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if !ramp_up_s.is_finite() || ramp_up_s < 0.0 {
            return Err(ConfigError::InvalidProfilePoint { index: 1 });
        }

        if ramp_up_s > 0.0 {
            Self::new(vec![
                ControlPoint::new(0.0, 0.0),
                ControlPoint::new(ramp_up_s, concurrency as f64),
            ])
        } else {
            Self::new(vec![ControlPoint::new(0.0, concurrency as f64)])
        }
    }

    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    /// The largest target anywhere in the profile.
    pub fn peak(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.target)
            .fold(0.0, f64::max)
    }

    /// The time at which the profile reaches its final target.
    pub fn settle_time_s(&self) -> f64 {
        self.points.last().map(|p| p.time_s).unwrap_or_default()
    }

    /// Target concurrency after `elapsed_s` seconds.
    pub fn target_concurrency(&self, elapsed_s: f64) -> f64 {
        let first = self.points[0];
        if elapsed_s <= first.time_s {
            return first.target;
        }

        for pair in self.points.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if elapsed_s <= to.time_s {
                let progress = (elapsed_s - from.time_s) / (to.time_s - from.time_s);
                return from.target + (to.target - from.target) * progress;
            }
        }

        self.points[self.points.len() - 1].target
    }

    /// The whole number of concurrent runs allowed after `elapsed_s` seconds.
    ///
    /// A new slot opens once the interpolated target reaches the next whole run.
    pub fn slots(&self, elapsed_s: f64) -> usize {
        self.target_concurrency(elapsed_s).floor() as usize
    }
}
