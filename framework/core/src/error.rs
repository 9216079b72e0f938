/// Problems with a run configuration.
///
/// These are detected before any run is scheduled and are fatal to the invocation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("The total number of runs must be at least 1")]
    ZeroRuns,
    #[error("Concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("Flow weights and a flow pattern cannot both be used, pick one")]
    ConflictingFlowModes,
    #[error("At least one flow weight is required")]
    NoFlowWeights,
    #[error("Flow weight {weight} at position {index} must be a positive number")]
    InvalidFlowWeight { index: usize, weight: f64 },
    #[error("The flow pattern must contain at least one flow")]
    EmptyFlowPattern,
    #[error("The seed must be a positive integer, got {0}")]
    NonPositiveSeed(i64),
    #[error("A concurrency profile needs at least one control point")]
    EmptyProfile,
    #[error("Concurrency profile point {index} at {time_s}s is not after the previous point")]
    ProfileNotAscending { index: usize, time_s: f64 },
    #[error("Concurrency profile point {index} has a non-finite or negative value")]
    InvalidProfilePoint { index: usize },
    #[error("The final concurrency target must be at least 1 so that every run can start")]
    ZeroFinalConcurrency,
}
