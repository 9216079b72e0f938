/// Recommended error type for code driving a run. Per-run failures are never reported through
/// this type, only problems that stop a run from starting or finishing.
pub type StampedeResult<T> = anyhow::Result<T>;
