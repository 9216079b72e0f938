mod error;
mod finish;
mod flow;
mod ramp;
mod rng;

pub mod prelude {
    pub use crate::error::ConfigError;
    pub use crate::finish::{FinishHandle, FinishListener};
    pub use crate::flow::{FlowMode, FlowSelector};
    pub use crate::ramp::{ConcurrencyProfile, ControlPoint};
    pub use crate::rng::SeededRng;
}
