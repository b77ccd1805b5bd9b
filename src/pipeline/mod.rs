pub mod types;
pub mod stats;
pub mod orchestrator;

pub use types::*;
pub use stats::*;
pub use orchestrator::Pipeline;
