pub mod types;
pub mod fallback;
pub mod refine;
pub mod resolver;

pub use types::*;
pub use fallback::fallback_plan;
pub use refine::{check_feasibility, refine, Infeasibility};
pub use resolver::*;
