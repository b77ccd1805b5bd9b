pub mod types;
pub mod resolver;

pub use types::*;
pub use resolver::*;
