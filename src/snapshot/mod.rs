pub mod types;
pub mod provider;

pub use types::*;
pub use provider::*;
