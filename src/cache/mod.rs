pub mod types;
pub mod fingerprint;
pub mod store;

pub use types::*;
pub use fingerprint::fingerprint;
pub use store::*;
