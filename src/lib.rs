pub mod cache;
pub mod config;
pub mod error;
pub mod intent;
pub mod pipeline;
pub mod planner;
pub mod services;
pub mod snapshot;

// Re-export the entry points most callers need.
pub use cache::PlanCache;
pub use config::HearthConfig;
pub use pipeline::Pipeline;
