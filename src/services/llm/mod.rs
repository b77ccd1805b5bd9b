pub mod client;

pub use client::{parse_intent, parse_plan, LlmService};
