pub mod hub;
pub mod llm;
