pub mod engine;
pub mod evaluator;
