//! Access decisions

pub mod engine;

pub use engine::{Decision, DecisionEngine};
