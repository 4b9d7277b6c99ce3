//! Utility loss metrics comparing protected and original tables

pub mod engine;

pub use engine::UtilityEvaluationEngine;
