//! Re-identification risk metrics and linkage attack simulation

pub mod engine;

pub use engine::RiskAssessmentEngine;
