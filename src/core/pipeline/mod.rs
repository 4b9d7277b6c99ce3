//! Pipeline runs and their orchestration
//!
//! A run moves `Pending -> RiskAssessingBaseline -> Enhancing ->
//! RiskAssessingProtected -> EvaluatingUtility -> Completed`, or to `Failed`
//! from any non-terminal status.

pub mod orchestrator;
pub mod report;
pub mod run;

pub use orchestrator::PipelineOrchestrator;
pub use report::{PipelineReport, RiskComparison};
pub use run::{PipelineRun, RunFailure, RunRequest, RunStatus, StatusTransition};
