//! Privacy enhancement
//!
//! Two techniques reduce re-identification risk:
//! - **k-anonymity**: generalize quasi-identifiers along
//!   [`GeneralizationHierarchy`] levels, then suppress what is left
//! - **differential privacy**: Laplace noise on numeric columns, optionally
//!   randomized response on categorical ones
//!
//! Both run through [`PrivacyEnhancementEngine::enhance`] and return a
//! [`ProtectedResult`].

pub mod config;
pub mod differential;
pub mod engine;
pub mod equivalence;
pub mod hierarchy;
pub mod kanonymity;
pub mod summary;

pub use config::{
    DifferentialPrivacyParams, KAnonymityParams, NoiseMechanism, PrivacyEnhancementConfig,
};
pub use engine::PrivacyEnhancementEngine;
pub use equivalence::EquivalenceClasses;
pub use hierarchy::{GeneralizationHierarchy, HierarchySpec, Level, Recoding};
pub use summary::{
    ColumnGeneralization, DifferentialPrivacySummary, KAnonymitySummary, NoisyAggregate,
    PrivacySummary, ProtectedResult,
};
