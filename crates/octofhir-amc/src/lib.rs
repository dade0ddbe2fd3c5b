//! Automated Measure Calculation (AMC) for Rust
//!
//! This crate bundles the AMC engine:
//! - Subjects, measurement periods, candidate objects and results
//! - Data store access for populations and attached objects
//! - Two-pass denominator/numerator evaluation with itemization
//! - Rules defined as declarative JSON criteria
//!
//! # Example
//!
//! ```ignore
//! use octofhir_amc::{CriteriaReport, ReportRegistry, ReportSession};
//!
//! let mut registry = ReportRegistry::new();
//! registry.register("send_sum_amc", CriteriaReport::factory);
//!
//! let session = ReportSession::new(Arc::new(registry)).with_collector(collector);
//! let runs = session.run(&rules, &population, period)?;
//! ```

// Re-export all public APIs from internal crates
pub use octofhir_amc_diagnostics as diagnostics;
pub use octofhir_amc_eval as eval;
pub use octofhir_amc_model as model;
pub use octofhir_amc_types as types;

// Convenience re-exports
pub use octofhir_amc_diagnostics::{AmcError, AmcResult};
pub use octofhir_amc_eval::{
    AmcFilter, AmcReport, CriteriaReport, Criterion, EvaluationOptions, MeasureEvaluator,
    ReportRegistry, ReportSession,
};
pub use octofhir_amc_types::{MeasurementPeriod, ObjectTypeTag, ResultAggregate, Rule, Subject};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
