//! AMC Evaluation Engine
//!
//! This crate counts how many subjects, or objects attached to subjects,
//! pass a rule's denominator and numerator filters over a measurement period.
//!
//! # Example
//!
//! ```ignore
//! use octofhir_amc_eval::{EvaluationOptions, MeasureEvaluator};
//!
//! let mut evaluator = MeasureEvaluator::builder(rule, report)
//!     .population(population)
//!     .period(period)
//!     .collector(collector)
//!     .options(EvaluationOptions::default())
//!     .build()?;
//!
//! let result = evaluator.execute()?;
//! ```
//!
//! # Architecture
//!
//! - `AmcFilter`: a boolean test over (subject, attached object, period)
//! - `AmcReport`: a rule implementation providing its `Numerator`, its
//!   `Denominator` and the object type it counts
//! - `MeasureEvaluator`: the two-pass denominator/numerator loop
//! - `ItemTracker`: per-object itemization (audit) sink
//! - `ReportRegistry`: rule id to report factory mapping
//! - `criteria`: filters and reports defined in JSON
//!
//! # Two-pass counting
//!
//! When objects other than patients are counted, the numerator is only
//! tested against objects that already passed the denominator, and one
//! itemized entry is written for each of them.

pub mod criteria;
pub mod engine;
pub mod filter;
pub mod registry;
pub mod report;
pub mod session;
pub mod tracker;

pub use criteria::{CompiledCriterion, CriteriaReport, Criterion, ReportDefinition};
pub use engine::{EvaluationOptions, MeasureEvaluator, MeasureEvaluatorBuilder};
pub use filter::{AmcFilter, Denominator, FnFilter, Numerator, filter_fn};
pub use registry::{ReportFactory, ReportRegistry};
pub use report::{AmcReport, FilterReport};
pub use session::{ReportSession, RuleRun};
pub use tracker::{ItemTracker, NullTracker, RecordingTracker, SqlItemTracker, select_tracker};
