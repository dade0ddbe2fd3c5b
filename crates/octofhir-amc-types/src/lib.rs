//! AMC data model
//!
//! This crate defines the values that flow through a measure evaluation:
//! - [`Subject`] and [`SubjectId`]: the patients of a population
//! - [`MeasurementPeriod`]: the reporting window, with per-subject start resolution
//! - [`ObjectTypeTag`] and [`CandidateObject`]: what a rule counts
//! - [`Rule`] and [`ResultAggregate`]: rule identity and the emitted totals
//! - [`ItemizationContext`] and [`TrackedItem`]: per-object audit records

pub mod itemization;
pub mod object;
pub mod period;
pub mod result;
pub mod rule;
pub mod subject;

pub use itemization::*;
pub use object::*;
pub use period::*;
pub use result::*;
pub use rule::*;
pub use subject::*;
