//! Denominator and numerator filters

use chrono::NaiveDateTime;
use octofhir_amc_diagnostics::AmcResult;
use octofhir_amc_types::{CandidateObject, Subject};
use std::sync::Arc;

/// A boolean test over a subject and, when objects are counted, the object
/// currently under test
pub trait AmcFilter: Send + Sync {
    fn test(
        &self,
        subject: &Subject,
        object: Option<&CandidateObject>,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AmcResult<bool>;
}

impl<F: AmcFilter + ?Sized> AmcFilter for Box<F> {
    fn test(
        &self,
        subject: &Subject,
        object: Option<&CandidateObject>,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AmcResult<bool> {
        (**self).test(subject, object, begin, end)
    }
}

impl<F: AmcFilter + ?Sized> AmcFilter for Arc<F> {
    fn test(
        &self,
        subject: &Subject,
        object: Option<&CandidateObject>,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AmcResult<bool> {
        (**self).test(subject, object, begin, end)
    }
}

macro_rules! filter_role {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name(Box<dyn AmcFilter>);

        impl $name {
            pub fn new(filter: impl AmcFilter + 'static) -> Self {
                Self(Box::new(filter))
            }

            pub fn test(
                &self,
                subject: &Subject,
                object: Option<&CandidateObject>,
                begin: NaiveDateTime,
                end: NaiveDateTime,
            ) -> AmcResult<bool> {
                self.0.test(subject, object, begin, end)
            }
        }

        impl From<Box<dyn AmcFilter>> for $name {
            fn from(filter: Box<dyn AmcFilter>) -> Self {
                Self(filter)
            }
        }
    };
}

filter_role! {
    /// The filter deciding what is counted in the numerator
    Numerator
}

filter_role! {
    /// The filter deciding what is counted in the denominator
    Denominator
}

/// Filter backed by a closure
pub struct FnFilter<F>(F);

impl<F> AmcFilter for FnFilter<F>
where
    F: Fn(&Subject, Option<&CandidateObject>, NaiveDateTime, NaiveDateTime) -> AmcResult<bool>
        + Send
        + Sync,
{
    fn test(
        &self,
        subject: &Subject,
        object: Option<&CandidateObject>,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AmcResult<bool> {
        (self.0)(subject, object, begin, end)
    }
}

/// Wrap a closure as a filter
pub fn filter_fn<F>(f: F) -> FnFilter<F>
where
    F: Fn(&Subject, Option<&CandidateObject>, NaiveDateTime, NaiveDateTime) -> AmcResult<bool>
        + Send
        + Sync,
{
    FnFilter(f)
}
