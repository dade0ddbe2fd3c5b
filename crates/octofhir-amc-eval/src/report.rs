//! Rule implementations

use crate::filter::{AmcFilter, Denominator, Numerator};
use octofhir_amc_types::ObjectTypeTag;
use std::sync::Arc;

/// A measure rule implementation
///
/// A report supplies fresh numerator and denominator filters for each
/// evaluation and names the object type it counts. Reports that count
/// subjects directly keep the default.
pub trait AmcReport: Send + Sync {
    fn create_numerator(&self) -> Numerator;

    fn create_denominator(&self) -> Denominator;

    fn object_to_count(&self) -> ObjectTypeTag {
        ObjectTypeTag::Patients
    }
}

impl<R: AmcReport + ?Sized> AmcReport for Arc<R> {
    fn create_numerator(&self) -> Numerator {
        (**self).create_numerator()
    }

    fn create_denominator(&self) -> Denominator {
        (**self).create_denominator()
    }

    fn object_to_count(&self) -> ObjectTypeTag {
        (**self).object_to_count()
    }
}

/// Report assembled from two shared filters
#[derive(Clone)]
pub struct FilterReport {
    object_to_count: ObjectTypeTag,
    denominator: Arc<dyn AmcFilter>,
    numerator: Arc<dyn AmcFilter>,
}

impl FilterReport {
    pub fn new(
        object_to_count: ObjectTypeTag,
        denominator: impl AmcFilter + 'static,
        numerator: impl AmcFilter + 'static,
    ) -> Self {
        Self {
            object_to_count,
            denominator: Arc::new(denominator),
            numerator: Arc::new(numerator),
        }
    }

    /// Report counting subjects directly
    pub fn patients(
        denominator: impl AmcFilter + 'static,
        numerator: impl AmcFilter + 'static,
    ) -> Self {
        Self::new(ObjectTypeTag::Patients, denominator, numerator)
    }
}

impl AmcReport for FilterReport {
    fn create_numerator(&self) -> Numerator {
        Numerator::new(Arc::clone(&self.numerator))
    }

    fn create_denominator(&self) -> Denominator {
        Denominator::new(Arc::clone(&self.denominator))
    }

    fn object_to_count(&self) -> ObjectTypeTag {
        self.object_to_count
    }
}

impl std::fmt::Debug for FilterReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterReport")
            .field("object_to_count", &self.object_to_count)
            .finish_non_exhaustive()
    }
}
