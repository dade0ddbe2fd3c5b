//! Patient populations

use crate::provider::QueryExecutor;
use chrono::NaiveDate;
use octofhir_amc_diagnostics::{AmcError, AmcResult};
use octofhir_amc_types::{FieldValue, Subject, SubjectId};
use std::collections::HashMap;

const BIRTH_DATE_QUERY: &str =
    "SELECT DATE_FORMAT(`DOB`, '%Y-%m-%d') AS `dob` FROM `patient_data` WHERE `pid` = ?";

/// The subjects of one evaluation, in the order their ids were supplied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Population {
    subjects: Vec<Subject>,
}

impl Population {
    pub fn new(subjects: Vec<Subject>) -> Self {
        Self { subjects }
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Subject> {
        self.subjects.iter()
    }

    pub fn subject_ids(&self) -> Vec<SubjectId> {
        self.subjects.iter().map(|s| s.id.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a Population {
    type Item = &'a Subject;
    type IntoIter = std::slice::Iter<'a, Subject>;

    fn into_iter(self) -> Self::IntoIter {
        self.subjects.iter()
    }
}

impl FromIterator<Subject> for Population {
    fn from_iter<I: IntoIterator<Item = Subject>>(iter: I) -> Self {
        Self {
            subjects: iter.into_iter().collect(),
        }
    }
}

/// Builds a population from a list of subject ids
pub trait PopulationSource: Send + Sync {
    /// Load every listed subject; an unknown id fails the whole load
    fn load(&self, ids: &[SubjectId]) -> AmcResult<Population>;
}

/// Population source reading birth dates from the `patient_data` table
pub struct SqlPopulationSource<E> {
    executor: E,
}

impl<E: QueryExecutor> SqlPopulationSource<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// SQL used to look up one subject's birth date
    pub fn birth_date_query() -> &'static str {
        BIRTH_DATE_QUERY
    }

    fn load_subject(&self, id: &SubjectId) -> AmcResult<Subject> {
        let rows = self
            .executor
            .query(BIRTH_DATE_QUERY, &[FieldValue::text(id.as_str())])
            .map_err(|e| AmcError::from(e).with_subject(id.as_str()))?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AmcError::subject_not_found(id.as_str()))?;

        let date_of_birth = match row.get("dob") {
            None | Some(FieldValue::Null) => None,
            Some(FieldValue::Text(text)) if text.trim().is_empty() => None,
            Some(FieldValue::DateTime(dt)) => Some(dt.date()),
            Some(FieldValue::Text(text)) => Some(
                NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").map_err(|_| {
                    AmcError::malformed_row(format!("Invalid date of birth '{}'", text))
                        .with_subject(id.as_str())
                })?,
            ),
            Some(other) => {
                return Err(AmcError::malformed_row(format!(
                    "Invalid date of birth '{}'",
                    other
                ))
                .with_subject(id.as_str()));
            }
        };

        Ok(Subject {
            id: id.clone(),
            date_of_birth,
        })
    }
}

impl<E: QueryExecutor> PopulationSource for SqlPopulationSource<E> {
    fn load(&self, ids: &[SubjectId]) -> AmcResult<Population> {
        let subjects = ids
            .iter()
            .map(|id| self.load_subject(id))
            .collect::<AmcResult<Vec<_>>>()?;
        log::debug!("loaded population of {} subjects", subjects.len());
        Ok(Population::new(subjects))
    }
}

/// Population source over subjects held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryPopulationSource {
    subjects: HashMap<SubjectId, Subject>,
}

impl InMemoryPopulationSource {
    pub fn new(subjects: impl IntoIterator<Item = Subject>) -> Self {
        Self {
            subjects: subjects.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn insert(&mut self, subject: Subject) {
        self.subjects.insert(subject.id.clone(), subject);
    }
}

impl PopulationSource for InMemoryPopulationSource {
    fn load(&self, ids: &[SubjectId]) -> AmcResult<Population> {
        ids.iter()
            .map(|id| {
                self.subjects
                    .get(id)
                    .cloned()
                    .ok_or_else(|| AmcError::subject_not_found(id.as_str()))
            })
            .collect()
    }
}
