//! Population subjects

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a subject (patient) in the data store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for SubjectId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// A member of the population being measured
///
/// Subjects are read-only during an evaluation. The object currently under
/// test is passed to filters alongside the subject instead of being attached
/// to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    /// Date of birth, when recorded
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

impl Subject {
    pub fn new(id: impl Into<SubjectId>, date_of_birth: NaiveDate) -> Self {
        Self {
            id: id.into(),
            date_of_birth: Some(date_of_birth),
        }
    }

    /// Subject whose birth date is not on record
    pub fn without_birth_date(id: impl Into<SubjectId>) -> Self {
        Self {
            id: id.into(),
            date_of_birth: None,
        }
    }

    pub fn id(&self) -> &SubjectId {
        &self.id
    }

    pub fn date_of_birth(&self) -> Option<NaiveDate> {
        self.date_of_birth
    }

    /// Age in completed years on the given date
    pub fn age_on(&self, date: NaiveDate) -> Option<u32> {
        self.date_of_birth.and_then(|dob| date.years_since(dob))
    }
}
