//! Declarative filters
//!
//! Rules can be defined without code by giving their filters as JSON:
//!
//! ```json
//! {
//!   "object_to_count": "encounters",
//!   "denominator": { "kind": "field_in_period", "field": "date" },
//!   "numerator": {
//!     "kind": "all",
//!     "criteria": [
//!       { "kind": "field_present", "field": "summary" },
//!       { "kind": "age_at_least", "years": 18 }
//!     ]
//!   }
//! }
//! ```
//!
//! Field criteria only match when an object is under test; for rules that
//! count subjects they evaluate to false.

use crate::filter::{AmcFilter, Denominator, Numerator};
use crate::report::AmcReport;
use chrono::NaiveDateTime;
use octofhir_amc_diagnostics::{AmcError, AmcResult};
use octofhir_amc_types::{CandidateObject, FieldValue, ObjectTypeTag, Rule, Subject};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A filter as written in a rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Criterion {
    Always,
    Never,
    /// The field exists and is not null or blank
    FieldPresent { field: String },
    /// The field's rendered value equals the given value
    FieldEquals { field: String, value: FieldValue },
    /// The field's rendered value matches a regular expression
    FieldMatches { field: String, pattern: String },
    /// The field holds a timestamp inside the effective period
    FieldInPeriod { field: String },
    /// The subject is at least this old at the end of the period
    AgeAtLeast { years: u32 },
    All { criteria: Vec<Criterion> },
    Any { criteria: Vec<Criterion> },
    Not { criterion: Box<Criterion> },
}

impl Criterion {
    /// Names of every criterion kind
    pub const KINDS: [&'static str; 10] = [
        "always",
        "never",
        "field_present",
        "field_equals",
        "field_matches",
        "field_in_period",
        "age_at_least",
        "all",
        "any",
        "not",
    ];

    /// Compile regular expressions and freeze the criterion into a filter
    pub fn compile(&self) -> Result<CompiledCriterion, regex::Error> {
        Ok(match self {
            Self::Always => CompiledCriterion::Constant(true),
            Self::Never => CompiledCriterion::Constant(false),
            Self::FieldPresent { field } => CompiledCriterion::FieldPresent(field.clone()),
            Self::FieldEquals { field, value } => {
                CompiledCriterion::FieldEquals(field.clone(), value.to_string())
            }
            Self::FieldMatches { field, pattern } => {
                CompiledCriterion::FieldMatches(field.clone(), Regex::new(pattern)?)
            }
            Self::FieldInPeriod { field } => CompiledCriterion::FieldInPeriod(field.clone()),
            Self::AgeAtLeast { years } => CompiledCriterion::AgeAtLeast(*years),
            Self::All { criteria } => CompiledCriterion::All(compile_all(criteria)?),
            Self::Any { criteria } => CompiledCriterion::Any(compile_all(criteria)?),
            Self::Not { criterion } => CompiledCriterion::Not(Box::new(criterion.compile()?)),
        })
    }
}

fn compile_all(criteria: &[Criterion]) -> Result<Vec<CompiledCriterion>, regex::Error> {
    criteria.iter().map(Criterion::compile).collect()
}

/// A criterion ready to be tested
#[derive(Debug, Clone)]
pub enum CompiledCriterion {
    Constant(bool),
    FieldPresent(String),
    FieldEquals(String, String),
    FieldMatches(String, Regex),
    FieldInPeriod(String),
    AgeAtLeast(u32),
    All(Vec<CompiledCriterion>),
    Any(Vec<CompiledCriterion>),
    Not(Box<CompiledCriterion>),
}

impl CompiledCriterion {
    fn field<'a>(object: Option<&'a CandidateObject>, name: &str) -> Option<&'a FieldValue> {
        object.and_then(|o| o.get(name)).filter(|v| match v {
            FieldValue::Null => false,
            FieldValue::Text(s) => !s.trim().is_empty(),
            _ => true,
        })
    }

    fn evaluate(
        &self,
        subject: &Subject,
        object: Option<&CandidateObject>,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> bool {
        match self {
            Self::Constant(value) => *value,
            Self::FieldPresent(name) => Self::field(object, name).is_some(),
            Self::FieldEquals(name, expected) => {
                Self::field(object, name).is_some_and(|v| v.to_string() == *expected)
            }
            Self::FieldMatches(name, regex) => {
                Self::field(object, name).is_some_and(|v| regex.is_match(&v.to_string()))
            }
            Self::FieldInPeriod(name) => Self::field(object, name)
                .and_then(FieldValue::as_datetime)
                .is_some_and(|at| begin <= at && at <= end),
            Self::AgeAtLeast(years) => subject
                .age_on(end.date())
                .is_some_and(|age| age >= *years),
            Self::All(criteria) => criteria
                .iter()
                .all(|c| c.evaluate(subject, object, begin, end)),
            Self::Any(criteria) => criteria
                .iter()
                .any(|c| c.evaluate(subject, object, begin, end)),
            Self::Not(criterion) => !criterion.evaluate(subject, object, begin, end),
        }
    }
}

impl AmcFilter for CompiledCriterion {
    fn test(
        &self,
        subject: &Subject,
        object: Option<&CandidateObject>,
        begin: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AmcResult<bool> {
        Ok(self.evaluate(subject, object, begin, end))
    }
}

/// Rule definition read from [`Rule::raw_definition`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDefinition {
    /// Object type name; absent or blank means `patients`
    #[serde(default)]
    pub object_to_count: Option<String>,
    pub denominator: Criterion,
    pub numerator: Criterion,
}

/// Report whose filters come from a [`ReportDefinition`]
#[derive(Debug, Clone)]
pub struct CriteriaReport {
    object_to_count: ObjectTypeTag,
    denominator: Arc<CompiledCriterion>,
    numerator: Arc<CompiledCriterion>,
}

impl CriteriaReport {
    pub fn from_definition(rule_id: &str, definition: &ReportDefinition) -> AmcResult<Self> {
        let object_to_count = ObjectTypeTag::resolve(definition.object_to_count.as_deref())?;
        let compile = |criterion: &Criterion| {
            criterion
                .compile()
                .map_err(|e| AmcError::invalid_definition(rule_id, e))
        };

        Ok(Self {
            object_to_count,
            denominator: Arc::new(compile(&definition.denominator)?),
            numerator: Arc::new(compile(&definition.numerator)?),
        })
    }

    /// Build the report from a rule's raw definition
    pub fn from_rule(rule: &Rule) -> AmcResult<Self> {
        let definition: ReportDefinition = serde_json::from_value(rule.raw_definition.clone())
            .map_err(|e| AmcError::invalid_definition(rule.id(), e))?;
        Self::from_definition(rule.id(), &definition)
    }

    /// Factory suitable for [`ReportRegistry::register`](crate::ReportRegistry::register)
    pub fn factory(rule: &Rule) -> AmcResult<Arc<dyn AmcReport>> {
        Ok(Arc::new(Self::from_rule(rule)?))
    }
}

impl AmcReport for CriteriaReport {
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
