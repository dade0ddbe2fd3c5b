//! Run configuration files
//!
//! A run configuration describes one reporting session:
//!
//! ```json
//! {
//!   "period": { "start": "2020-01-01", "end": "2020-12-31" },
//!   "itemize": true,
//!   "manual_lab_count": 5,
//!   "rules": [
//!     { "id": "lab_result_amc", "definition": {
//!         "object_to_count": "labs",
//!         "denominator": { "kind": "always" },
//!         "numerator": { "kind": "field_present", "field": "result" } } }
//!   ],
//!   "subjects": [ { "id": "1", "date_of_birth": "1970-01-01" } ],
//!   "objects": [
//!     { "subject": "1", "type": "labs", "date": "2020-03-01 10:00:00",
//!       "fields": { "result": "7.1" } }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use octofhir_amc_diagnostics::{AmcError, AmcResult};
use octofhir_amc_eval::{CriteriaReport, ReportRegistry};
use octofhir_amc_model::{InMemoryObjectCollector, InMemoryPopulationSource, Population, PopulationSource};
use octofhir_amc_types::{
    CandidateObject, FieldValue, MeasurementPeriod, ObjectTypeTag, Rule, Subject, SubjectId,
    parse_timestamp,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodConfig {
    /// Blank or absent: each subject's period starts at their birth date
    #[serde(default)]
    pub start: Option<String>,
    pub end: String,
}

/// A dated object attached to a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub subject: SubjectId,
    #[serde(rename = "type")]
    pub object_type: String,
    pub date: String,
    #[serde(default)]
    pub fields: CandidateObject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub period: PeriodConfig,
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    /// Subjects to evaluate, in order; all listed subjects when absent
    #[serde(default)]
    pub population: Option<Vec<SubjectId>>,
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
    #[serde(default)]
    pub itemize: bool,
    #[serde(default)]
    pub manual_lab_count: u64,
    /// Last run id of an earlier session
    #[serde(default)]
    pub last_run_id: u32,
}

impl RunConfig {
    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read run configuration: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse run configuration: {}", path.display()))
    }

    pub fn period(&self) -> AmcResult<MeasurementPeriod> {
        MeasurementPeriod::parse(self.period.start.as_deref().unwrap_or(""), &self.period.end)
    }

    pub fn population(&self) -> AmcResult<Population> {
        let source = InMemoryPopulationSource::new(self.subjects.iter().cloned());
        match &self.population {
            Some(ids) => source.load(ids),
            None => source.load(&self.subjects.iter().map(|s| s.id.clone()).collect::<Vec<_>>()),
        }
    }

    pub fn collector(&self) -> AmcResult<InMemoryObjectCollector> {
        let mut collector = InMemoryObjectCollector::new();
        for object in &self.objects {
            let tag: ObjectTypeTag = object.object_type.parse()?;
            let date = parse_timestamp(object.date.trim(), false).ok_or_else(|| {
                AmcError::invalid_configuration(format!(
                    "Invalid date '{}' for object of subject {}",
                    object.date, object.subject
                ))
            })?;

            let mut fields = object.fields.clone();
            if fields.get("date").is_none() {
                fields.set("date", FieldValue::DateTime(date));
            }
            collector.add(object.subject.clone(), tag, date, fields)?;
        }
        Ok(collector)
    }

    /// Registry with a criteria report for every configured rule
    pub fn registry(&self) -> ReportRegistry {
        let mut registry = ReportRegistry::new();
        for rule in &self.rules {
            registry.register(rule.id(), CriteriaReport::factory);
        }
        registry
    }
}
