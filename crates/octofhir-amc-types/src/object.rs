//! Object types and candidate objects
//!
//! A rule either counts subjects directly or counts objects attached to
//! them (lab results, encounters, prescriptions, ...). Attached objects are
//! opaque ordered records fetched from the data store.

use crate::period::{format_timestamp, parse_timestamp};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use octofhir_amc_diagnostics::AmcError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kind of object a rule counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectTypeTag {
    #[default]
    #[serde(rename = "patients")]
    Patients,
    #[serde(rename = "transitions-in")]
    TransitionsIn,
    #[serde(rename = "transitions-out")]
    TransitionsOut,
    #[serde(rename = "encounters")]
    Encounters,
    #[serde(rename = "encounters_office_visit")]
    EncountersOfficeVisit,
    #[serde(rename = "cpoe_medications")]
    CpoeMedications,
    #[serde(rename = "prescriptions")]
    Prescriptions,
    #[serde(rename = "labs")]
    Labs,
    #[serde(rename = "image_orders")]
    ImageOrders,
    #[serde(rename = "lab_radiology")]
    LabRadiology,
    #[serde(rename = "cpoe_lab_orders")]
    CpoeLabOrders,
    #[serde(rename = "med_orders")]
    MedOrders,
    #[serde(rename = "lab_orders")]
    LabOrders,
}

impl ObjectTypeTag {
    /// Every tag, in declaration order
    pub const ALL: [ObjectTypeTag; 13] = [
        Self::Patients,
        Self::TransitionsIn,
        Self::TransitionsOut,
        Self::Encounters,
        Self::EncountersOfficeVisit,
        Self::CpoeMedications,
        Self::Prescriptions,
        Self::Labs,
        Self::ImageOrders,
        Self::LabRadiology,
        Self::CpoeLabOrders,
        Self::MedOrders,
        Self::LabOrders,
    ];

    /// Wire name of the tag
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Patients => "patients",
            Self::TransitionsIn => "transitions-in",
            Self::TransitionsOut => "transitions-out",
            Self::Encounters => "encounters",
            Self::EncountersOfficeVisit => "encounters_office_visit",
            Self::CpoeMedications => "cpoe_medications",
            Self::Prescriptions => "prescriptions",
            Self::Labs => "labs",
            Self::ImageOrders => "image_orders",
            Self::LabRadiology => "lab_radiology",
            Self::CpoeLabOrders => "cpoe_lab_orders",
            Self::MedOrders => "med_orders",
            Self::LabOrders => "lab_orders",
        }
    }

    /// True when subjects themselves are counted
    pub const fn is_patients(&self) -> bool {
        matches!(self, Self::Patients)
    }

    /// Resolve an optional name, defaulting to `patients` when absent or blank
    pub fn resolve(name: Option<&str>) -> Result<Self, AmcError> {
        match name {
            None => Ok(Self::Patients),
            Some(name) => name.parse(),
        }
    }
}

impl fmt::Display for ObjectTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectTypeTag {
    type Err = AmcError;

    /// Blank input resolves to `patients`; anything unrecognized is a
    /// configuration error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            return Ok(Self::Patients);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == name)
            .ok_or_else(|| AmcError::unknown_object_type(name))
    }
}

/// A single field value of a store record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum FieldValue {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    DateTime(NaiveDateTime),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Timestamp value; text in a store date layout is parsed on the fly
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            Self::Text(s) => parse_timestamp(s.trim(), false),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Text(s) => write!(f, "{}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::DateTime(dt) => write!(f, "{}", format_timestamp(*dt)),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Integer(i64::from(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Decimal::from_str(&n.to_string())
                    .map(Self::Decimal)
                    .unwrap_or_else(|_| Self::Text(n.to_string())),
            },
            Value::String(s) => Self::Text(s),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => Value::Null,
            FieldValue::Text(s) => Value::String(s),
            FieldValue::Integer(i) => Value::from(i),
            FieldValue::Decimal(d) => Value::String(d.to_string()),
            FieldValue::DateTime(dt) => Value::String(format_timestamp(dt)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

/// An object fetched for a subject, tested by the rule's filters
///
/// Field order follows the store's column order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateObject {
    fields: IndexMap<String, FieldValue>,
}

impl CandidateObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an object from (name, value) pairs
    pub fn from_fields(
        fields: impl IntoIterator<Item = (impl Into<String>, impl Into<FieldValue>)>,
    ) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Set a field, replacing any previous value under the same name
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_integer)
    }

    pub fn datetime(&self, name: &str) -> Option<NaiveDateTime> {
        self.get(name).and_then(FieldValue::as_datetime)
    }

    /// The record's `id` field rendered as text
    pub fn id(&self) -> Option<String> {
        self.get("id").filter(|v| !v.is_null()).map(|v| v.to_string())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<IndexMap<String, FieldValue>> for CandidateObject {
    fn from(fields: IndexMap<String, FieldValue>) -> Self {
        Self { fields }
    }
}

impl fmt::Display for CandidateObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}
