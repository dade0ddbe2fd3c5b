//! Measurement periods

use crate::Subject;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use octofhir_amc_diagnostics::{AmcError, AmcResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp layout used for store parameters and itemized records
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reporting window of a measure
///
/// An empty start means "since birth": it is resolved separately for every
/// subject to that subject's date of birth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementPeriod {
    start: Option<NaiveDateTime>,
    end: NaiveDateTime,
}

impl MeasurementPeriod {
    pub fn new(start: Option<NaiveDateTime>, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Period between two calendar dates; the end date is included up to 23:59:59
    pub fn from_dates(start: Option<NaiveDate>, end: NaiveDate) -> Self {
        Self {
            start: start.map(|d| d.and_time(NaiveTime::MIN)),
            end: end_of_day(end),
        }
    }

    /// Period that starts at each subject's birth date
    pub fn since_birth(end: NaiveDateTime) -> Self {
        Self { start: None, end }
    }

    /// Parse a period from its textual bounds
    ///
    /// Both bounds accept `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`. A blank start
    /// yields a period without start; a date-only end covers the whole day.
    pub fn parse(start: &str, end: &str) -> AmcResult<Self> {
        let start = match start.trim() {
            "" => None,
            text => Some(parse_timestamp(text, false).ok_or_else(|| {
                AmcError::invalid_period(format!("Invalid period start '{}'", text))
            })?),
        };
        let end = parse_timestamp(end.trim(), true)
            .ok_or_else(|| AmcError::invalid_period(format!("Invalid period end '{}'", end)))?;

        Ok(Self { start, end })
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn has_start(&self) -> bool {
        self.start.is_some()
    }

    /// Effective start for one subject
    ///
    /// Fails with a data access error when the period has no start and the
    /// subject has no recorded birth date.
    pub fn start_for(&self, subject: &Subject) -> AmcResult<NaiveDateTime> {
        match self.start {
            Some(start) => Ok(start),
            None => subject
                .date_of_birth()
                .map(|dob| dob.and_time(NaiveTime::MIN))
                .ok_or_else(|| AmcError::missing_birth_date(subject.id().as_str())),
        }
    }
}

impl fmt::Display for MeasurementPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start {
            Some(start) => write!(f, "[{}, {}]", format_timestamp(start), format_timestamp(self.end)),
            None => write!(f, "[birth, {}]", format_timestamp(self.end)),
        }
    }
}

/// Render a timestamp the way the store and itemized records expect it
pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a date or date-time; date-only input is placed at midnight or, when
/// `end_of_day` is set, at 23:59:59
pub fn parse_timestamp(text: &str, end_of_day_for_dates: bool) -> Option<NaiveDateTime> {
    if let Ok(value) = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT) {
        return Some(value);
    }
    if let Ok(value) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Some(value);
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok().map(|date| {
        if end_of_day_for_dates {
            end_of_day(date)
        } else {
            date.and_time(NaiveTime::MIN)
        }
    })
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(23, 59, 59).unwrap_or(date.and_time(NaiveTime::MIN))
}
