//! Itemization (per-object audit) records

use crate::{ObjectTypeTag, SubjectId, format_timestamp};
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU32, Ordering};

/// Whether a run itemizes, and under which run id its items are filed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct ItemizationContext {
    pub enabled: bool,
    pub run_iterator_id: u32,
}

impl ItemizationContext {
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            run_iterator_id: 0,
        }
    }

    pub const fn enabled(run_iterator_id: u32) -> Self {
        Self {
            enabled: true,
            run_iterator_id,
        }
    }
}

/// Run id source shared by the rule evaluations of one reporting session
///
/// Every itemized rule evaluation draws a fresh id; evaluations without
/// itemization reuse the current one and leave the counter untouched.
#[derive(Debug, Default)]
pub struct ItemizationSession {
    counter: AtomicU32,
}

impl ItemizationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session whose next itemized run gets `last + 1`
    pub fn starting_after(last: u32) -> Self {
        Self {
            counter: AtomicU32::new(last),
        }
    }

    /// Last run id handed out
    pub fn current(&self) -> u32 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Context for the next rule evaluation
    pub fn next_context(&self, itemize: bool) -> ItemizationContext {
        if itemize {
            ItemizationContext::enabled(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
        } else {
            ItemizationContext {
                enabled: false,
                run_iterator_id: self.current(),
            }
        }
    }
}

/// Outcome of testing one subject or object, as reported by the evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub rule_id: String,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub pass: bool,
    pub subject_id: SubjectId,
    pub object_type: ObjectTypeTag,
}

/// A recorded itemization entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedItem {
    pub run_iterator_id: u32,
    pub rule_id: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub period_start: NaiveDateTime,
    #[serde(serialize_with = "serialize_timestamp")]
    pub period_end: NaiveDateTime,
    pub subject_id: SubjectId,
    pub object_type: ObjectTypeTag,
    #[serde(serialize_with = "serialize_flag")]
    pub pass: bool,
}

impl TrackedItem {
    pub fn new(context: &ItemizationContext, outcome: ItemOutcome) -> Self {
        Self {
            run_iterator_id: context.run_iterator_id,
            rule_id: outcome.rule_id,
            period_start: outcome.period_start,
            period_end: outcome.period_end,
            subject_id: outcome.subject_id,
            object_type: outcome.object_type,
            pass: outcome.pass,
        }
    }

    /// Pass flag as stored: 1 or 0
    pub fn pass_flag(&self) -> u8 {
        u8::from(self.pass)
    }
}

fn serialize_timestamp<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(*value))
}

fn serialize_flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}
