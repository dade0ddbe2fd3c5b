//! Evaluation results

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;

/// Share of the denominator that passed the numerator, in whole percent
///
/// Never fails: a denominator that is empty once exclusions are removed
/// yields `0%`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Percentage(Decimal);

impl Percentage {
    pub const ZERO: Percentage = Percentage(Decimal::ZERO);

    /// `pass_target / (pass_filter - exclude_filter) * 100`, rounded half away from zero
    pub fn calculate(pass_filter: u64, exclude_filter: u64, pass_target: u64) -> Self {
        let effective = pass_filter.saturating_sub(exclude_filter);
        if pass_filter == 0 || effective == 0 {
            return Self::ZERO;
        }

        let ratio = Decimal::from(pass_target) * Decimal::ONE_HUNDRED / Decimal::from(effective);
        Self(ratio.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Totals of one rule evaluation
///
/// Created exactly once per evaluation and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultAggregate {
    rule_id: String,
    total_population: usize,
    denominator: u64,
    exclusions: u64,
    numerator: u64,
    percentage: Percentage,
}

impl ResultAggregate {
    pub fn new(
        rule_id: impl Into<String>,
        total_population: usize,
        denominator: u64,
        exclusions: u64,
        numerator: u64,
        percentage: Percentage,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            total_population,
            denominator,
            exclusions,
            numerator,
            percentage,
        }
    }

    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    pub fn total_population(&self) -> usize {
        self.total_population
    }

    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    /// Exclusion count; always 0 until exclusion filters are supported
    pub fn exclusions(&self) -> u64 {
        self.exclusions
    }

    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    pub fn percentage(&self) -> Percentage {
        self.percentage
    }
}

impl fmt::Display for ResultAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} of {} ({})",
            self.rule_id, self.numerator, self.denominator, self.total_population, self.percentage
        )
    }
}
