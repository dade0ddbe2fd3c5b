//! Measure evaluator
//!
//! Runs one rule over one population and period:
//!
//! 1. For each subject, resolve the effective period start (the period's own
//!    start, or the subject's birth date when the period has none).
//! 2. When subjects are counted, test the denominator on the subject; a
//!    subject that passes is counted, tested against the numerator and
//!    itemized.
//! 3. When objects are counted, collect the subject's objects of the counted
//!    type, test the denominator on each, then test the numerator only on the
//!    objects that passed and itemize each of them.
//! 4. For `labs`, add the manually entered lab count to the denominator.
//!
//! A run either produces one [`ResultAggregate`] or fails as a whole.

use crate::filter::{Denominator, Numerator};
use crate::report::AmcReport;
use crate::tracker::{ItemTracker, select_tracker};
use chrono::NaiveDateTime;
use octofhir_amc_diagnostics::{AMC0300, AmcError, AmcResult, ErrorBuilder};
use octofhir_amc_model::{ObjectCollector, Population};
use octofhir_amc_types::{
    ItemOutcome, ItemizationContext, MeasurementPeriod, ObjectTypeTag, Percentage, ResultAggregate,
    Rule, Subject, TrackedItem,
};
use std::sync::Arc;

/// Per-run options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Labs entered outside the system, added to the denominator of
    /// `labs` rules
    pub manual_lab_count: u64,
    pub itemization: ItemizationContext,
}

impl EvaluationOptions {
    pub fn with_manual_lab_count(mut self, count: u64) -> Self {
        self.manual_lab_count = count;
        self
    }

    pub fn with_itemization(mut self, itemization: ItemizationContext) -> Self {
        self.itemization = itemization;
        self
    }
}

/// Evaluates one rule and keeps the results it produced
pub struct MeasureEvaluator {
    rule: Rule,
    report: Arc<dyn AmcReport>,
    population: Population,
    period: MeasurementPeriod,
    options: EvaluationOptions,
    collector: Option<Arc<dyn ObjectCollector>>,
    tracker: Arc<dyn ItemTracker>,
    results: Vec<ResultAggregate>,
}

struct Counts {
    denominator: u64,
    numerator: u64,
    outcomes: Vec<ItemOutcome>,
}

impl MeasureEvaluator {
    pub fn builder(rule: Rule, report: Arc<dyn AmcReport>) -> MeasureEvaluatorBuilder {
        MeasureEvaluatorBuilder::new(rule, report)
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    /// Results emitted so far, one per successful [`execute`](Self::execute)
    pub fn results(&self) -> &[ResultAggregate] {
        &self.results
    }

    /// Itemized entries held by the run's tracker
    pub fn items(&self) -> Vec<TrackedItem> {
        self.tracker.items()
    }

    /// Run the evaluation
    ///
    /// On success the new aggregate is appended to [`results`](Self::results)
    /// and every buffered outcome is handed to the tracker. On failure
    /// nothing is appended and nothing is tracked.
    pub fn execute(&mut self) -> AmcResult<ResultAggregate> {
        log::debug!("executing rule '{}'", self.rule.id());

        let object_to_count = self.report.object_to_count();
        if !object_to_count.is_patients() && self.collector.is_none() {
            return Err(AmcError::invalid_configuration(format!(
                "Rule '{}' counts '{}' but no object collector is configured",
                self.rule.id(),
                object_to_count
            )));
        }

        let total_population = self.population.len();
        log::debug!(
            "rule '{}': total_population={}, object_to_count={}",
            self.rule.id(),
            total_population,
            object_to_count
        );

        let numerator = self.report.create_numerator();
        let denominator = self.report.create_denominator();
        let mut counts = Counts {
            denominator: 0,
            numerator: 0,
            outcomes: Vec::new(),
        };
        for subject in &self.population {
            self.evaluate_subject(subject, object_to_count, (&numerator, &denominator), &mut counts)
                .map_err(|e| e.with_subject(subject.id().as_str()))?;
            log::debug!(
                "rule '{}': subject {} processed, numerator={}, denominator={}",
                self.rule.id(),
                subject.id(),
                counts.numerator,
                counts.denominator
            );
        }

        if object_to_count == ObjectTypeTag::Labs {
            counts.denominator = counts
                .denominator
                .checked_add(self.options.manual_lab_count)
                .ok_or_else(|| {
                    ErrorBuilder::new(
                        AMC0300,
                        format!(
                            "Denominator {} overflows after adding {} manual labs",
                            counts.denominator, self.options.manual_lab_count
                        ),
                    )
                    .context(format!("rule '{}'", self.rule.id()))
                    .computation()
                })?;
            log::debug!(
                "rule '{}': {} manual labs added, numerator={}, denominator={}",
                self.rule.id(),
                self.options.manual_lab_count,
                counts.numerator,
                counts.denominator
            );
        }

        self.tracker.add_items(&self.options.itemization, counts.outcomes)?;

        let percentage = Percentage::calculate(counts.denominator, 0, counts.numerator);
        let result = ResultAggregate::new(
            self.rule.id(),
            total_population,
            counts.denominator,
            0,
            counts.numerator,
            percentage,
        );
        log::debug!("rule '{}' finished: {}", self.rule.id(), result);

        self.results.push(result.clone());
        Ok(result)
    }

    fn evaluate_subject(
        &self,
        subject: &Subject,
        object_to_count: ObjectTypeTag,
        (numerator, denominator): (&Numerator, &Denominator),
        counts: &mut Counts,
    ) -> AmcResult<()> {
        let begin = self.period.start_for(subject)?;
        let end = self.period.end();

        if object_to_count.is_patients() {
            if !denominator.test(subject, None, begin, end)? {
                return Ok(());
            }
            counts.denominator += 1;

            let pass = numerator.test(subject, None, begin, end)?;
            if pass {
                counts.numerator += 1;
            }
            counts.outcomes.push(self.outcome(subject, object_to_count, begin, end, pass));
            return Ok(());
        }

        let Some(collector) = &self.collector else {
            return Err(AmcError::no_collection_query(object_to_count));
        };
        let objects = collector.collect(subject, object_to_count, begin, end)?;

        let mut passed = Vec::with_capacity(objects.len());
        for object in objects {
            if denominator.test(subject, Some(&object), begin, end)? {
                counts.denominator += 1;
                passed.push(object);
            }
        }

        for object in &passed {
            let pass = numerator.test(subject, Some(object), begin, end)?;
            if pass {
                counts.numerator += 1;
            }
            counts.outcomes.push(self.outcome(subject, object_to_count, begin, end, pass));
        }

        Ok(())
    }

    fn outcome(
        &self,
        subject: &Subject,
        object_type: ObjectTypeTag,
        begin: NaiveDateTime,
        end: NaiveDateTime,
        pass: bool,
    ) -> ItemOutcome {
        ItemOutcome {
            rule_id: self.rule.id.clone(),
            period_start: begin,
            period_end: end,
            pass,
            subject_id: subject.id().clone(),
            object_type,
        }
    }
}

impl std::fmt::Debug for MeasureEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasureEvaluator")
            .field("rule", &self.rule.id)
            .field("population", &self.population.len())
            .field("period", &self.period)
            .field("options", &self.options)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}

/// Builder for [`MeasureEvaluator`]
pub struct MeasureEvaluatorBuilder {
    rule: Rule,
    report: Arc<dyn AmcReport>,
    population: Population,
    period: Option<MeasurementPeriod>,
    options: EvaluationOptions,
    collector: Option<Arc<dyn ObjectCollector>>,
    tracker: Option<Arc<dyn ItemTracker>>,
}

impl MeasureEvaluatorBuilder {
    pub fn new(rule: Rule, report: Arc<dyn AmcReport>) -> Self {
        Self {
            rule,
            report,
            population: Population::default(),
            period: None,
            options: EvaluationOptions::default(),
            collector: None,
            tracker: None,
        }
    }

    pub fn population(mut self, population: Population) -> Self {
        self.population = population;
        self
    }

    pub fn period(mut self, period: MeasurementPeriod) -> Self {
        self.period = Some(period);
        self
    }

    pub fn options(mut self, options: EvaluationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn collector(mut self, collector: Arc<dyn ObjectCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Tracker used when the run itemizes
    pub fn tracker(mut self, tracker: Arc<dyn ItemTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn build(self) -> AmcResult<MeasureEvaluator> {
        let period = self.period.ok_or_else(|| {
            AmcError::invalid_period(format!(
                "No measurement period given for rule '{}'",
                self.rule.id()
            ))
        })?;
        let tracker = select_tracker(&self.options.itemization, self.tracker);

        Ok(MeasureEvaluator {
            rule: self.rule,
            report: self.report,
            population: self.population,
            period,
            options: self.options,
            collector: self.collector,
            tracker,
            results: Vec::new(),
        })
    }
}
