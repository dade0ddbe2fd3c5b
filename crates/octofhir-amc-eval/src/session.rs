//! Reporting sessions
//!
//! A session evaluates a batch of rules against one population and period.
//! Each itemized rule evaluation is filed under its own run id, drawn from
//! the session's [`ItemizationSession`].

use crate::engine::{EvaluationOptions, MeasureEvaluator};
use crate::registry::ReportRegistry;
use crate::tracker::ItemTracker;
use octofhir_amc_diagnostics::AmcResult;
use octofhir_amc_model::{ObjectCollector, Population};
use octofhir_amc_types::{
    ItemizationSession, MeasurementPeriod, ResultAggregate, Rule, TrackedItem,
};
use std::sync::Arc;

/// Outcome of one rule evaluation within a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRun {
    pub result: ResultAggregate,
    pub items: Vec<TrackedItem>,
}

pub struct ReportSession {
    registry: Arc<ReportRegistry>,
    collector: Option<Arc<dyn ObjectCollector>>,
    tracker: Option<Arc<dyn ItemTracker>>,
    itemization: ItemizationSession,
    itemize: bool,
    manual_lab_count: u64,
}

impl ReportSession {
    pub fn new(registry: Arc<ReportRegistry>) -> Self {
        Self {
            registry,
            collector: None,
            tracker: None,
            itemization: ItemizationSession::new(),
            itemize: false,
            manual_lab_count: 0,
        }
    }

    pub fn with_collector(mut self, collector: Arc<dyn ObjectCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Itemize every rule evaluation of the session
    pub fn itemized(mut self, itemize: bool) -> Self {
        self.itemize = itemize;
        self
    }

    /// Shared tracker for itemized runs; each run records into a fresh
    /// in-memory tracker otherwise
    pub fn with_tracker(mut self, tracker: Arc<dyn ItemTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Continue run ids after an earlier session
    pub fn with_itemization(mut self, itemization: ItemizationSession) -> Self {
        self.itemization = itemization;
        self
    }

    pub fn with_manual_lab_count(mut self, count: u64) -> Self {
        self.manual_lab_count = count;
        self
    }

    /// Last run id handed out
    pub fn last_run_id(&self) -> u32 {
        self.itemization.current()
    }

    /// Build the evaluator for one rule, drawing its itemization context
    ///
    /// Evaluators are independent and may be executed on other threads.
    pub fn prepare(
        &self,
        rule: &Rule,
        population: Population,
        period: MeasurementPeriod,
    ) -> AmcResult<MeasureEvaluator> {
        let report = self.registry.create(rule)?;
        let options = EvaluationOptions::default()
            .with_manual_lab_count(self.manual_lab_count)
            .with_itemization(self.itemization.next_context(self.itemize));

        let mut builder = MeasureEvaluator::builder(rule.clone(), report)
            .population(population)
            .period(period)
            .options(options);
        if let Some(collector) = &self.collector {
            builder = builder.collector(Arc::clone(collector));
        }
        if let Some(tracker) = &self.tracker {
            builder = builder.tracker(Arc::clone(tracker));
        }
        builder.build()
    }

    /// Evaluate the rules in order, stopping at the first failure
    pub fn run(
        &self,
        rules: &[Rule],
        population: &Population,
        period: MeasurementPeriod,
    ) -> AmcResult<Vec<RuleRun>> {
        log::debug!(
            "session: evaluating {} rules over {} subjects",
            rules.len(),
            population.len()
        );

        rules
            .iter()
            .map(|rule| {
                let mut evaluator = self.prepare(rule, population.clone(), period)?;
                let result = evaluator.execute()?;
                Ok(RuleRun {
                    items: own_items(&evaluator, self.tracker.is_some()),
                    result,
                })
            })
            .collect()
    }
}

/// Items a run recorded into its own tracker; a shared tracker is read by
/// the caller instead
fn own_items(evaluator: &MeasureEvaluator, shared_tracker: bool) -> Vec<TrackedItem> {
    if shared_tracker {
        Vec::new()
    } else {
        evaluator.items()
    }
}

impl std::fmt::Debug for ReportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportSession")
            .field("registry", &self.registry)
            .field("itemize", &self.itemize)
            .field("manual_lab_count", &self.manual_lab_count)
            .field("last_run_id", &self.last_run_id())
            .finish_non_exhaustive()
    }
}
