//! Report registry
//!
//! Maps rule ids to the factories building their reports.

use crate::report::AmcReport;
use octofhir_amc_diagnostics::{AmcError, AmcResult};
use octofhir_amc_types::Rule;
use std::collections::HashMap;
use std::sync::Arc;

/// Type alias for report factories
pub type ReportFactory = Arc<dyn Fn(&Rule) -> AmcResult<Arc<dyn AmcReport>> + Send + Sync>;

/// Registry of report factories keyed by rule id
#[derive(Default, Clone)]
pub struct ReportRegistry {
    factories: HashMap<String, ReportFactory>,
}

impl ReportRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a rule id, replacing any previous one
    pub fn register<F>(&mut self, rule_id: impl Into<String>, factory: F)
    where
        F: Fn(&Rule) -> AmcResult<Arc<dyn AmcReport>> + Send + Sync + 'static,
    {
        self.factories.insert(rule_id.into(), Arc::new(factory));
    }

    /// Register a ready-made report shared by every evaluation of the rule
    pub fn register_report(&mut self, rule_id: impl Into<String>, report: Arc<dyn AmcReport>) {
        self.register(rule_id, move |_| Ok(Arc::clone(&report)));
    }

    /// Build the report for a rule
    pub fn create(&self, rule: &Rule) -> AmcResult<Arc<dyn AmcReport>> {
        let factory = self
            .factories
            .get(rule.id())
            .ok_or_else(|| AmcError::unknown_rule(rule.id()))?;
        factory(rule)
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.factories.contains_key(rule_id)
    }

    /// Registered rule ids, sorted
    pub fn rule_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for ReportRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportRegistry")
            .field("rules", &self.rule_ids())
            .finish()
    }
}
