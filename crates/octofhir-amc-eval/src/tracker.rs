//! Itemization trackers
//!
//! A tracker receives one outcome per counted subject (or per object that
//! passed the denominator). What it does with the outcome depends on the
//! run's [`ItemizationContext`]: disabled runs record nothing.

use octofhir_amc_diagnostics::{AmcError, AmcResult};
use octofhir_amc_model::QueryExecutor;
use octofhir_amc_types::{FieldValue, ItemOutcome, ItemizationContext, TrackedItem, format_timestamp};
use parking_lot::Mutex;
use std::sync::Arc;

const INSERT_ITEM_SQL: &str = "INSERT INTO `report_itemized` \
    (`report_id`, `itemized_test_id`, `pass`, `pid`, `rule_id`, `item_details`) \
    VALUES (?, ?, ?, ?, ?, ?)";

/// Sink for per-object itemization records
pub trait ItemTracker: Send + Sync {
    fn add_item(&self, context: &ItemizationContext, outcome: ItemOutcome) -> AmcResult<()>;

    /// Record the outcomes of one run
    ///
    /// Durable trackers write the whole batch or nothing.
    fn add_items(&self, context: &ItemizationContext, outcomes: Vec<ItemOutcome>) -> AmcResult<()> {
        outcomes
            .into_iter()
            .try_for_each(|outcome| self.add_item(context, outcome))
    }

    /// Items held in memory, if the tracker keeps any
    fn items(&self) -> Vec<TrackedItem> {
        Vec::new()
    }
}

impl<T: ItemTracker + ?Sized> ItemTracker for Arc<T> {
    fn add_item(&self, context: &ItemizationContext, outcome: ItemOutcome) -> AmcResult<()> {
        (**self).add_item(context, outcome)
    }

    fn add_items(&self, context: &ItemizationContext, outcomes: Vec<ItemOutcome>) -> AmcResult<()> {
        (**self).add_items(context, outcomes)
    }

    fn items(&self) -> Vec<TrackedItem> {
        (**self).items()
    }
}

/// Tracker that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracker;

impl ItemTracker for NullTracker {
    fn add_item(&self, _context: &ItemizationContext, _outcome: ItemOutcome) -> AmcResult<()> {
        Ok(())
    }
}

/// Tracker keeping items in memory, in the order they were added
#[derive(Debug, Default)]
pub struct RecordingTracker {
    items: Mutex<Vec<TrackedItem>>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Remove and return every recorded item
    pub fn take(&self) -> Vec<TrackedItem> {
        std::mem::take(&mut *self.items.lock())
    }
}

impl ItemTracker for RecordingTracker {
    fn add_item(&self, context: &ItemizationContext, outcome: ItemOutcome) -> AmcResult<()> {
        if context.enabled {
            self.items.lock().push(TrackedItem::new(context, outcome));
        }
        Ok(())
    }

    fn add_items(&self, context: &ItemizationContext, outcomes: Vec<ItemOutcome>) -> AmcResult<()> {
        if context.enabled {
            self.items
                .lock()
                .extend(outcomes.into_iter().map(|outcome| TrackedItem::new(context, outcome)));
        }
        Ok(())
    }

    fn items(&self) -> Vec<TrackedItem> {
        self.items.lock().clone()
    }
}

/// Tracker writing items to the `report_itemized` table
pub struct SqlItemTracker<E> {
    executor: E,
    report_id: i64,
}

impl<E: QueryExecutor> SqlItemTracker<E> {
    /// Tracker filing items under the given report
    pub fn new(executor: E, report_id: i64) -> Self {
        Self {
            executor,
            report_id,
        }
    }

    pub fn insert_statement() -> &'static str {
        INSERT_ITEM_SQL
    }

    /// Parameters bound to the insert statement for one item
    pub fn item_params(&self, item: &TrackedItem) -> Vec<FieldValue> {
        let details = serde_json::json!({
            "object_type": item.object_type.as_str(),
            "period_start": format_timestamp(item.period_start),
            "period_end": format_timestamp(item.period_end),
        });

        vec![
            FieldValue::Integer(self.report_id),
            FieldValue::Integer(i64::from(item.run_iterator_id)),
            FieldValue::Integer(i64::from(item.pass_flag())),
            FieldValue::text(item.subject_id.as_str()),
            FieldValue::text(item.rule_id.as_str()),
            FieldValue::text(details.to_string()),
        ]
    }
}

impl<E: QueryExecutor> ItemTracker for SqlItemTracker<E> {
    fn add_item(&self, context: &ItemizationContext, outcome: ItemOutcome) -> AmcResult<()> {
        if !context.enabled {
            return Ok(());
        }

        let item = TrackedItem::new(context, outcome);
        self.executor
            .execute(INSERT_ITEM_SQL, &self.item_params(&item))
            .map_err(|e| {
                AmcError::itemization_failed(e.to_string()).with_subject(item.subject_id.as_str())
            })?;
        Ok(())
    }

    fn add_items(&self, context: &ItemizationContext, outcomes: Vec<ItemOutcome>) -> AmcResult<()> {
        if !context.enabled || outcomes.is_empty() {
            return Ok(());
        }

        let batch: Vec<Vec<FieldValue>> = outcomes
            .into_iter()
            .map(|outcome| self.item_params(&TrackedItem::new(context, outcome)))
            .collect();
        let written = self
            .executor
            .execute_batch(INSERT_ITEM_SQL, &batch)
            .map_err(|e| AmcError::itemization_failed(e.to_string()))?;
        log::debug!("wrote {} itemized rows for report {}", written, self.report_id);
        Ok(())
    }
}

/// Pick the tracker for a run
///
/// Disabled runs always get a [`NullTracker`]. Enabled runs use the
/// supplied tracker, or a fresh [`RecordingTracker`] when none is given.
pub fn select_tracker(
    context: &ItemizationContext,
    supplied: Option<Arc<dyn ItemTracker>>,
) -> Arc<dyn ItemTracker> {
    match (context.enabled, supplied) {
        (false, _) => Arc::new(NullTracker),
        (true, Some(tracker)) => tracker,
        (true, None) => Arc::new(RecordingTracker::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use octofhir_amc_model::MemoryExecutor;
    use octofhir_amc_types::{ObjectTypeTag, SubjectId};
    use pretty_assertions::assert_eq;

    fn outcome(pass: bool) -> ItemOutcome {
        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        ItemOutcome {
            rule_id: "send_sum_amc".to_string(),
            period_start: day.and_hms_opt(0, 0, 0).unwrap(),
            period_end: day.and_hms_opt(23, 59, 59).unwrap(),
            pass,
            subject_id: SubjectId::from("7"),
            object_type: ObjectTypeTag::TransitionsOut,
        }
    }

    #[test]
    fn test_recording_tracker_respects_context() {
        let tracker = RecordingTracker::new();
        tracker.add_item(&ItemizationContext::disabled(), outcome(true)).unwrap();
        assert!(tracker.is_empty());

        tracker.add_item(&ItemizationContext::enabled(3), outcome(true)).unwrap();
        tracker.add_item(&ItemizationContext::enabled(3), outcome(false)).unwrap();

        let items = tracker.take();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].run_iterator_id, 3);
        assert_eq!(items[1].pass_flag(), 0);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_sql_tracker_writes_rows() {
        let store = Arc::new(MemoryExecutor::new());
        let tracker = SqlItemTracker::new(Arc::clone(&store), 42);

        tracker.add_item(&ItemizationContext::disabled(), outcome(true)).unwrap();
        tracker.add_item(&ItemizationContext::enabled(2), outcome(true)).unwrap();

        let executed = store.executed();
        assert_eq!(executed.len(), 1);
        let (sql, params) = &executed[0];
        assert_eq!(sql, INSERT_ITEM_SQL);
        assert_eq!(&params[..5], &[
            FieldValue::Integer(42),
            FieldValue::Integer(2),
            FieldValue::Integer(1),
            FieldValue::text("7"),
            FieldValue::text("send_sum_amc"),
        ]);
        assert!(params[5].as_text().unwrap().contains("transitions-out"));
    }

    #[test]
    fn test_sql_tracker_failure_is_data_access() {
        let store = MemoryExecutor::new();
        let item = TrackedItem::new(&ItemizationContext::enabled(1), outcome(false));
        let tracker = SqlItemTracker::new(store, 1);
        tracker.executor.fail_on(INSERT_ITEM_SQL, tracker.item_params(&item), "disk full");

        let err = tracker
            .add_item(&ItemizationContext::enabled(1), outcome(false))
            .unwrap_err();
        assert_eq!(err.code(), octofhir_amc_diagnostics::AMC0205);
        assert_eq!(err.subject_id(), Some("7"));
    }

    #[test]
    fn test_select_tracker() {
        let supplied: Arc<dyn ItemTracker> = Arc::new(RecordingTracker::new());

        let disabled = select_tracker(&ItemizationContext::disabled(), Some(Arc::clone(&supplied)));
        disabled.add_item(&ItemizationContext::enabled(1), outcome(true)).unwrap();
        assert!(disabled.items().is_empty());

        let enabled = select_tracker(&ItemizationContext::enabled(1), Some(Arc::clone(&supplied)));
        enabled.add_item(&ItemizationContext::enabled(1), outcome(true)).unwrap();
        assert_eq!(supplied.items().len(), 1);
    }

    #[test]
    fn test_sql_tracker_batch_failure_writes_nothing() {
        let store = Arc::new(MemoryExecutor::new());
        let tracker = SqlItemTracker::new(Arc::clone(&store), 5);
        let context = ItemizationContext::enabled(4);
        let failing = TrackedItem::new(&context, outcome(false));
        store.fail_on(INSERT_ITEM_SQL, tracker.item_params(&failing), "disk full");

        let err = tracker
            .add_items(&context, vec![outcome(true), outcome(false), outcome(true)])
            .unwrap_err();
        assert_eq!(err.code(), octofhir_amc_diagnostics::AMC0205);
        assert!(store.executed().is_empty());

        tracker.add_items(&context, vec![outcome(true), outcome(true)]).unwrap();
        assert_eq!(store.executed().len(), 2);
    }

    #[test]
    fn test_recording_tracker_batch() {
        let tracker = RecordingTracker::new();
        tracker
            .add_items(&ItemizationContext::disabled(), vec![outcome(true)])
            .unwrap();
        assert!(tracker.is_empty());

        tracker
            .add_items(&ItemizationContext::enabled(6), vec![outcome(true), outcome(false)])
            .unwrap();
        assert_eq!(tracker.len(), 2);
    }
}
