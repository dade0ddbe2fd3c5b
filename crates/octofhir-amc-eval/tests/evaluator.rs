//! Measure Evaluation Tests
//!
//! End-to-end tests of the two-pass counting loop:
//! - Counting subjects directly
//! - Counting attached objects (denominator survivors only)
//! - Effective period start from the date of birth
//! - Manual lab adjustment
//! - Itemization and run ids
//! - Failure atomicity

use chrono::{NaiveDate, NaiveDateTime};
use octofhir_amc_diagnostics::{AMC0201, AMC0203, AMC0205, AMC0300, AmcError};
use octofhir_amc_eval::{
    AmcReport, EvaluationOptions, FilterReport, MeasureEvaluator, RecordingTracker, SqlItemTracker,
    filter_fn,
};
use octofhir_amc_model::{InMemoryObjectCollector, MemoryExecutor, ObjectCollector, Population, SqlObjectCollector};
use octofhir_amc_types::{
    CandidateObject, FieldValue, ItemOutcome, ItemizationContext, MeasurementPeriod, ObjectTypeTag,
    Rule, Subject, SubjectId, TrackedItem,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    ymd(y, m, d).and_hms_opt(12, 0, 0).unwrap()
}

fn year_2020() -> MeasurementPeriod {
    MeasurementPeriod::from_dates(Some(ymd(2020, 1, 1)), ymd(2020, 12, 31))
}

fn population(n: usize) -> Population {
    (1..=n)
        .map(|i| Subject::new(i.to_string(), ymd(1980, 1, 1)))
        .collect()
}

fn always() -> impl octofhir_amc_eval::AmcFilter {
    filter_fn(|_, _, _, _| Ok(true))
}

fn never() -> impl octofhir_amc_eval::AmcFilter {
    filter_fn(|_, _, _, _| Ok(false))
}

/// Passes when the object's `flag` field is "y"
fn flagged() -> impl octofhir_amc_eval::AmcFilter {
    filter_fn(|_, object: Option<&CandidateObject>, _, _| {
        Ok(object.and_then(|o| o.text("flag")) == Some("y"))
    })
}

fn evaluator(
    report: impl AmcReport + 'static,
    population: Population,
    period: MeasurementPeriod,
    options: EvaluationOptions,
    collector: Option<Arc<dyn ObjectCollector>>,
) -> MeasureEvaluator {
    let mut builder = MeasureEvaluator::builder(Rule::new("test_amc"), Arc::new(report))
        .population(population)
        .period(period)
        .options(options);
    if let Some(collector) = collector {
        builder = builder.collector(collector);
    }
    builder.build().unwrap()
}

fn object(flag: &str) -> CandidateObject {
    CandidateObject::from_fields([("flag", flag)])
}

// ============================================================================
// Counting subjects
// ============================================================================

#[test]
fn test_one_result_per_execution() {
    let mut evaluator = evaluator(
        FilterReport::patients(always(), always()),
        population(3),
        year_2020(),
        EvaluationOptions::default(),
        None,
    );

    evaluator.execute().unwrap();
    assert_eq!(evaluator.results().len(), 1);
    evaluator.execute().unwrap();
    assert_eq!(evaluator.results().len(), 2);
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(17)]
fn test_total_population_is_subject_count(#[case] n: usize) {
    let mut evaluator = evaluator(
        FilterReport::patients(never(), never()),
        population(n),
        year_2020(),
        EvaluationOptions::default(),
        None,
    );

    let result = evaluator.execute().unwrap();
    assert_eq!(result.total_population(), n);
    assert_eq!(result.denominator(), 0);
}

#[test]
fn test_items_only_for_denominator_subjects() {
    let even = filter_fn(|subject: &Subject, _, _, _| {
        Ok(subject.id().as_str().parse::<u32>().unwrap() % 2 == 0)
    });
    let first_four = filter_fn(|subject: &Subject, _, _, _| {
        Ok(subject.id().as_str().parse::<u32>().unwrap() <= 4)
    });
    let mut evaluator = evaluator(
        FilterReport::patients(even, first_four),
        population(6),
        year_2020(),
        EvaluationOptions::default().with_itemization(ItemizationContext::enabled(1)),
        None,
    );

    let result = evaluator.execute().unwrap();
    assert_eq!(result.denominator(), 3);
    assert_eq!(result.numerator(), 2);
    assert_eq!(result.percentage().to_string(), "67%");

    let items = evaluator.items();
    assert_eq!(
        items.iter().map(|i| (i.subject_id.as_str().to_string(), i.pass)).collect::<Vec<_>>(),
        vec![
            ("2".to_string(), true),
            ("4".to_string(), true),
            ("6".to_string(), false),
        ]
    );
    assert!(items.iter().all(|i| i.object_type == ObjectTypeTag::Patients));
}

#[test]
fn test_period_start_defaults_to_birth_date() {
    let mut evaluator = evaluator(
        FilterReport::patients(always(), always()),
        Population::new(vec![Subject::new("P", ymd(2000, 1, 1))]),
        MeasurementPeriod::parse("", "2020-01-01").unwrap(),
        EvaluationOptions::default().with_itemization(ItemizationContext::enabled(1)),
        None,
    );

    let result = evaluator.execute().unwrap();
    assert_eq!(result.total_population(), 1);
    assert_eq!(result.denominator(), 1);
    assert_eq!(result.numerator(), 1);
    assert_eq!(result.percentage().to_string(), "100%");

    let items = evaluator.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].period_start, ymd(2000, 1, 1).and_hms_opt(0, 0, 0).unwrap());
    assert_eq!(items[0].period_end, ymd(2020, 1, 1).and_hms_opt(23, 59, 59).unwrap());
}

#[test]
fn test_missing_birth_date_without_period_start() {
    let mut evaluator = evaluator(
        FilterReport::patients(always(), always()),
        Population::new(vec![Subject::new("1", ymd(1990, 1, 1)), Subject::without_birth_date("2")]),
        MeasurementPeriod::from_dates(None, ymd(2020, 12, 31)),
        EvaluationOptions::default(),
        None,
    );

    let err = evaluator.execute().unwrap_err();
    assert_eq!(err.code(), AMC0203);
    assert_eq!(err.subject_id(), Some("2"));
    assert!(evaluator.results().is_empty());
}

#[test]
fn test_zero_denominator_is_zero_percent() {
    let mut evaluator = evaluator(
        FilterReport::patients(never(), always()),
        population(4),
        year_2020(),
        EvaluationOptions::default(),
        None,
    );

    let result = evaluator.execute().unwrap();
    assert_eq!(result.numerator(), 0);
    assert_eq!(result.percentage().to_string(), "0%");
}

#[test]
fn test_execution_is_idempotent() {
    let mut evaluator = evaluator(
        FilterReport::patients(all_but_third(), always()),
        population(5),
        year_2020(),
        EvaluationOptions::default(),
        None,
    );

    let first = evaluator.execute().unwrap();
    let second = evaluator.execute().unwrap();
    assert_eq!(first, second);
    assert_eq!(evaluator.results(), &[first, second]);
}

fn all_but_third() -> impl octofhir_amc_eval::AmcFilter {
    filter_fn(|subject: &Subject, _, _, _| Ok(subject.id().as_str() != "3"))
}

// ============================================================================
// Counting objects
// ============================================================================

#[test]
fn test_objects_outside_period_are_not_collected() {
    let collector = InMemoryObjectCollector::new()
        .with("P", ObjectTypeTag::Encounters, at(2020, 6, 1), object("y"))
        .and_then(|c| c.with("P", ObjectTypeTag::Encounters, at(2019, 6, 1), object("y")))
        .unwrap();
    let mut evaluator = evaluator(
        FilterReport::new(ObjectTypeTag::Encounters, always(), always()),
        Population::new(vec![Subject::new("P", ymd(1970, 1, 1))]),
        year_2020(),
        EvaluationOptions::default().with_itemization(ItemizationContext::enabled(4)),
        Some(Arc::new(collector)),
    );

    let result = evaluator.execute().unwrap();
    assert_eq!(result.denominator(), 1);
    assert_eq!(result.numerator(), 1);

    let items = evaluator.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].run_iterator_id, 4);
    assert_eq!(items[0].object_type, ObjectTypeTag::Encounters);
}

#[test]
fn test_encounters_of_two_subjects() {
    let collector = InMemoryObjectCollector::new()
        .with("P1", ObjectTypeTag::Encounters, at(2020, 2, 1), object("y"))
        .and_then(|c| c.with("P1", ObjectTypeTag::Encounters, at(2020, 8, 1), object("n")))
        .unwrap();
    let mut evaluator = evaluator(
        FilterReport::new(ObjectTypeTag::Encounters, flagged(), always()),
        Population::new(vec![
            Subject::new("P1", ymd(1980, 1, 1)),
            Subject::new("P2", ymd(1985, 1, 1)),
        ]),
        year_2020(),
        EvaluationOptions::default().with_itemization(ItemizationContext::enabled(1)),
        Some(Arc::new(collector)),
    );

    let result = evaluator.execute().unwrap();
    assert_eq!(result.total_population(), 2);
    assert_eq!(result.denominator(), 1);

    let items = evaluator.items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].subject_id, SubjectId::from("P1"));
}

#[test]
fn test_items_equal_denominator_survivors() {
    let collector = InMemoryObjectCollector::new()
        .with("1", ObjectTypeTag::Prescriptions, at(2020, 2, 1), object("y"))
        .and_then(|c| c.with("1", ObjectTypeTag::Prescriptions, at(2020, 3, 1), object("n")))
        .and_then(|c| c.with("1", ObjectTypeTag::Prescriptions, at(2020, 4, 1), object("y")))
        .and_then(|c| c.with("2", ObjectTypeTag::Prescriptions, at(2020, 5, 1), object("n")))
        .unwrap();
    let mut evaluator = evaluator(
        FilterReport::new(ObjectTypeTag::Prescriptions, flagged(), always()),
        population(3),
        year_2020(),
        EvaluationOptions::default().with_itemization(ItemizationContext::enabled(1)),
        Some(Arc::new(collector)),
    );

    let result = evaluator.execute().unwrap();
    assert_eq!(result.total_population(), 3);
    assert_eq!(result.denominator(), 2);
    assert_eq!(result.numerator(), 2);
    assert_eq!(evaluator.items().len(), 2);
}

#[test]
fn test_numerator_only_sees_survivors() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&seen);
    let numerator = filter_fn(move |_, object: Option<&CandidateObject>, _, _| {
        let flag = object.and_then(|o| o.text("flag")).unwrap_or_default().to_string();
        recorded.lock().push(flag);
        Ok(false)
    });
    let collector = InMemoryObjectCollector::new()
        .with("1", ObjectTypeTag::LabOrders, at(2020, 2, 1), object("n"))
        .and_then(|c| c.with("1", ObjectTypeTag::LabOrders, at(2020, 3, 1), object("y")))
        .unwrap();
    let mut evaluator = evaluator(
        FilterReport::new(ObjectTypeTag::LabOrders, flagged(), numerator),
        population(1),
        year_2020(),
        EvaluationOptions::default().with_itemization(ItemizationContext::enabled(1)),
        Some(Arc::new(collector)),
    );

    let result = evaluator.execute().unwrap();
    assert_eq!(*seen.lock(), vec!["y".to_string()]);
    assert_eq!(result.denominator(), 1);
    assert_eq!(result.numerator(), 0);

    let items = evaluator.items();
    assert_eq!(items.len(), 1);
    assert!(!items[0].pass);
}

#[test]
fn test_subject_without_objects_counts_nothing() {
    let mut evaluator = evaluator(
        FilterReport::new(ObjectTypeTag::Encounters, always(), always()),
        population(2),
        year_2020(),
        EvaluationOptions::default().with_itemization(ItemizationContext::enabled(1)),
        Some(Arc::new(InMemoryObjectCollector::new())),
    );

    let result = evaluator.execute().unwrap();
    assert_eq!(result.denominator(), 0);
    assert_eq!(result.numerator(), 0);
    assert!(evaluator.items().is_empty());
}

#[rstest]
#[case(ObjectTypeTag::Labs, 8)]
#[case(ObjectTypeTag::LabOrders, 3)]
fn test_manual_labs_only_for_labs(#[case] tag: ObjectTypeTag, #[case] denominator: u64) {
    let mut collector = InMemoryObjectCollector::new();
    for month in 1..=3 {
        collector.add("1", tag, at(2020, month, 1), object("y")).unwrap();
    }
    let mut evaluator = evaluator(
        FilterReport::new(tag, always(), flagged()),
        population(1),
        year_2020(),
        EvaluationOptions::default().with_manual_lab_count(5),
        Some(Arc::new(collector)),
    );

    let result = evaluator.execute().unwrap();
    assert_eq!(result.denominator(), denominator);
    assert_eq!(result.numerator(), 3);
}

#[test]
fn test_manual_labs_overflow_is_computation_error() {
    let mut collector = InMemoryObjectCollector::new();
    collector.add("1", ObjectTypeTag::Labs, at(2020, 3, 1), object("y")).unwrap();
    let mut evaluator = evaluator(
        FilterReport::new(ObjectTypeTag::Labs, always(), flagged()),
        population(1),
        year_2020(),
        EvaluationOptions::default()
            .with_manual_lab_count(u64::MAX)
            .with_itemization(ItemizationContext::enabled(1)),
        Some(Arc::new(collector)),
    );

    let err = evaluator.execute().unwrap_err();
    assert!(err.is_computation());
    assert_eq!(err.code(), AMC0300);
    assert!(evaluator.results().is_empty());
    assert!(evaluator.items().is_empty());
}

// ============================================================================
// Itemization and failures
// ============================================================================

#[test]
fn test_disabled_itemization_records_nothing() {
    let tracker = Arc::new(RecordingTracker::new());
    let mut evaluator = MeasureEvaluator::builder(
        Rule::new("test_amc"),
        Arc::new(FilterReport::patients(always(), always())),
    )
    .population(population(2))
    .period(year_2020())
    .tracker(tracker.clone())
    .build()
    .unwrap();

    evaluator.execute().unwrap();
    assert!(tracker.is_empty());
    assert!(evaluator.items().is_empty());
}

#[test]
fn test_supplied_tracker_receives_items() {
    let tracker = Arc::new(RecordingTracker::new());
    let mut evaluator = MeasureEvaluator::builder(
        Rule::new("provide_rec_pat_amc"),
        Arc::new(FilterReport::patients(always(), never())),
    )
    .population(population(2))
    .period(year_2020())
    .options(EvaluationOptions::default().with_itemization(ItemizationContext::enabled(9)))
    .tracker(tracker.clone())
    .build()
    .unwrap();

    evaluator.execute().unwrap();
    let items = tracker.take();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.run_iterator_id == 9 && i.rule_id == "provide_rec_pat_amc"));
    assert!(items.iter().all(|i| !i.pass));
}

#[test]
fn test_filter_error_aborts_run() {
    let failing = filter_fn(|subject: &Subject, _, _, _| {
        if subject.id().as_str() == "2" {
            Err(AmcError::data_access_failed("lookup failed"))
        } else {
            Ok(true)
        }
    });
    let tracker = Arc::new(RecordingTracker::new());
    let mut evaluator = MeasureEvaluator::builder(
        Rule::new("test_amc"),
        Arc::new(FilterReport::patients(always(), failing)),
    )
    .population(population(3))
    .period(year_2020())
    .options(EvaluationOptions::default().with_itemization(ItemizationContext::enabled(1)))
    .tracker(tracker.clone())
    .build()
    .unwrap();

    let err = evaluator.execute().unwrap_err();
    assert_eq!(err.subject_id(), Some("2"));
    assert!(evaluator.results().is_empty());
    assert!(tracker.is_empty());
}

#[test]
fn test_store_failure_aborts_run() {
    let store = MemoryExecutor::strict();
    let collector: Arc<dyn ObjectCollector> = Arc::new(SqlObjectCollector::new(store));
    let mut evaluator = evaluator(
        FilterReport::new(ObjectTypeTag::Encounters, always(), always()),
        population(1),
        year_2020(),
        EvaluationOptions::default(),
        Some(collector),
    );

    let err = evaluator.execute().unwrap_err();
    assert_eq!(err.code(), AMC0201);
    assert_eq!(err.subject_id(), Some("1"));
    assert!(evaluator.results().is_empty());
}

#[test]
fn test_sql_collector_feeds_evaluator() {
    let store = MemoryExecutor::new();
    let begin = ymd(2020, 1, 1).and_hms_opt(0, 0, 0).unwrap();
    let end = ymd(2020, 12, 31).and_hms_opt(23, 59, 59).unwrap();
    let query = octofhir_amc_model::ObjectQuery::for_tag(
        ObjectTypeTag::Encounters,
        &SubjectId::from("1"),
        begin,
        end,
    )
    .unwrap();
    store.add_rows(
        query.sql,
        query.params,
        vec![
            [("id".to_string(), FieldValue::Integer(10))].into_iter().collect(),
            [("id".to_string(), FieldValue::Integer(11))].into_iter().collect(),
        ],
    );

    let mut evaluator = evaluator(
        FilterReport::new(ObjectTypeTag::Encounters, always(), filter_fn(|_, object: Option<&CandidateObject>, _, _| {
            Ok(object.and_then(|o| o.integer("id")) == Some(11))
        })),
        population(1),
        year_2020(),
        EvaluationOptions::default(),
        Some(Arc::new(SqlObjectCollector::new(store))),
    );

    let result = evaluator.execute().unwrap();
    assert_eq!(result.denominator(), 2);
    assert_eq!(result.numerator(), 1);
    assert_eq!(result.percentage().to_string(), "50%");
}

#[test]
fn test_tracker_write_failure_leaves_no_rows() {
    let store = Arc::new(MemoryExecutor::new());
    let tracker = SqlItemTracker::new(Arc::clone(&store), 77);
    let context = ItemizationContext::enabled(3);
    let period = year_2020();
    let second = TrackedItem::new(
        &context,
        ItemOutcome {
            rule_id: "test_amc".to_string(),
            period_start: period.start().unwrap(),
            period_end: period.end(),
            pass: true,
            subject_id: SubjectId::from("2"),
            object_type: ObjectTypeTag::Patients,
        },
    );
    store.fail_on(SqlItemTracker::<MemoryExecutor>::insert_statement(), tracker.item_params(&second), "disk full");

    let mut evaluator = MeasureEvaluator::builder(
        Rule::new("test_amc"),
        Arc::new(FilterReport::patients(always(), always())),
    )
    .population(population(3))
    .period(period)
    .options(EvaluationOptions::default().with_itemization(context))
    .tracker(Arc::new(tracker))
    .build()
    .unwrap();

    let err = evaluator.execute().unwrap_err();
    assert_eq!(err.code(), AMC0205);
    assert!(evaluator.results().is_empty());
    assert!(store.executed().is_empty());
}
