//! Reporting Session Tests
//!
//! Rules defined as JSON criteria, evaluated as a batch with run ids drawn
//! from one itemization session.

use chrono::NaiveDate;
use octofhir_amc_diagnostics::AMC0103;
use octofhir_amc_eval::{CriteriaReport, ReportRegistry, ReportSession, RecordingTracker};
use octofhir_amc_model::{InMemoryObjectCollector, Population};
use octofhir_amc_types::{
    CandidateObject, FieldValue, ItemizationSession, MeasurementPeriod, ObjectTypeTag, Rule,
    Subject,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn rules() -> Vec<Rule> {
    vec![
        Rule::new("patient_portal_amc").with_definition(json!({
            "denominator": {"kind": "age_at_least", "years": 18},
            "numerator": {"kind": "always"}
        })),
        Rule::new("send_sum_amc").with_definition(json!({
            "object_to_count": "transitions-out",
            "denominator": {"kind": "field_in_period", "field": "date"},
            "numerator": {"kind": "field_equals", "field": "send_summary", "value": "1"}
        })),
    ]
}

fn registry(rules: &[Rule]) -> Arc<ReportRegistry> {
    let mut registry = ReportRegistry::new();
    for rule in rules {
        registry.register(rule.id(), CriteriaReport::factory);
    }
    Arc::new(registry)
}

fn collector() -> InMemoryObjectCollector {
    let referral = |date: &str, sent: &str| {
        CandidateObject::from_fields([
            ("date", FieldValue::text(date)),
            ("send_summary", FieldValue::text(sent)),
        ])
    };
    let when = ymd(2020, 3, 1).and_hms_opt(9, 0, 0).unwrap();

    let mut collector = InMemoryObjectCollector::new();
    collector
        .add("1", ObjectTypeTag::TransitionsOut, when, referral("2020-03-01 09:00:00", "1"))
        .unwrap();
    collector
        .add("1", ObjectTypeTag::TransitionsOut, when, referral("2020-03-01 09:00:00", "0"))
        .unwrap();
    collector
        .add("2", ObjectTypeTag::TransitionsOut, when, referral("2020-03-01 09:00:00", "1"))
        .unwrap();
    collector
}

fn population() -> Population {
    Population::new(vec![
        Subject::new("1", ymd(1970, 5, 5)),
        Subject::new("2", ymd(2010, 5, 5)),
    ])
}

fn period() -> MeasurementPeriod {
    MeasurementPeriod::from_dates(Some(ymd(2020, 1, 1)), ymd(2020, 12, 31))
}

#[test]
fn test_session_runs_rules_in_order() {
    let rules = rules();
    let session = ReportSession::new(registry(&rules)).with_collector(Arc::new(collector()));

    let runs = session.run(&rules, &population(), period()).unwrap();
    assert_eq!(runs.len(), 2);

    let portal = &runs[0].result;
    assert_eq!(portal.rule_id(), "patient_portal_amc");
    assert_eq!((portal.denominator(), portal.numerator()), (1, 1));

    let summary = &runs[1].result;
    assert_eq!(summary.total_population(), 2);
    assert_eq!((summary.denominator(), summary.numerator()), (3, 2));
    assert_eq!(summary.percentage().to_string(), "67%");

    assert!(runs.iter().all(|run| run.items.is_empty()));
    assert_eq!(session.last_run_id(), 0);
}

#[test]
fn test_itemized_session_draws_run_ids() {
    let rules = rules();
    let session = ReportSession::new(registry(&rules))
        .with_collector(Arc::new(collector()))
        .with_itemization(ItemizationSession::starting_after(10))
        .itemized(true);

    let runs = session.run(&rules, &population(), period()).unwrap();

    assert_eq!(runs[0].items.len(), 1);
    assert!(runs[0].items.iter().all(|i| i.run_iterator_id == 11));
    assert_eq!(runs[1].items.len(), 3);
    assert!(runs[1].items.iter().all(|i| i.run_iterator_id == 12));
    assert_eq!(
        runs[1].items.iter().map(|i| i.pass).collect::<Vec<_>>(),
        vec![true, false, true]
    );
    assert_eq!(session.last_run_id(), 12);
}

#[test]
fn test_shared_tracker_collects_all_runs() {
    let rules = rules();
    let tracker = Arc::new(RecordingTracker::new());
    let session = ReportSession::new(registry(&rules))
        .with_collector(Arc::new(collector()))
        .with_tracker(tracker.clone())
        .itemized(true);

    let runs = session.run(&rules, &population(), period()).unwrap();
    assert!(runs.iter().all(|run| run.items.is_empty()));
    assert_eq!(tracker.len(), 4);
}

#[test]
fn test_unknown_rule_stops_session() {
    let rules = rules();
    let session = ReportSession::new(Arc::new(ReportRegistry::new()));

    let err = session.run(&rules, &population(), period()).unwrap_err();
    assert_eq!(err.code(), AMC0103);
}

#[test]
fn test_prepared_evaluators_run_on_threads() {
    let rules = rules();
    let session = ReportSession::new(registry(&rules)).with_collector(Arc::new(collector()));

    let evaluators = rules
        .iter()
        .map(|rule| session.prepare(rule, population(), period()).unwrap())
        .collect::<Vec<_>>();

    let handles = evaluators
        .into_iter()
        .map(|mut evaluator| std::thread::spawn(move || evaluator.execute().unwrap()))
        .collect::<Vec<_>>();
    let results = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(
        results.iter().map(|r| r.rule_id().to_string()).collect::<Vec<_>>(),
        vec!["patient_portal_amc".to_string(), "send_sum_amc".to_string()]
    );
}
