//! Integration tests for the producer/consumer workload driver.

use simpleq::config::Config;
use simpleq::error::Error;
use simpleq::workload::{self, Scenario, ScenarioOutcome};

fn config(producers: usize, consumers: usize, items_per_producer: u64) -> Config {
    Config {
        producers,
        consumers,
        items_per_producer,
        queue_name: "workload-test".to_string(),
        ..Config::default()
    }
}

#[test]
fn run_delivers_every_item_exactly_once() {
    let report = workload::run(&config(4, 3, 500)).unwrap();

    assert_eq!(report.produced, 2_000);
    assert_eq!(report.total(), 2_000);
    assert_eq!(report.received.len(), 3);
    assert!(report.is_exact());
    assert!(report.preserves_producer_order());

    assert!(report.stats.closed);
    assert_eq!(report.stats.enqueued, 2_000);
    assert_eq!(report.stats.dequeued, 2_000);
    assert_eq!(report.stats.pending, 0);
    assert_eq!(report.queue, "workload-test");
}

#[test]
fn single_producer_single_consumer_run_is_in_order() {
    let report = workload::run(&config(1, 1, 10)).unwrap();
    assert_eq!(report.received, vec![(0..10).collect::<Vec<u64>>()]);
}

#[test]
fn more_consumers_than_items_still_terminates() {
    let report = workload::run(&config(1, 8, 2)).unwrap();
    assert_eq!(report.received.len(), 8);
    assert_eq!(report.total(), 2);
    assert!(report.is_exact());
}

#[test]
fn zero_items_closes_cleanly() {
    let report = workload::run(&config(2, 2, 0)).unwrap();
    assert_eq!(report.total(), 0);
    assert!(report.is_exact());
    assert!(report.stats.closed);
}

#[test]
fn invalid_shape_is_rejected_before_spawning() {
    let result = workload::run(&config(0, 1, 10));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn overflowing_shape_is_rejected_before_spawning() {
    let result = workload::run(&config(4, 1, u64::MAX / 2));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn report_serializes_to_json() {
    let report = workload::run(&config(1, 1, 3)).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["produced"], serde_json::json!(3));
    assert_eq!(json["received"], serde_json::json!([[0, 1, 2]]));
    assert_eq!(json["stats"]["closed"], serde_json::json!(true));
    assert_eq!(json["run_id"], serde_json::json!(report.run_id.to_string()));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn every_scenario_passes() {
    for scenario in Scenario::ALL {
        let outcome = workload::run_scenario(scenario).unwrap();
        assert!(outcome.passed(scenario), "scenario {} failed: {outcome:?}", scenario.label());
    }
}

#[test]
fn double_producer_scenario_drains_twenty() {
    match workload::run_scenario(Scenario::DoubleProducerDoubleConsumer).unwrap() {
        ScenarioOutcome::Drained(report) => {
            assert_eq!(report.received.len(), 2);
            assert_eq!(report.total(), 20);
        }
        other => panic!("expected Drained, got {other:?}"),
    }
}

#[test]
fn enqueue_after_close_scenario_is_rejected() {
    match workload::run_scenario(Scenario::EnqueueAfterClose).unwrap() {
        ScenarioOutcome::Rejected { error, stats } => {
            assert!(error.is_closed());
            assert_eq!(stats.pending, 1);
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[test]
fn scenario_labels_parse() {
    assert_eq!("a".parse::<Scenario>().unwrap(), Scenario::SingleProducerSingleConsumer);
    assert_eq!(" C ".parse::<Scenario>().unwrap(), Scenario::DoubleProducerDoubleConsumer);
    assert!("e".parse::<Scenario>().is_err());
    assert!(Scenario::EnqueueAfterClose.config().is_none());
}

#[tokio::test]
async fn run_from_blocking_task() {
    let report = tokio::task::spawn_blocking(|| workload::run(&config(2, 2, 50)))
        .await
        .unwrap()
        .unwrap();
    assert!(report.is_exact());
}
