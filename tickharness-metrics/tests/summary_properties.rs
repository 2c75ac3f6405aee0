use std::rc::Rc;
use tickharness_core::{
    Bucket, Event, Simulation, SimulationConfig, Stage, StageError, StageFuture, VirtualClock,
};
use tickharness_metrics::{
    compare_runs, BucketView, EventSummary, MetricSet, MetricValue, COUNT, MEAN_LATENCY, PERCENT,
    STD_LATENCY,
};

struct Immediate;

impl Stage for Immediate {
    type Payload = ();

    fn name(&self) -> &str {
        "immediate"
    }

    fn accept(&self, _event: &Event<()>) -> StageFuture<()> {
        Box::pin(async { Ok(()) })
    }
}

/// Waits `1 + id % 4` ticks, fails every third event.
struct Flaky {
    clock: VirtualClock,
}

impl Stage for Flaky {
    type Payload = u64;

    fn name(&self) -> &str {
        "flaky"
    }

    fn accept(&self, event: &Event<u64>) -> StageFuture<u64> {
        let id = event.id.0;
        let wait = self.clock.wait((1 + id % 4) as f64);
        Box::pin(async move {
            wait.await;
            if id % 3 == 2 {
                Err(StageError::Timeout { ticks: 1 + id % 4 })
            } else {
                Ok(id)
            }
        })
    }
}

fn row_strings(summary: &EventSummary, bucket: Bucket) -> Vec<String> {
    summary
        .row(bucket)
        .values
        .iter()
        .map(|(_, value)| value.to_string())
        .collect()
}

#[test]
fn zero_delay_run_summary() {
    let mut sim = Simulation::new(SimulationConfig::default().with_rate(1000.0)).unwrap();
    let events = sim.run(Rc::new(Immediate), 5).unwrap();
    let summary = EventSummary::from_events(&events);

    assert_eq!(row_strings(&summary, Bucket::Success), ["5", "1", "0", "0"]);
    assert_eq!(row_strings(&summary, Bucket::Fail), ["0", "0", "NaN", "NaN"]);
}

#[test]
fn counts_and_percents_cover_the_run() {
    let mut sim = Simulation::new(SimulationConfig::default().with_rate(1500.0)).unwrap();
    let stage = Rc::new(Flaky { clock: sim.clock() });
    let events = sim.run(stage, 30).unwrap();
    let summary = EventSummary::from_events(&events);

    let success = summary.row(Bucket::Success);
    let fail = summary.row(Bucket::Fail);
    let count = |row: &tickharness_metrics::SummaryRow| row.get(COUNT).unwrap().as_i64().unwrap();
    let percent = |row: &tickharness_metrics::SummaryRow| row.get(PERCENT).unwrap().as_f64();

    assert_eq!(count(success) + count(fail), 30);
    assert_eq!(count(fail), 10);
    assert!((percent(success) + percent(fail) - 1.0).abs() < 1e-9);
    assert_eq!(summary.total(), 30);
}

#[test]
fn latency_stats_match_stage_delays() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let stage = Rc::new(Flaky { clock: sim.clock() });
    let events = sim.run(stage, 12).unwrap();
    let summary = EventSummary::from_events(&events);

    // Successful ids: 0 1 3 4 6 7 9 10 with delays 1 2 4 1 3 4 2 3
    let delays = [1.0, 2.0, 4.0, 1.0, 3.0, 4.0, 2.0, 3.0];
    let mean = delays.iter().sum::<f64>() / delays.len() as f64;
    let variance = delays.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / delays.len() as f64;

    let success = summary.row(Bucket::Success);
    assert!((success.get(MEAN_LATENCY).unwrap().as_f64() - mean).abs() < 1e-9);
    assert!((success.get(STD_LATENCY).unwrap().as_f64() - variance.sqrt()).abs() < 1e-9);

    // Failed ids: 2 5 8 11, delays 3 2 1 4
    let fail = summary.row(Bucket::Fail);
    assert_eq!(fail.get(MEAN_LATENCY), Some(MetricValue::Float(2.5)));
}

#[test]
fn single_event_bucket_has_zero_std() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let stage = Rc::new(Flaky { clock: sim.clock() });
    let events = sim.run(stage, 3).unwrap();
    let summary = EventSummary::from_events(&events);

    assert_eq!(summary.row(Bucket::Fail).get(COUNT), Some(MetricValue::Integer(1)));
    assert_eq!(
        summary.row(Bucket::Fail).get(STD_LATENCY),
        Some(MetricValue::Float(0.0))
    );
}

#[test]
fn custom_metric_over_payloads() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let stage = Rc::new(Flaky { clock: sim.clock() });
    let events = sim.run(stage, 6).unwrap();

    let metrics = MetricSet::default().with_metric("payload_sum", |view: &BucketView<'_, u64>| {
        let sum: u64 = view
            .events()
            .iter()
            .filter_map(|e| e.response.as_ref().and_then(|r| r.payload()))
            .sum();
        MetricValue::Integer(sum as i64)
    });
    let summary = EventSummary::build(&events, &metrics);

    // ids 0 1 3 4 succeed
    assert_eq!(
        summary.value(Bucket::Success, "payload_sum"),
        Ok(MetricValue::Integer(8))
    );
    assert_eq!(
        summary.value(Bucket::Fail, "payload_sum"),
        Ok(MetricValue::Integer(0))
    );
}

#[test]
fn comparing_identical_runs_is_zero() {
    let summarize = || {
        let mut sim = Simulation::new(SimulationConfig::default().with_rate(2000.0)).unwrap();
        let stage = Rc::new(Flaky { clock: sim.clock() });
        EventSummary::from_events(&sim.run(stage, 20).unwrap())
    };
    let runs = vec![("first", summarize()), ("second", summarize())];

    let comparisons = compare_runs(&runs).unwrap();
    assert_eq!(comparisons.len(), 1);
    assert!(comparisons[0].diff.is_zero());
}

#[test]
fn summary_serializes_as_flat_rows() {
    let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
    let events = sim.run(Rc::new(Immediate), 2).unwrap();
    let summary = EventSummary::from_events(&events);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["rows"][0]["bucket"], "success");
    assert_eq!(json["rows"][0]["count"], 2);
    assert!(json["rows"][1]["mean_latency"].is_null());
}
