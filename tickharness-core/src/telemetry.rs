//! Run-level counters and gauges exported through the `metrics` facade.
//!
//! Nothing is recorded unless the host installs a `metrics` recorder; the
//! statistics a run returns never depend on this module.

use metrics::{counter, gauge, histogram};

use crate::event::Bucket;

pub const EVENTS_SUBMITTED: &str = "tickharness_events_submitted_total";
pub const EVENTS_SETTLED: &str = "tickharness_events_settled_total";
pub const EVENT_LATENCY_TICKS: &str = "tickharness_event_latency_ticks";
pub const ARRIVAL_RATE: &str = "tickharness_arrival_rate";
pub const ARRIVALS_THIS_TICK: &str = "tickharness_arrivals_this_tick";

/// Emits metrics labelled with the stage a run targets.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    stage: String,
}

impl RunMetrics {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn event_submitted(&self) {
        counter!(EVENTS_SUBMITTED, "stage" => self.stage.clone()).increment(1);
    }

    pub fn event_settled(&self, bucket: Bucket, latency_ticks: f64) {
        counter!(EVENTS_SETTLED, "stage" => self.stage.clone(), "bucket" => bucket.as_str())
            .increment(1);
        histogram!(EVENT_LATENCY_TICKS, "stage" => self.stage.clone(), "bucket" => bucket.as_str())
            .record(latency_ticks);
    }

    pub fn arrival_rate(&self, events_per_1000_ticks: f64) {
        gauge!(ARRIVAL_RATE, "stage" => self.stage.clone()).set(events_per_1000_ticks);
    }

    pub fn batch_sent(&self, size: u64) {
        gauge!(ARRIVALS_THIS_TICK, "stage" => self.stage.clone()).set(size as f64);
    }
}
