//! Statistics over tickharness simulation runs
//!
//! This crate turns the events returned by a run into per-bucket summaries,
//! compares summaries across runs, and reshapes stage counters into tables.
//! It never persists anything; every summary is serde-serializable for
//! whoever does the reporting.
//!
//! # Example
//!
//! ```
//! use tickharness_core::{Bucket, Event, EventId, EventKey, Response, SimTime};
//! use tickharness_metrics::{EventSummary, MetricValue};
//!
//! let mut event = Event::new(EventId(0), EventKey(7), SimTime::zero());
//! event.settle(SimTime::from_ticks(4), Response::Success(()));
//!
//! let summary = EventSummary::from_events(&[event]);
//! let success = summary.row(Bucket::Success);
//! assert_eq!(success.get("count"), Some(MetricValue::Integer(1)));
//! assert_eq!(success.get("mean_latency").unwrap().to_string(), "4");
//! assert_eq!(summary.row(Bucket::Fail).get("std_latency"), Some(MetricValue::NoData));
//! ```

pub mod diff;
pub mod error;
pub mod latency;
pub mod stage_summary;
pub mod summary;
pub mod value;

pub use diff::{compare_runs, RunComparison, SummaryDiff};
pub use error::MetricsError;
pub use latency::LatencyStats;
pub use stage_summary::{stage_time_rows, stage_traffic_rows, StageTimeRow, StageTrafficRow};
pub use summary::{
    BucketView, EventSummary, MetricSet, SummaryRow, COUNT, MEAN_LATENCY, PERCENT, STD_LATENCY,
};
pub use value::MetricValue;
