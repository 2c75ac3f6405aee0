//! # tickharness - virtual-time harness for fault-tolerance experiments
//!
//! tickharness drives synthetic events into a pluggable stage (a cache, a
//! circuit breaker, a retry policy...) on a virtual clock and summarizes how
//! they settled.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tickharness = "0.1"
//! ```
//!
//! ```
//! use std::rc::Rc;
//! use tickharness::prelude::*;
//!
//! struct Echo;
//!
//! impl Stage for Echo {
//!     type Payload = ();
//!
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn accept(&self, _event: &Event<()>) -> StageFuture<()> {
//!         Box::pin(async { Ok(()) })
//!     }
//! }
//!
//! let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
//! let events = sim.run(Rc::new(Echo), 10).unwrap();
//! let summary = EventSummary::from_events(&events);
//! assert_eq!(summary.row(Bucket::Success).get("count"), Some(MetricValue::Integer(10)));
//! ```

// Re-export core (always available)
pub use tickharness_core as core;

pub use tickharness_metrics as metrics;

/// Everything needed to write a stage, run it and summarize the result.
pub mod prelude {
    pub use tickharness_core::{
        Bucket, Event, EventId, EventKey, Response, SimError, SimTime, Simulation,
        SimulationConfig, Stage, StageError, StageFuture, StageReport, StageTime, StageTraffic,
        VirtualClock,
    };
    pub use tickharness_metrics::{
        compare_runs, stage_time_rows, stage_traffic_rows, BucketView, EventSummary, MetricSet,
        MetricValue, SummaryDiff,
    };
}
