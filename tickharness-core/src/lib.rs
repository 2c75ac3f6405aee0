//! Virtual-time arrival engine for fault-tolerance simulations.
//!
//! This crate drives synthetic events into a pluggable [`Stage`] at a
//! configured rate on a virtual clock, and hands back every event once it has
//! settled. Summaries of a run live in `tickharness-metrics`.
//!
//! # Architecture Overview
//!
//! - [`VirtualClock`]: current tick plus a wake-time ordered queue of waiters.
//!   Stages use it for every delay so latency is measured in ticks.
//! - [`Runtime`](async_runtime::Runtime): single-threaded executor that polls
//!   ready tasks and advances the clock when none are left.
//! - [`ArrivalEngine`]: computes the arrival schedule and submits events
//!   without waiting on any of them.
//! - [`Simulation`]: owns one clock, one runtime and the arrival counters, and
//!   brackets each run with the clock's start/stop.
//!
//! # Basic Usage
//!
//! ```
//! use std::rc::Rc;
//! use tickharness_core::{Event, Simulation, SimulationConfig, Stage, StageFuture, VirtualClock};
//!
//! struct FixedDelay {
//!     clock: VirtualClock,
//!     ticks: f64,
//! }
//!
//! impl Stage for FixedDelay {
//!     type Payload = ();
//!
//!     fn name(&self) -> &str {
//!         "fixed-delay"
//!     }
//!
//!     fn accept(&self, _event: &Event<()>) -> StageFuture<()> {
//!         let wait = self.clock.wait(self.ticks);
//!         Box::pin(async move {
//!             wait.await;
//!             Ok(())
//!         })
//!     }
//! }
//!
//! let mut sim = Simulation::new(SimulationConfig::default().with_rate(500.0)).unwrap();
//! let stage = Rc::new(FixedDelay { clock: sim.clock(), ticks: 3.0 });
//!
//! let events = sim.run(stage, 4).unwrap();
//! assert_eq!(events.len(), 4);
//! assert_eq!(events[3].response_time.start.whole_ticks(), 6);
//! assert_eq!(events[3].latency(), Some(3.0));
//! ```
//!
//! # Time Model
//!
//! All timing uses [`SimTime`], measured in ticks and fully decoupled from
//! wall-clock time. A run of tens of thousands of ticks completes as fast as
//! its events can be polled.

pub mod arrival;
pub mod async_runtime;
pub mod config;
pub mod error;
pub mod event;
pub mod keyspace;
pub mod logging;
pub mod scheduler;
pub mod stage;
pub mod telemetry;
pub mod time;
pub mod types;
pub mod waker;

use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, instrument, warn};

pub use arrival::{ArrivalEngine, ArrivalState};
pub use async_runtime::{JoinHandle, Runtime, RuntimeHandle};
pub use config::SimulationConfig;
pub use error::{SimError, StageError};
pub use event::{Bucket, Event, FailureReason, Response, ResponseTime};
pub use keyspace::{FixedKey, KeyGenerator, NormalKeyspace};
pub use logging::{
    event_span, init_detailed_simulation_logging, init_simulation_logging,
    init_simulation_logging_with_level, simulation_span,
};
pub use scheduler::{ClockRef, Sleep, VirtualClock};
pub use stage::{Stage, StageFuture, StageReport, StageTime, StageTraffic};
pub use time::SimTime;
pub use types::{EventId, EventKey};

/// Simulation struct that puts the clock, runtime and arrival engine together.
///
/// Each simulation owns its own clock, so independent simulations can run
/// side by side (on one thread) without sharing time.
///
/// See the [crate-level documentation](index.html) for more information.
pub struct Simulation {
    config: SimulationConfig,
    clock: VirtualClock,
    runtime: Runtime,
    arrival: ArrivalState,
    keys: Rc<RefCell<dyn KeyGenerator>>,
}

impl Simulation {
    /// Validate `config` and build a simulation with a normal keyspace.
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        config.validate()?;
        let keys = NormalKeyspace::from_config(&config)?;
        debug!(?config, "Simulation created");
        Ok(Self {
            config,
            clock: VirtualClock::new(),
            runtime: Runtime::new(),
            arrival: ArrivalState::new(),
            keys: Rc::new(RefCell::new(keys)),
        })
    }

    /// Replace the key generator.
    #[must_use]
    pub fn with_key_generator<K: KeyGenerator + 'static>(mut self, keys: K) -> Self {
        self.keys = Rc::new(RefCell::new(keys));
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Handle onto this simulation's clock, for stages that need to wait.
    #[must_use]
    pub fn clock(&self) -> VirtualClock {
        self.clock.clone()
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.clock.now()
    }

    /// Handle for spawning extra tasks alongside a run.
    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    /// Live arrival counters, shared with any run in progress.
    pub fn arrival_state(&self) -> ArrivalState {
        self.arrival.clone()
    }

    /// Configured rate while a run is emitting, zero otherwise.
    pub fn current_arrival_rate(&self) -> f64 {
        self.arrival.current_rate()
    }

    /// Send `num_events` events into `stage` and return them once all have settled.
    ///
    /// Stage failures are recorded on the events. Only configuration errors
    /// and runs that can never finish surface as `Err`.
    #[instrument(skip(self, stage), fields(stage = %stage.name()))]
    pub fn run<S: Stage + 'static>(
        &mut self,
        stage: Rc<S>,
        num_events: usize,
    ) -> Result<Vec<Event<S::Payload>>, SimError> {
        self.config.validate()?;
        if self.runtime.has_tasks() {
            return Err(SimError::Internal(format!(
                "{} task(s) left over from a previous run",
                self.runtime.task_count()
            )));
        }

        info!(rate = self.config.events_per_1000_ticks, "Starting simulation run");
        self.clock.start();

        let engine = ArrivalEngine::new(
            self.clock.clone(),
            self.runtime.handle(),
            stage,
            Rc::clone(&self.keys),
            self.arrival.clone(),
            self.config.events_per_1000_ticks,
        );
        let result = self.runtime.block_on(&self.clock, engine.run(num_events));

        self.clock.stop();
        self.arrival.reset();

        match &result {
            Ok(events) => info!(
                settled = events.len(),
                final_time = %self.clock.now(),
                "Simulation run completed"
            ),
            Err(err) => warn!(error = %err, final_time = %self.clock.now(), "Simulation run failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl Stage for Echo {
        type Payload = u64;

        fn name(&self) -> &str {
            "echo"
        }

        fn accept(&self, event: &Event<u64>) -> StageFuture<u64> {
            let key = event.key.0;
            Box::pin(async move { Ok(key) })
        }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = Simulation::new(SimulationConfig::default().with_rate(0.0));
        assert!(matches!(err, Err(SimError::Configuration(_))));
    }

    #[test]
    fn test_run_with_fixed_keys() {
        let mut sim = Simulation::new(SimulationConfig::default())
            .unwrap()
            .with_key_generator(FixedKey(EventKey(77)));

        let events = sim.run(Rc::new(Echo), 3).unwrap();
        assert!(events
            .iter()
            .all(|e| e.response == Some(Response::Success(77))));
        assert_eq!(sim.current_arrival_rate(), 0.0);
        assert!(!sim.clock().is_running());
    }

    #[test]
    fn test_consecutive_runs_restart_clock() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();

        let first = sim.run(Rc::new(Echo), 4).unwrap();
        assert_eq!(sim.time(), SimTime::from_ticks(3));
        let second = sim.run(Rc::new(Echo), 2).unwrap();

        assert_eq!(first.len(), 4);
        assert_eq!(second[0].response_time.start, SimTime::zero());
        assert_eq!(sim.time(), SimTime::from_ticks(1));
    }
}
