//! Arrival engine: turns a target rate into a submission schedule.
//!
//! With `tick_delta = 1000 / rate`:
//!
//! - `tick_delta >= 1`: one event, then wait `tick_delta` ticks.
//! - `tick_delta < 1`: `floor(rate / 1000)` events in the same tick, then wait
//!   one tick. The final batch is trimmed so exactly `num_events` are sent.
//!
//! Submissions never wait for the stage. Each event settles in its own task;
//! the engine joins them only after the whole schedule has been emitted.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, instrument, trace, Instrument};

use crate::async_runtime::{JoinHandle, RuntimeHandle};
use crate::event::{Event, Response};
use crate::keyspace::KeyGenerator;
use crate::logging::event_span;
use crate::scheduler::VirtualClock;
use crate::stage::Stage;
use crate::telemetry::RunMetrics;
use crate::types::EventId;

#[derive(Debug, Default)]
struct ArrivalCounters {
    target_rate: Cell<f64>,
    current_rate: Cell<f64>,
    arrivals_this_tick: Cell<u64>,
    sent: Cell<u64>,
}

/// Live arrival counters of one simulation, readable while a run is in flight.
///
/// Cloning shares the same counters.
#[derive(Debug, Clone, Default)]
pub struct ArrivalState {
    counters: Rc<ArrivalCounters>,
}

impl ArrivalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured rate of the run in progress, zero between runs.
    pub fn target_rate(&self) -> f64 {
        self.counters.target_rate.get()
    }

    /// Rate arrivals are being emitted at right now, zero once emission ends.
    pub fn current_rate(&self) -> f64 {
        self.counters.current_rate.get()
    }

    /// Size of the most recent batch.
    pub fn arrivals_this_tick(&self) -> u64 {
        self.counters.arrivals_this_tick.get()
    }

    /// Events submitted so far in the current run.
    pub fn sent(&self) -> u64 {
        self.counters.sent.get()
    }

    fn begin(&self, rate: f64) {
        self.counters.target_rate.set(rate);
        self.counters.current_rate.set(rate);
        self.counters.arrivals_this_tick.set(0);
        self.counters.sent.set(0);
    }

    fn record_batch(&self, size: u64) {
        self.counters.arrivals_this_tick.set(size);
        self.counters.sent.set(self.counters.sent.get() + size);
    }

    fn finish_emission(&self) {
        self.counters.current_rate.set(0.0);
        self.counters.arrivals_this_tick.set(0);
    }

    pub(crate) fn reset(&self) {
        self.counters.target_rate.set(0.0);
        self.finish_emission();
    }
}

/// Emits events into a stage on the virtual clock.
pub struct ArrivalEngine<S: Stage> {
    clock: VirtualClock,
    runtime: RuntimeHandle,
    stage: Rc<S>,
    keys: Rc<RefCell<dyn KeyGenerator>>,
    state: ArrivalState,
    metrics: RunMetrics,
    events_per_1000_ticks: f64,
    next_id: u64,
}

impl<S: Stage + 'static> ArrivalEngine<S> {
    /// `events_per_1000_ticks` must already be validated as finite and positive.
    pub fn new(
        clock: VirtualClock,
        runtime: RuntimeHandle,
        stage: Rc<S>,
        keys: Rc<RefCell<dyn KeyGenerator>>,
        state: ArrivalState,
        events_per_1000_ticks: f64,
    ) -> Self {
        let metrics = RunMetrics::new(stage.name());
        Self {
            clock,
            runtime,
            stage,
            keys,
            state,
            metrics,
            events_per_1000_ticks,
            next_id: 0,
        }
    }

    /// Ticks between successive arrivals.
    pub fn tick_delta(&self) -> f64 {
        1000.0 / self.events_per_1000_ticks
    }

    /// Events submitted back-to-back in one tick when `tick_delta < 1`.
    ///
    /// `floor(rate / 1000)` is `floor(1 / tick_delta)` without the double
    /// division, so rates like 3000 give 3 rather than 2.
    pub fn events_per_tick(&self) -> usize {
        (self.events_per_1000_ticks / 1000.0).floor() as usize
    }

    /// Submit `num_events` events on schedule and wait for all of them to settle.
    ///
    /// Events are returned in submission order.
    #[instrument(skip(self), fields(stage = %self.metrics.stage(), rate = self.events_per_1000_ticks))]
    pub async fn run(mut self, num_events: usize) -> Vec<Event<S::Payload>> {
        if num_events == 0 {
            return Vec::new();
        }

        let tick_delta = self.tick_delta();
        let per_tick = self.events_per_tick().max(1);
        self.state.begin(self.events_per_1000_ticks);
        self.metrics.arrival_rate(self.events_per_1000_ticks);
        debug!(tick_delta, per_tick, num_events, start = %self.clock.now(), "Arrival schedule started");

        let mut pending = Vec::with_capacity(num_events);
        let mut sent = 0usize;
        while sent < num_events {
            let (batch, delay) = if tick_delta < 1.0 {
                (per_tick.min(num_events - sent), 1.0)
            } else {
                (1, tick_delta)
            };

            for _ in 0..batch {
                pending.push(self.submit());
            }
            sent += batch;
            self.state.record_batch(batch as u64);
            self.metrics.batch_sent(batch as u64);
            trace!(batch, sent, now = %self.clock.now(), "Batch submitted");

            if sent < num_events {
                self.clock.wait(delay).await;
            }
        }

        self.state.finish_emission();
        self.metrics.arrival_rate(0.0);
        debug!(sent, end = %self.clock.now(), "Arrival schedule exhausted, joining events");

        let mut events = Vec::with_capacity(pending.len());
        for handle in pending {
            events.push(handle.await);
        }
        debug!(settled = events.len(), end = %self.clock.now(), "All events settled");
        events
    }

    /// Build one event, hand it to the stage now, and settle it in its own task.
    fn submit(&mut self) -> JoinHandle<Event<S::Payload>> {
        let id = EventId(self.next_id);
        self.next_id += 1;
        let key = self.keys.borrow_mut().next_key();

        let mut event = Event::new(id, key, self.clock.now());
        let outcome = self.stage.accept(&event);
        self.metrics.event_submitted();
        trace!(%id, %key, start = %event.response_time.start, "Event submitted");

        let span = event_span(id, event.response_time.start);
        let clock = self.clock.clone();
        let metrics = self.metrics.clone();
        self.runtime.spawn(
            async move {
                let result = outcome.await;
                event.settle(clock.now(), Response::from(result));
                let latency = event.latency().unwrap_or_default();
                metrics.event_settled(event.bucket(), latency);
                trace!(bucket = %event.bucket(), latency, "Event settled");
                event
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::async_runtime::Runtime;
    use crate::error::StageError;
    use crate::keyspace::FixedKey;
    use crate::stage::StageFuture;
    use crate::types::EventKey;
    use crate::SimTime;

    struct Instant;

    impl Stage for Instant {
        type Payload = ();

        fn name(&self) -> &str {
            "instant"
        }

        fn accept(&self, _event: &Event<()>) -> StageFuture<()> {
            Box::pin(async { Ok(()) })
        }
    }

    struct AlwaysFails;

    impl Stage for AlwaysFails {
        type Payload = ();

        fn name(&self) -> &str {
            "always-fails"
        }

        fn accept(&self, _event: &Event<()>) -> StageFuture<()> {
            Box::pin(async { Err(StageError::failed("boom")) })
        }
    }

    fn engine<S: Stage + 'static>(
        runtime: &Runtime,
        clock: &VirtualClock,
        stage: S,
        rate: f64,
    ) -> ArrivalEngine<S> {
        let keys: Rc<RefCell<dyn KeyGenerator>> = Rc::new(RefCell::new(FixedKey(EventKey(1))));
        ArrivalEngine::new(
            clock.clone(),
            runtime.handle(),
            Rc::new(stage),
            keys,
            ArrivalState::new(),
            rate,
        )
    }

    fn start_ticks<P>(events: &[Event<P>]) -> Vec<u64> {
        events.iter().map(|e| e.response_time.start.whole_ticks()).collect()
    }

    #[test]
    fn test_events_per_tick() {
        let runtime = Runtime::new();
        let clock = VirtualClock::new();
        assert_eq!(engine(&runtime, &clock, Instant, 3000.0).events_per_tick(), 3);
        assert_eq!(engine(&runtime, &clock, Instant, 2500.0).events_per_tick(), 2);
        assert_eq!(engine(&runtime, &clock, Instant, 500.0).events_per_tick(), 0);
        assert_eq!(engine(&runtime, &clock, Instant, 500.0).tick_delta(), 2.0);
    }

    #[test]
    fn test_one_per_tick() {
        let runtime = Runtime::new();
        let clock = VirtualClock::new();
        clock.start();
        let engine = engine(&runtime, &clock, Instant, 1000.0);

        let events = runtime.block_on(&clock, engine.run(5)).unwrap();
        assert_eq!(start_ticks(&events), vec![0, 1, 2, 3, 4]);
        for event in &events {
            assert_eq!(event.response_time.end, Some(event.response_time.start));
        }
        let ids: Vec<u64> = events.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_sub_tick_batching() {
        let runtime = Runtime::new();
        let clock = VirtualClock::new();
        clock.start();
        let engine = engine(&runtime, &clock, Instant, 2000.0);

        let events = runtime.block_on(&clock, engine.run(5)).unwrap();
        assert_eq!(start_ticks(&events), vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_multi_tick_spacing() {
        let runtime = Runtime::new();
        let clock = VirtualClock::new();
        clock.start();
        let engine = engine(&runtime, &clock, Instant, 250.0);

        let events = runtime.block_on(&clock, engine.run(3)).unwrap();
        assert_eq!(start_ticks(&events), vec![0, 4, 8]);
    }

    #[test]
    fn test_zero_events() {
        let runtime = Runtime::new();
        let clock = VirtualClock::new();
        clock.start();
        let engine = engine(&runtime, &clock, Instant, 1000.0);

        let events = runtime.block_on(&clock, engine.run(0)).unwrap();
        assert!(events.is_empty());
        assert_eq!(clock.now(), SimTime::zero());
    }

    #[test]
    fn test_failures_are_captured() {
        let runtime = Runtime::new();
        let clock = VirtualClock::new();
        clock.start();
        let engine = engine(&runtime, &clock, AlwaysFails, 1000.0);

        let events = runtime.block_on(&clock, engine.run(3)).unwrap();
        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .all(|e| matches!(e.response, Some(Response::Failure(_)))));
    }

    #[test]
    fn test_state_resets_after_emission() {
        let runtime = Runtime::new();
        let clock = VirtualClock::new();
        clock.start();
        let engine = engine(&runtime, &clock, Instant, 3000.0);
        let state = engine.state.clone();

        let observed = state.clone();
        let watch_clock = clock.clone();
        let seen = Rc::new(Cell::new((0.0, 0)));
        let seen_in_run = seen.clone();
        runtime.handle().spawn(async move {
            watch_clock.wait_until(SimTime::from_ticks(1)).await;
            seen_in_run.set((observed.current_rate(), observed.arrivals_this_tick()));
        });

        let events = runtime.block_on(&clock, engine.run(7)).unwrap();
        assert_eq!(events.len(), 7);
        assert_eq!(seen.get(), (3000.0, 3));
        assert_eq!(state.current_rate(), 0.0);
        assert_eq!(state.arrivals_this_tick(), 0);
        assert_eq!(state.sent(), 7);
    }
}
