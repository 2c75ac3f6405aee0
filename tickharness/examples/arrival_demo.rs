//! Cache in front of a slow backend, with and without the cache
//!
//! Usage:
//! - Default (info level): cargo run --example arrival_demo
//! - Clock activity: RUST_LOG=tickharness_core::scheduler=debug cargo run --example arrival_demo
//! - Every event: RUST_LOG=trace cargo run --example arrival_demo

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use tickharness::core::{init_simulation_logging_with_level, simulation_span};
use tickharness::prelude::*;
use tracing::info;

const BACKEND_TICKS: f64 = 40.0;
const HIT_TICKS: f64 = 1.0;
const MAX_IN_FLIGHT: u64 = 30;

/// Backend with bounded concurrency, optionally fronted by a key cache.
struct CachedBackend {
    name: &'static str,
    clock: VirtualClock,
    cache_enabled: bool,
    cached: Rc<RefCell<HashSet<EventKey>>>,
    in_flight: Rc<Cell<u64>>,
    traffic: Rc<Cell<StageTraffic>>,
    work_time: Rc<Cell<f64>>,
}

impl CachedBackend {
    fn new(name: &'static str, clock: VirtualClock, cache_enabled: bool) -> Self {
        Self {
            name,
            clock,
            cache_enabled,
            cached: Rc::default(),
            in_flight: Rc::default(),
            traffic: Rc::default(),
            work_time: Rc::default(),
        }
    }

    fn bump(traffic: &Cell<StageTraffic>, update: impl FnOnce(&mut StageTraffic)) {
        let mut current = traffic.get();
        update(&mut current);
        traffic.set(current);
    }
}

impl Stage for CachedBackend {
    type Payload = bool;

    fn name(&self) -> &str {
        self.name
    }

    fn accept(&self, event: &Event<bool>) -> StageFuture<bool> {
        Self::bump(&self.traffic, |t| t.add += 1);

        let hit = self.cache_enabled && self.cached.borrow().contains(&event.key);
        if !hit && self.in_flight.get() >= MAX_IN_FLIGHT {
            Self::bump(&self.traffic, |t| t.fail += 1);
            return Box::pin(async { Err(StageError::rejected("backend saturated")) });
        }

        Self::bump(&self.traffic, |t| t.work_on += 1);
        let ticks = if hit { HIT_TICKS } else { BACKEND_TICKS };
        let wait = self.clock.wait(ticks);
        let key = event.key;
        let (cached, in_flight) = (Rc::clone(&self.cached), Rc::clone(&self.in_flight));
        let (traffic, work_time) = (Rc::clone(&self.traffic), Rc::clone(&self.work_time));
        if !hit {
            in_flight.set(in_flight.get() + 1);
        }

        Box::pin(async move {
            wait.await;
            if !hit {
                in_flight.set(in_flight.get() - 1);
                cached.borrow_mut().insert(key);
            }
            work_time.set(work_time.get() + ticks);
            CachedBackend::bump(&traffic, |t| t.success += 1);
            Ok(hit)
        })
    }

    fn time(&self) -> StageTime {
        StageTime {
            queue_time: 0.0,
            work_time: self.work_time.get(),
        }
    }

    fn traffic(&self) -> StageTraffic {
        self.traffic.get()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_simulation_logging_with_level("info");

    // Narrow keyspace so the cache gets hits
    let config = SimulationConfig::default()
        .with_rate(2000.0)
        .with_keyspace(500.0, 40.0)
        .with_seed(2024);

    let mut runs = Vec::new();
    let mut stages = Vec::new();
    for (label, cache_enabled) in [("no-cache", false), ("cache", true)] {
        let _span = simulation_span(label).entered();
        let mut sim = Simulation::new(config.clone())?;
        let stage = Rc::new(CachedBackend::new(label, sim.clock(), cache_enabled));

        let events = sim.run(Rc::clone(&stage), 2_000)?;
        let hits = events
            .iter()
            .filter(|e| matches!(e.response, Some(Response::Success(true))))
            .count();
        info!(label, hits, final_time = %sim.time(), "Run finished");

        let summary = EventSummary::from_events(&events);
        println!("== {label} ==\n{summary}\n");
        runs.push((label, summary));
        stages.push(stage);
    }

    for comparison in compare_runs(&runs)? {
        println!("== {} - {} ==\n{}\n", comparison.label, runs[0].0, comparison.diff);
    }

    let reports: Vec<&dyn StageReport> = stages.iter().map(|s| &**s as &dyn StageReport).collect();
    for row in stage_traffic_rows(&reports) {
        println!("{row}");
    }
    for row in stage_time_rows(&reports) {
        println!("{row}");
    }

    println!("\n{}", serde_json::to_string_pretty(&runs[1].1)?);
    Ok(())
}
