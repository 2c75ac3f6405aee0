//! Determinism guardrail tests
//!
//! Identical configurations must produce identical runs: same keys, same
//! timings, same completion order.

use std::cell::RefCell;
use std::rc::Rc;
use tickharness_core::{
    Event, EventKey, Simulation, SimulationConfig, Stage, StageError, StageFuture, VirtualClock,
};

/// Delay derived from the key, fails on odd keys, logs completion order.
struct KeyedDelay {
    clock: VirtualClock,
    completions: Rc<RefCell<Vec<u64>>>,
}

impl Stage for KeyedDelay {
    type Payload = EventKey;

    fn name(&self) -> &str {
        "keyed-delay"
    }

    fn accept(&self, event: &Event<EventKey>) -> StageFuture<EventKey> {
        let key = event.key;
        let id = event.id.0;
        let wait = self.clock.wait((key.0 % 17) as f64 + 0.5);
        let completions = Rc::clone(&self.completions);
        Box::pin(async move {
            wait.await;
            completions.borrow_mut().push(id);
            if key.0 % 2 == 1 {
                Err(StageError::failed("odd key"))
            } else {
                Ok(key)
            }
        })
    }
}

type Trace = (Vec<(u64, u64, u64, bool)>, Vec<u64>);

fn run_once(config: SimulationConfig, n: usize) -> Trace {
    let mut sim = Simulation::new(config).unwrap();
    let completions = Rc::new(RefCell::new(Vec::new()));
    let stage = Rc::new(KeyedDelay {
        clock: sim.clock(),
        completions: Rc::clone(&completions),
    });
    let events = sim.run(stage, n).unwrap();

    let rows = events
        .iter()
        .map(|e| {
            (
                e.key.0,
                e.response_time.start.as_units(),
                e.response_time.end.map_or(0, |t| t.as_units()),
                e.bucket().as_str() == "success",
            )
        })
        .collect();
    let order = completions.borrow().clone();
    (rows, order)
}

#[test]
fn same_seed_same_run() {
    let config = SimulationConfig::default().with_rate(2500.0).with_seed(7);
    let first = run_once(config.clone(), 200);
    let second = run_once(config, 200);
    assert_eq!(first, second);
}

#[test]
fn different_seed_different_keys() {
    let base = SimulationConfig::default().with_rate(2500.0);
    let (a, _) = run_once(base.clone().with_seed(1), 50);
    let (b, _) = run_once(base.with_seed(2), 50);

    let keys_a: Vec<u64> = a.iter().map(|row| row.0).collect();
    let keys_b: Vec<u64> = b.iter().map(|row| row.0).collect();
    assert_ne!(keys_a, keys_b);
}

#[test]
fn completion_order_follows_virtual_time() {
    let (rows, order) = run_once(SimulationConfig::default().with_seed(3), 100);

    let end_of = |id: u64| rows[id as usize].2;
    for pair in order.windows(2) {
        assert!(end_of(pair[0]) <= end_of(pair[1]));
    }
    assert_eq!(order.len(), 100);
}

#[test]
fn repeated_runs_on_one_simulation_are_independent_of_time() {
    let mut sim = Simulation::new(SimulationConfig::default().with_seed(11)).unwrap();
    let completions = Rc::new(RefCell::new(Vec::new()));
    let stage = Rc::new(KeyedDelay {
        clock: sim.clock(),
        completions,
    });

    let first = sim.run(Rc::clone(&stage), 10).unwrap();
    let second = sim.run(stage, 10).unwrap();

    let starts = |events: &[Event<EventKey>]| -> Vec<u64> {
        events
            .iter()
            .map(|e| e.response_time.start.as_units())
            .collect()
    };
    // Keys continue from the generator, but the clock restarts at zero
    assert_eq!(starts(&first), starts(&second));
}
