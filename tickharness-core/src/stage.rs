//! Contract for the pluggable processing pipeline events are submitted to.
//!
//! Stage internals (queues, caches, breakers, retries) live outside this
//! crate. The harness only calls [`Stage::accept`] and reads the counters a
//! stage exposes for reporting.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::error::StageError;
use crate::event::Event;

/// Future returned by [`Stage::accept`].
pub type StageFuture<P> = Pin<Box<dyn Future<Output = Result<P, StageError>>>>;

/// Accumulated time a stage spent on events, in ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTime {
    pub queue_time: f64,
    pub work_time: f64,
}

/// Event counters of a stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTraffic {
    /// Events handed to the stage
    pub add: u64,
    /// Events that reached the work step
    pub work_on: u64,
    pub success: u64,
    pub fail: u64,
}

/// A processing pipeline that events are submitted to.
///
/// `accept` must not hold a borrow of `self` or `event` in the returned
/// future; clone whatever the future needs. Use the [`VirtualClock`] for any
/// delay so it is measured in ticks.
///
/// [`VirtualClock`]: crate::VirtualClock
pub trait Stage {
    /// Success payload of one event.
    type Payload: 'static;

    fn name(&self) -> &str;

    fn accept(&self, event: &Event<Self::Payload>) -> StageFuture<Self::Payload>;

    /// Read-only timing counters for reporting.
    fn time(&self) -> StageTime {
        StageTime::default()
    }

    /// Read-only traffic counters for reporting.
    fn traffic(&self) -> StageTraffic {
        StageTraffic::default()
    }
}

impl<S: Stage + ?Sized> Stage for Rc<S> {
    type Payload = S::Payload;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn accept(&self, event: &Event<Self::Payload>) -> StageFuture<Self::Payload> {
        (**self).accept(event)
    }

    fn time(&self) -> StageTime {
        (**self).time()
    }

    fn traffic(&self) -> StageTraffic {
        (**self).traffic()
    }
}

/// Object-safe reporting view of a stage, independent of its payload type.
///
/// Method names differ from [`Stage`]'s so both traits can be in scope.
pub trait StageReport {
    fn stage_name(&self) -> &str;
    fn stage_time(&self) -> StageTime;
    fn stage_traffic(&self) -> StageTraffic;
}

impl<S: Stage + ?Sized> StageReport for S {
    fn stage_name(&self) -> &str {
        Stage::name(self)
    }

    fn stage_time(&self) -> StageTime {
        Stage::time(self)
    }

    fn stage_traffic(&self) -> StageTraffic {
        Stage::traffic(self)
    }
}
