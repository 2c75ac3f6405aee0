//! The virtual clock: current tick plus a wake-time ordered queue of waiters.
//!
//! Time never moves on its own. The runtime calls [`VirtualClock::advance`]
//! whenever no task is ready, which jumps straight to the earliest pending wake
//! time and wakes every waiter due at or before it. A run of 20,000 ticks costs
//! as many heap operations as it has waits, not 20,000 iterations.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use tracing::{debug, trace, warn};

use crate::SimTime;

/// A waiter parked in the clock's queue.
#[derive(Debug)]
pub struct TimerEntry {
    time: SimTime,
    seq: u64,
    waker: Waker,
}

impl TimerEntry {
    pub(crate) fn time(&self) -> SimTime {
        self.time
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse the ordering for min-heap behavior in BinaryHeap; ties go to
        // the earlier registration so same-tick wakeups are deterministic.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct ClockState {
    now: SimTime,
    running: bool,
    next_seq: u64,
    timers: BinaryHeap<TimerEntry>,
}

/// Read-only view of a clock's time.
///
/// # Example
///
/// ```
/// # use tickharness_core::VirtualClock;
/// let clock = VirtualClock::new();
/// let clock_ref = clock.clock_ref();
/// assert_eq!(clock_ref.time(), clock.now());
/// ```
#[derive(Debug, Clone)]
pub struct ClockRef {
    state: Rc<RefCell<ClockState>>,
}

impl ClockRef {
    /// Return the current virtual time.
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.state.borrow().now
    }
}

/// Shared source of virtual time and the suspension primitive built on it.
///
/// Cloning yields another handle to the same clock. Each simulation owns its
/// own clock; nothing here is global.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    state: Rc<RefCell<ClockState>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset time to zero and begin accepting waits.
    ///
    /// Waiters left over from a previous run (e.g. a dropped [`Sleep`]) are
    /// discarded. A second `start` while the clock is already running leaves
    /// time and any pending waiters untouched.
    pub fn start(&self) {
        let mut state = self.state.borrow_mut();
        if state.running {
            warn!(now = %state.now, pending = state.timers.len(), "Clock already running, start ignored");
            return;
        }
        if !state.timers.is_empty() {
            debug!(stale = state.timers.len(), "Discarding waiters from the previous run");
            state.timers.clear();
        }
        state.now = SimTime::zero();
        state.running = true;
        debug!("Virtual clock started");
    }

    /// Halt tick progression. Waiters still queued are never fired.
    pub fn stop(&self) {
        let mut state = self.state.borrow_mut();
        state.running = false;
        debug!(now = %state.now, pending = state.timers.len(), "Virtual clock stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    /// Current virtual time. Never decreases while running.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.state.borrow().now
    }

    /// Number of waiters not yet woken.
    pub fn pending_waits(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Earliest pending wake time, if any.
    pub fn next_wake_time(&self) -> Option<SimTime> {
        self.state.borrow().timers.peek().map(TimerEntry::time)
    }

    #[must_use]
    pub fn clock_ref(&self) -> ClockRef {
        ClockRef {
            state: Rc::clone(&self.state),
        }
    }

    /// Suspend the caller for `ticks` virtual ticks.
    ///
    /// Zero, negative and non-finite durations complete on first poll without
    /// yielding.
    pub fn wait(&self, ticks: f64) -> Sleep {
        let target = if ticks.is_finite() && ticks > 0.0 {
            Some(SimTime::from_ticks_f64(ticks))
        } else {
            None
        };
        Sleep {
            clock: self.clone(),
            delay: target,
            deadline: None,
            registered: false,
        }
    }

    /// Suspend the caller until the clock reaches `time`.
    pub fn wait_until(&self, time: SimTime) -> Sleep {
        Sleep {
            clock: self.clone(),
            delay: None,
            deadline: Some(time),
            registered: false,
        }
    }

    fn register(&self, time: SimTime, waker: Waker) {
        let mut state = self.state.borrow_mut();
        state.next_seq += 1;
        let seq = state.next_seq;
        trace!(wake_at = %time, now = %state.now, seq, "Waiter registered");
        state.timers.push(TimerEntry { time, seq, waker });
    }

    /// Jump to the next pending wake time and wake everything due by then.
    ///
    /// Returns `false` when the clock is stopped or nothing is waiting, which
    /// means time cannot move any further.
    pub fn advance(&self) -> bool {
        let due = {
            let mut state = self.state.borrow_mut();
            if !state.running {
                return false;
            }
            let Some(next) = state.timers.peek().map(TimerEntry::time) else {
                return false;
            };
            if next > state.now {
                state.now = next;
            }
            let now = state.now;
            let mut due = Vec::new();
            while state.timers.peek().is_some_and(|t| t.time <= now) {
                if let Some(entry) = state.timers.pop() {
                    due.push(entry);
                }
            }
            debug!(now = %now, woken = due.len(), remaining = state.timers.len(), "Clock advanced");
            due
        };

        // Wake outside the borrow; wakers may poke the clock again.
        for entry in due {
            entry.waker.wake();
        }
        true
    }
}

/// Future returned by [`VirtualClock::wait`] and [`VirtualClock::wait_until`].
#[derive(Debug)]
pub struct Sleep {
    clock: VirtualClock,
    delay: Option<SimTime>,
    deadline: Option<SimTime>,
    registered: bool,
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let now = self.clock.now();

        // The deadline is fixed on first poll, when the waiter actually parks.
        if self.deadline.is_none() {
            match self.delay {
                Some(delay) => self.deadline = Some(now + delay),
                None => return Poll::Ready(()),
            }
        }
        let deadline = self.deadline.unwrap_or(now);

        if now >= deadline {
            Poll::Ready(())
        } else {
            if !self.registered {
                self.clock.register(deadline, cx.waker().clone());
                self.registered = true;
            }
            Poll::Pending
        }
    }
}
