//! Virtual-time async runtime.
//!
//! Lets simulation code use `async`/`await` while every suspension is measured
//! in virtual ticks rather than wall-clock time.
//!
//! # Overview
//!
//! The runtime is single-threaded and cooperative. Tasks are polled only when
//! woken. When no task is ready the runtime asks the [`VirtualClock`] to jump to
//! the next pending wake time; when the clock has nothing left to fire and the
//! main future is still pending, the run has stalled and [`Runtime::block_on`]
//! returns [`SimError::Stalled`].
//!
//! # Basic Usage
//!
//! ```
//! use tickharness_core::async_runtime::Runtime;
//! use tickharness_core::{SimTime, VirtualClock};
//!
//! let clock = VirtualClock::new();
//! clock.start();
//! let runtime = Runtime::new();
//!
//! let sleeper = clock.clone();
//! let waited = runtime
//!     .block_on(&clock, async move {
//!         sleeper.wait(100.0).await;
//!         sleeper.wait(50.0).await;
//!         sleeper.now()
//!     })
//!     .unwrap();
//! assert_eq!(waited, SimTime::from_ticks(150));
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use tracing::{debug, instrument, trace, warn};

use crate::error::SimError;
use crate::scheduler::VirtualClock;
use crate::waker::{create_task_waker, ReadyQueue};

/// Unique identifier for async tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// A suspended async task.
struct Task {
    future: Pin<Box<dyn Future<Output = ()>>>,
}

struct RuntimeInner {
    next_task_id: Cell<u64>,
    tasks: RefCell<HashMap<TaskId, Task>>,
    ready: Arc<ReadyQueue>,
}

impl RuntimeInner {
    fn spawn<F, T>(&self, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        let task_id = TaskId(self.next_task_id.get());
        self.next_task_id.set(task_id.0 + 1);

        let state = Rc::new(RefCell::new(JoinState::default()));
        let completion = Rc::clone(&state);
        let task = Task {
            future: Box::pin(async move {
                let output = future.await;
                let waker = {
                    let mut state = completion.borrow_mut();
                    state.output = Some(output);
                    state.waker.take()
                };
                if let Some(waker) = waker {
                    waker.wake();
                }
            }),
        };

        self.tasks.borrow_mut().insert(task_id, task);
        self.ready.push(task_id);
        trace!(%task_id, task_count = self.tasks.borrow().len(), "Spawned async task");

        JoinHandle { task_id, state }
    }

    /// Poll one task. Returns `true` if it completed.
    fn poll_task(&self, task_id: TaskId) -> bool {
        // Take the task out so it can spawn siblings while being polled.
        let Some(mut task) = self.tasks.borrow_mut().remove(&task_id) else {
            return false;
        };

        let waker = create_task_waker(Arc::clone(&self.ready), task_id);
        let mut cx = Context::from_waker(&waker);

        match task.future.as_mut().poll(&mut cx) {
            Poll::Ready(()) => {
                trace!(%task_id, "Async task completed");
                true
            }
            Poll::Pending => {
                self.tasks.borrow_mut().insert(task_id, task);
                false
            }
        }
    }

    /// Poll until the ready queue drains. Returns the number of completions.
    fn run_ready(&self) -> usize {
        let mut completed = 0;
        while let Some(task_id) = self.ready.pop() {
            if self.poll_task(task_id) {
                completed += 1;
            }
        }
        completed
    }
}

/// Single-threaded executor driven by a [`VirtualClock`].
///
/// # Usage Pattern
///
/// 1. Create a runtime with `Runtime::new()`
/// 2. Hand out [`RuntimeHandle`]s to code that needs to spawn
/// 3. Drive everything with [`Runtime::block_on`]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                next_task_id: Cell::new(0),
                tasks: RefCell::new(HashMap::new()),
                ready: ReadyQueue::new(),
            }),
        }
    }

    /// A cloneable handle for spawning from inside running tasks.
    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Spawn a task. It is first polled on the next pass of [`Runtime::block_on`].
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        self.inner.spawn(future)
    }

    /// Get the number of unfinished tasks.
    pub fn task_count(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    pub fn has_tasks(&self) -> bool {
        self.task_count() > 0
    }

    /// Run `future` to completion, advancing `clock` whenever nothing is ready.
    ///
    /// Other spawned tasks keep running alongside; any still unfinished when
    /// `future` completes stay in the runtime.
    #[instrument(skip(self, clock, future), fields(start = %clock.now()))]
    pub fn block_on<F, T>(&self, clock: &VirtualClock, future: F) -> Result<T, SimError>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        let mut main = self.inner.spawn(future);
        let mut completed = 0usize;
        let mut advances = 0u64;

        loop {
            completed += self.inner.run_ready();

            if let Some(output) = main.try_take() {
                debug!(completed, advances, end = %clock.now(), "Main future finished");
                return Ok(output);
            }

            if !clock.advance() {
                let pending_tasks = self.task_count();
                if !clock.is_running() {
                    warn!(pending_tasks, now = %clock.now(), "Clock stopped with work outstanding");
                    return Err(SimError::ClockStopped);
                }
                warn!(pending_tasks, now = %clock.now(), "No runnable task and no pending wait");
                return Err(SimError::Stalled {
                    time: clock.now(),
                    pending_tasks,
                });
            }
            advances += 1;
        }
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Unfinished tasks may hold handles back onto the runtime.
        let tasks = std::mem::take(&mut *self.inner.tasks.borrow_mut());
        drop(tasks);
    }
}

/// Cloneable spawn handle onto a [`Runtime`].
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Rc<RuntimeInner>,
}

impl RuntimeHandle {
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<T>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        self.inner.spawn(future)
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("tasks", &self.inner.tasks.borrow().len())
            .finish()
    }
}

struct JoinState<T> {
    output: Option<T>,
    waker: Option<Waker>,
}

impl<T> Default for JoinState<T> {
    fn default() -> Self {
        Self {
            output: None,
            waker: None,
        }
    }
}

/// Resolves to the output of a spawned task.
pub struct JoinHandle<T> {
    task_id: TaskId,
    state: Rc<RefCell<JoinState<T>>>,
}

impl<T> JoinHandle<T> {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn is_finished(&self) -> bool {
        self.state.borrow().output.is_some()
    }

    fn try_take(&mut self) -> Option<T> {
        self.state.borrow_mut().output.take()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut state = self.state.borrow_mut();
        match state.output.take() {
            Some(output) => Poll::Ready(output),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
