//! Task wakers for the virtual-time runtime.
//!
//! Waking a task pushes its id onto the runtime's shared ready queue; the
//! runtime polls it on its next pass. The queue is behind `Arc<Mutex<_>>`
//! because `Waker` must be `Send + Sync`, even though everything runs on one
//! thread.
//!
//! # Usage
//!
//! ```rust,ignore
//! let waker = create_task_waker(ready_queue.clone(), task_id);
//! let mut cx = Context::from_waker(&waker);
//! let _ = future.as_mut().poll(&mut cx);
//! ```

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::task::{RawWaker, RawWakerVTable, Waker};

use crate::async_runtime::TaskId;

/// Ids of tasks waiting to be polled, deduplicated.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    inner: Mutex<ReadyInner>,
}

#[derive(Debug, Default)]
struct ReadyInner {
    order: VecDeque<TaskId>,
    queued: HashSet<TaskId>,
}

impl ReadyQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReadyInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue `task_id` unless it is already waiting. Constant time, so a whole
    /// tick's worth of wakeups stays linear.
    pub fn push(&self, task_id: TaskId) {
        let mut inner = self.lock();
        if inner.queued.insert(task_id) {
            inner.order.push_back(task_id);
        }
    }

    pub fn pop(&self) -> Option<TaskId> {
        let mut inner = self.lock();
        let task_id = inner.order.pop_front()?;
        inner.queued.remove(&task_id);
        Some(task_id)
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Arc-wrapped waker data for efficient cloning.
struct WakerData {
    ready: Arc<ReadyQueue>,
    task_id: TaskId,
}

impl WakerData {
    fn wake(&self) {
        self.ready.push(self.task_id);
    }
}

/// VTable for Arc-based task waker.
static TASK_WAKER_VTABLE: RawWakerVTable = RawWakerVTable::new(
    task_waker_clone,
    task_waker_wake,
    task_waker_wake_by_ref,
    task_waker_drop,
);

unsafe fn task_waker_clone(data: *const ()) -> RawWaker {
    Arc::increment_strong_count(data as *const WakerData);
    RawWaker::new(data, &TASK_WAKER_VTABLE)
}

unsafe fn task_waker_wake(data: *const ()) {
    let arc = Arc::from_raw(data as *const WakerData);
    arc.wake();
    // Arc is dropped here, decrementing ref count
}

unsafe fn task_waker_wake_by_ref(data: *const ()) {
    let waker_data = &*(data as *const WakerData);
    waker_data.wake();
}

unsafe fn task_waker_drop(data: *const ()) {
    drop(Arc::from_raw(data as *const WakerData));
}

/// Create a waker that re-queues `task_id` on `ready` when woken.
pub fn create_task_waker(ready: Arc<ReadyQueue>, task_id: TaskId) -> Waker {
    let arc = Arc::new(WakerData { ready, task_id });
    let raw_waker = RawWaker::new(Arc::into_raw(arc) as *const (), &TASK_WAKER_VTABLE);
    // SAFETY: the vtable functions above uphold the RawWaker contract for an
    // `Arc<WakerData>` pointer, and `WakerData` is `Send + Sync`.
    unsafe { Waker::from_raw(raw_waker) }
}
