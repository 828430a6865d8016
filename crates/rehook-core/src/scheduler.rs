//! Update batching and deferred work.
//!
//! State changes do not render immediately. They arm a batch
//! (`Idle -> Collecting`); the next flush (`Collecting -> Flushing`) applies
//! every queued update and performs at most one render pass, however many
//! updates arrived. Work scheduled while flushing lands in the next batch.
//!
//! Besides the update batch the scheduler holds two task lanes: passive
//! effects, run after a commit, and low-priority work (transitions and
//! deferred values), run when nothing more urgent is pending.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;

/// Batching state.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    /// Nothing pending.
    Idle,
    /// Updates queued, waiting for a flush.
    Collecting,
    /// A flush is applying updates and rendering.
    Flushing,
}

/// Handle to a queued task, used for cancellation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Task lanes, in priority order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Lane {
    Passive,
    Low,
}

pub(crate) struct Task {
    id: TaskId,
    run: Box<dyn FnOnce()>,
}

impl Task {
    pub(crate) fn run(self) {
        (self.run)()
    }
}

/// Counts render passes per time window.
#[derive(Debug)]
struct LoopGuard {
    limit: u32,
    window: Duration,
    passes: u32,
    window_start: Instant,
}

impl LoopGuard {
    fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            passes: 0,
            window_start: Instant::now(),
        }
    }

    fn record_pass(&mut self, now: Instant) -> Result<(), RuntimeError> {
        if now.duration_since(self.window_start) > self.window {
            self.window_start = now;
            self.passes = 0;
        }
        self.passes += 1;
        if self.passes > self.limit {
            return Err(RuntimeError::RenderLoopDetected {
                passes: self.passes,
                limit: self.limit,
                window: self.window,
            });
        }
        Ok(())
    }
}

struct SchedulerState {
    phase: Phase,
    updates: Vec<Box<dyn FnOnce()>>,
    render_requested: bool,
    passive: VecDeque<Task>,
    low: VecDeque<Task>,
    next_task: u64,
    guard: LoopGuard,
}

impl SchedulerState {
    /// Move to `Collecting` if idle. Returns `true` on the transition.
    fn arm(&mut self) -> bool {
        if self.phase == Phase::Idle {
            self.phase = Phase::Collecting;
            return true;
        }
        false
    }

    fn has_pending_batch(&self) -> bool {
        self.render_requested || !self.updates.is_empty()
    }
}

pub(crate) struct Scheduler {
    state: RefCell<SchedulerState>,
    waker: RefCell<Option<Rc<dyn Fn()>>>,
}

impl Scheduler {
    pub(crate) fn new(config: &RuntimeConfig) -> Self {
        Self {
            state: RefCell::new(SchedulerState {
                phase: Phase::Idle,
                updates: Vec::new(),
                render_requested: false,
                passive: VecDeque::new(),
                low: VecDeque::new(),
                next_task: 0,
                guard: LoopGuard::new(config.max_passes_per_second, config.loop_window),
            }),
            waker: RefCell::new(None),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    /// Ask for a render pass in the next flush.
    pub(crate) fn request_render(&self) {
        let armed = {
            let mut state = self.state.borrow_mut();
            state.render_requested = true;
            state.arm()
        };
        if armed {
            self.wake();
        }
    }

    /// Queue an update to run at the start of the next flush.
    pub(crate) fn enqueue_update(&self, update: Box<dyn FnOnce()>) {
        let armed = {
            let mut state = self.state.borrow_mut();
            state.updates.push(update);
            state.arm()
        };
        if armed {
            self.wake();
        }
    }

    pub(crate) fn queue(&self, lane: Lane, run: Box<dyn FnOnce()>) -> TaskId {
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_task += 1;
            let id = TaskId(state.next_task);
            let task = Task { id, run };
            match lane {
                Lane::Passive => state.passive.push_back(task),
                Lane::Low => state.low.push_back(task),
            }
            id
        };
        self.wake();
        id
    }

    /// Drop a queued task. Returns `false` if it already ran or was cancelled.
    pub(crate) fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.passive.len() + state.low.len();
        state.passive.retain(|t| t.id != id);
        state.low.retain(|t| t.id != id);
        before != state.passive.len() + state.low.len()
    }

    pub(crate) fn has_pending_batch(&self) -> bool {
        self.state.borrow().phase == Phase::Collecting
    }

    /// Start a flush, returning the queued updates.
    ///
    /// Fails when the render-loop guard trips; everything pending is dropped
    /// and the scheduler returns to `Idle`.
    pub(crate) fn begin_flush(&self) -> Result<Vec<Box<dyn FnOnce()>>, RuntimeError> {
        let mut state = self.state.borrow_mut();
        if let Err(err) = state.guard.record_pass(Instant::now()) {
            state.updates.clear();
            state.render_requested = false;
            state.phase = Phase::Idle;
            return Err(err);
        }
        state.phase = Phase::Flushing;
        Ok(std::mem::take(&mut state.updates))
    }

    pub(crate) fn take_render_request(&self) -> bool {
        std::mem::take(&mut self.state.borrow_mut().render_requested)
    }

    /// Finish a flush. Work that arrived during it arms the next batch.
    pub(crate) fn end_flush(&self) {
        let armed = {
            let mut state = self.state.borrow_mut();
            state.phase = if state.has_pending_batch() {
                Phase::Collecting
            } else {
                Phase::Idle
            };
            state.phase == Phase::Collecting
        };
        if armed {
            self.wake();
        }
    }

    pub(crate) fn take_passive(&self) -> Vec<Task> {
        self.state.borrow_mut().passive.drain(..).collect()
    }

    pub(crate) fn pop_low(&self) -> Option<Task> {
        self.state.borrow_mut().low.pop_front()
    }

    pub(crate) fn pending_tasks(&self, lane: Lane) -> usize {
        let state = self.state.borrow();
        match lane {
            Lane::Passive => state.passive.len(),
            Lane::Low => state.low.len(),
        }
    }

    pub(crate) fn set_waker(&self, waker: Rc<dyn Fn()>) {
        *self.waker.borrow_mut() = Some(waker);
    }

    /// Drop all pending work.
    pub(crate) fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.updates.clear();
        state.render_requested = false;
        state.passive.clear();
        state.low.clear();
        state.phase = Phase::Idle;
    }

    fn wake(&self) {
        let waker = self.waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn scheduler() -> Scheduler {
        Scheduler::new(&RuntimeConfig::default())
    }

    #[test]
    fn phases() {
        let scheduler = scheduler();
        assert_eq!(scheduler.phase(), Phase::Idle);

        scheduler.request_render();
        scheduler.request_render();
        assert_eq!(scheduler.phase(), Phase::Collecting);

        let updates = scheduler.begin_flush().unwrap();
        assert!(updates.is_empty());
        assert_eq!(scheduler.phase(), Phase::Flushing);
        assert!(scheduler.take_render_request());
        assert!(!scheduler.take_render_request());

        scheduler.end_flush();
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[test]
    fn work_during_flush_arms_next_batch() {
        let scheduler = scheduler();
        scheduler.request_render();
        scheduler.begin_flush().unwrap();
        scheduler.take_render_request();

        scheduler.request_render();
        assert_eq!(scheduler.phase(), Phase::Flushing);
        scheduler.end_flush();
        assert_eq!(scheduler.phase(), Phase::Collecting);
    }

    #[test]
    fn waker_fires_once_per_batch() {
        let scheduler = scheduler();
        let wakes = Rc::new(Cell::new(0));
        let counter = wakes.clone();
        scheduler.set_waker(Rc::new(move || counter.set(counter.get() + 1)));

        scheduler.request_render();
        scheduler.enqueue_update(Box::new(|| {}));
        scheduler.request_render();
        assert_eq!(wakes.get(), 1);
    }

    #[test]
    fn cancelled_tasks_never_run() {
        let scheduler = scheduler();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let id = scheduler.queue(Lane::Passive, Box::new(move || flag.set(true)));
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        for task in scheduler.take_passive() {
            task.run();
        }
        assert!(!ran.get());
    }

    #[test]
    fn loop_guard_trips_after_limit() {
        let scheduler = Scheduler::new(&RuntimeConfig::default().with_max_passes_per_second(3));
        for _ in 0..3 {
            scheduler.request_render();
            scheduler.begin_flush().unwrap();
            scheduler.end_flush();
        }
        scheduler.request_render();
        let Err(err) = scheduler.begin_flush() else {
            panic!("expected the loop guard to trip");
        };
        assert!(matches!(
            err,
            RuntimeError::RenderLoopDetected { passes: 4, limit: 3, .. }
        ));
        assert_eq!(scheduler.phase(), Phase::Idle);
    }

    #[test]
    fn loop_guard_window_resets() {
        let mut guard = LoopGuard::new(1, Duration::from_millis(10));
        let start = guard.window_start;
        guard.record_pass(start).unwrap();
        assert!(guard.record_pass(start).is_err());
        guard.record_pass(start + Duration::from_millis(20)).unwrap();
    }
}
