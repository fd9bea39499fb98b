//! Cooperative scheduling primitives.
//!
//! The runtime is single-threaded: every callback runs to completion on the
//! event loop. Timers and animation frames are requested through the
//! [`Scheduler`] trait so that the browser shell and the tests can supply
//! their own clock.

mod manual;

use std::cell::{Cell, RefCell};
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

pub use manual::{FRAME_MS, ManualScheduler};

/// Opaque handle for a scheduled callback.
pub type TaskId = u64;

/// Source of time, timeouts and animation frames.
pub trait Scheduler {
    /// Milliseconds on a monotonic wall clock.
    fn now_ms(&self) -> f64;

    /// Runs `task` once after `delay_ms`.
    fn set_timeout(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> TaskId;

    /// Runs `task` on the next animation frame with the frame timestamp.
    fn request_frame(&self, task: Box<dyn FnOnce(f64)>) -> TaskId;

    /// Cancels a pending timeout or frame. Unknown ids are ignored.
    fn cancel(&self, id: TaskId);
}

pub type SharedScheduler = Rc<dyn Scheduler>;

/// A one-shot timeout, cancelled when dropped.
pub struct TimeoutHandle {
    scheduler: SharedScheduler,
    id: Cell<Option<TaskId>>,
}

impl TimeoutHandle {
    pub fn schedule(
        scheduler: &SharedScheduler,
        delay_ms: u32,
        task: impl FnOnce() + 'static,
    ) -> Self {
        let id = scheduler.set_timeout(delay_ms, Box::new(task));
        Self {
            scheduler: Rc::clone(scheduler),
            id: Cell::new(Some(id)),
        }
    }

    pub fn cancel(&self) {
        if let Some(id) = self.id.take() {
            self.scheduler.cancel(id);
        }
    }
}

impl Drop for TimeoutHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for TimeoutHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutHandle")
            .field("id", &self.id.get())
            .finish()
    }
}

#[derive(Clone, Copy)]
enum Cadence {
    Interval(u32),
    Frame,
}

type Tick = Box<dyn FnMut(f64) -> ControlFlow<()>>;

struct RepeatState {
    scheduler: SharedScheduler,
    cadence: Cadence,
    pending: Cell<Option<TaskId>>,
    stopped: Cell<bool>,
    tick: RefCell<Tick>,
}

/// A self-rearming task with a single cancel handle.
///
/// The tick receives the current timestamp and returns
/// [`ControlFlow::Break`] to stop. Dropping the handle cancels the task.
pub struct RepeatingTask {
    state: Rc<RepeatState>,
}

impl RepeatingTask {
    /// Ticks every `interval_ms`, first tick one interval from now.
    pub fn every(
        scheduler: &SharedScheduler,
        interval_ms: u32,
        tick: impl FnMut(f64) -> ControlFlow<()> + 'static,
    ) -> Self {
        Self::start(scheduler, Cadence::Interval(interval_ms), Box::new(tick))
    }

    /// Ticks on every animation frame.
    pub fn every_frame(
        scheduler: &SharedScheduler,
        tick: impl FnMut(f64) -> ControlFlow<()> + 'static,
    ) -> Self {
        Self::start(scheduler, Cadence::Frame, Box::new(tick))
    }

    fn start(scheduler: &SharedScheduler, cadence: Cadence, tick: Tick) -> Self {
        let state = Rc::new(RepeatState {
            scheduler: Rc::clone(scheduler),
            cadence,
            pending: Cell::new(None),
            stopped: Cell::new(false),
            tick: RefCell::new(tick),
        });
        arm(&state);
        Self { state }
    }

    pub fn cancel(&self) {
        self.state.stopped.set(true);
        if let Some(id) = self.state.pending.take() {
            self.state.scheduler.cancel(id);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.state.stopped.get()
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn arm(state: &Rc<RepeatState>) {
    let weak = Rc::downgrade(state);
    let id = match state.cadence {
        Cadence::Interval(ms) => state
            .scheduler
            .set_timeout(ms, Box::new(move || fire(&weak, None))),
        Cadence::Frame => state
            .scheduler
            .request_frame(Box::new(move |ts| fire(&weak, Some(ts)))),
    };
    state.pending.set(Some(id));
}

fn fire(weak: &Weak<RepeatState>, frame_ts: Option<f64>) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    state.pending.set(None);
    if state.stopped.get() {
        return;
    }
    let now = frame_ts.unwrap_or_else(|| state.scheduler.now_ms());
    let flow = {
        let Ok(mut tick) = state.tick.try_borrow_mut() else {
            return;
        };
        tick(now)
    };
    if flow.is_continue() && !state.stopped.get() {
        arm(&state);
    } else {
        state.stopped.set(true);
    }
}

/// Shared slot holding the most recent value of a callback.
///
/// Scheduled work reads the slot when it fires, so replacing the callback
/// takes effect without rescheduling anything.
pub struct LatestCell<T: ?Sized> {
    inner: Rc<RefCell<Rc<T>>>,
}

impl<T: ?Sized> LatestCell<T> {
    pub fn new(value: Rc<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    pub fn replace(&self, value: Rc<T>) {
        *self.inner.borrow_mut() = value;
    }

    /// Clones out the current value; the cell is not borrowed afterwards.
    pub fn get(&self) -> Rc<T> {
        Rc::clone(&self.inner.borrow())
    }
}

impl<T: ?Sized> Clone for LatestCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Rc<ManualScheduler>, SharedScheduler) {
        let manual = Rc::new(ManualScheduler::new());
        let shared: SharedScheduler = manual.clone();
        (manual, shared)
    }

    #[test]
    fn test_timeout_fires_once() {
        let (clock, scheduler) = setup();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _handle = TimeoutHandle::schedule(&scheduler, 100, move || h.set(h.get() + 1));

        clock.advance(99.0);
        assert_eq!(hits.get(), 0);
        clock.advance(1.0);
        assert_eq!(hits.get(), 1);
        clock.advance(1000.0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_timeout_dropped_never_fires() {
        let (clock, scheduler) = setup();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let handle = TimeoutHandle::schedule(&scheduler, 100, move || h.set(h.get() + 1));
        drop(handle);
        clock.advance(500.0);
        assert_eq!(hits.get(), 0);
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn test_repeating_task_until_break() {
        let (clock, scheduler) = setup();
        let ticks = Rc::new(Cell::new(0));
        let t = Rc::clone(&ticks);
        let task = RepeatingTask::every(&scheduler, 1000, move |_| {
            t.set(t.get() + 1);
            if t.get() == 3 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        clock.advance(10_000.0);
        assert_eq!(ticks.get(), 3);
        assert!(!task.is_active());
        assert_eq!(clock.pending_timers(), 0);
    }

    #[test]
    fn test_repeating_task_cancel_stops_ticks() {
        let (clock, scheduler) = setup();
        let ticks = Rc::new(Cell::new(0));
        let t = Rc::clone(&ticks);
        let task = RepeatingTask::every(&scheduler, 500, move |_| {
            t.set(t.get() + 1);
            ControlFlow::Continue(())
        });

        clock.advance(1000.0);
        assert_eq!(ticks.get(), 2);
        task.cancel();
        clock.advance(5000.0);
        assert_eq!(ticks.get(), 2);
    }

    #[test]
    fn test_frame_task_receives_timestamps() {
        let (clock, scheduler) = setup();
        let stamps = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&stamps);
        let _task = RepeatingTask::every_frame(&scheduler, move |ts| {
            s.borrow_mut().push(ts);
            ControlFlow::Continue(())
        });

        clock.run_frames(3);
        let stamps = stamps.borrow();
        assert_eq!(stamps.len(), 3);
        assert!(stamps.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_latest_cell_replacement_seen_by_pending_work() {
        let (clock, scheduler) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let first_seen = Rc::clone(&seen);
        let cell: LatestCell<dyn Fn(&str)> =
            LatestCell::new(Rc::new(move |s: &str| first_seen.borrow_mut().push(format!("a:{s}"))));

        let reader = cell.clone();
        let _handle = TimeoutHandle::schedule(&scheduler, 10, move || (reader.get())("tick"));

        let second_seen = Rc::clone(&seen);
        cell.replace(Rc::new(move |s: &str| {
            second_seen.borrow_mut().push(format!("b:{s}"));
        }));
        clock.advance(10.0);

        assert_eq!(*seen.borrow(), vec!["b:tick".to_string()]);
    }
}
