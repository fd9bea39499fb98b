//! Deterministic virtual clock.

use std::cell::RefCell;

use super::{Scheduler, TaskId};

/// Frame spacing used by [`ManualScheduler::run_frames`] (60 Hz).
pub const FRAME_MS: f64 = 1000.0 / 60.0;

struct Timer {
    id: TaskId,
    due: f64,
    task: Box<dyn FnOnce()>,
}

struct Frame {
    id: TaskId,
    task: Box<dyn FnOnce(f64)>,
}

#[derive(Default)]
struct ClockState {
    now: f64,
    next_id: TaskId,
    timers: Vec<Timer>,
    frames: Vec<Frame>,
}

/// Scheduler driven explicitly by the caller.
///
/// Time only moves inside [`advance`](Self::advance) and
/// [`run_frames`](Self::run_frames). Callbacks run with the internal state
/// released, so they may schedule or cancel further work.
#[derive(Default)]
pub struct ManualScheduler {
    state: RefCell<ClockState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward, firing due timers in deadline order.
    pub fn advance(&self, ms: f64) {
        let target = self.state.borrow().now + ms;
        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let earliest = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)))
                    .map(|(idx, _)| idx);
                earliest.map(|idx| {
                    let timer = state.timers.remove(idx);
                    state.now = state.now.max(timer.due);
                    timer.task
                })
            };
            match next {
                Some(task) => task(),
                None => break,
            }
        }
        self.state.borrow_mut().now = target;
    }

    /// Runs `count` animation frames, advancing the clock by [`FRAME_MS`]
    /// before each one.
    pub fn run_frames(&self, count: usize) {
        for _ in 0..count {
            self.advance(FRAME_MS);
            let (now, frames) = {
                let mut state = self.state.borrow_mut();
                (state.now, std::mem::take(&mut state.frames))
            };
            for frame in frames {
                (frame.task)(now);
            }
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    fn next_id(state: &mut ClockState) -> TaskId {
        state.next_id += 1;
        state.next_id
    }
}

impl Scheduler for ManualScheduler {
    fn now_ms(&self) -> f64 {
        self.state.borrow().now
    }

    fn set_timeout(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> TaskId {
        let mut state = self.state.borrow_mut();
        let id = Self::next_id(&mut state);
        let due = state.now + f64::from(delay_ms);
        state.timers.push(Timer { id, due, task });
        id
    }

    fn request_frame(&self, task: Box<dyn FnOnce(f64)>) -> TaskId {
        let mut state = self.state.borrow_mut();
        let id = Self::next_id(&mut state);
        state.frames.push(Frame { id, task });
        id
    }

    fn cancel(&self, id: TaskId) {
        let mut state = self.state.borrow_mut();
        state.timers.retain(|t| t.id != id);
        state.frames.retain(|f| f.id != id);
    }
}
