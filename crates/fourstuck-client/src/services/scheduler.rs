//! `setTimeout` / `requestAnimationFrame` backed scheduler.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use fourstuck_core::Scheduler;
use fourstuck_core::schedule::TaskId;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

#[derive(Debug, Clone, Copy)]
enum BrowserHandle {
    Timeout(i32),
    Frame(i32),
}

/// Callbacks free themselves after running; the map only tracks what can
/// still be cancelled.
#[derive(Default)]
pub struct BrowserScheduler {
    next_id: Cell<TaskId>,
    pending: Rc<RefCell<HashMap<TaskId, BrowserHandle>>>,
}

impl BrowserScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> TaskId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn track(&self, id: TaskId, handle: Result<BrowserHandle, wasm_bindgen::JsValue>) {
        match handle {
            Ok(handle) => {
                self.pending.borrow_mut().insert(id, handle);
            }
            Err(err) => tracing::warn!(?err, "failed to schedule browser task"),
        }
    }
}

impl Scheduler for BrowserScheduler {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }

    fn set_timeout(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> TaskId {
        let id = self.next_id();
        let Some(window) = web_sys::window() else {
            tracing::warn!("no window, timeout dropped");
            return id;
        };
        let pending = Rc::clone(&self.pending);
        let callback = Closure::once_into_js(move || {
            pending.borrow_mut().remove(&id);
            task();
        });
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        let handle = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
            .map(BrowserHandle::Timeout);
        self.track(id, handle);
        id
    }

    fn request_frame(&self, task: Box<dyn FnOnce(f64)>) -> TaskId {
        let id = self.next_id();
        let Some(window) = web_sys::window() else {
            tracing::warn!("no window, frame dropped");
            return id;
        };
        let pending = Rc::clone(&self.pending);
        // Frame timestamps are on the performance clock; ticks use now_ms's.
        let callback = Closure::once_into_js(move |_timestamp: f64| {
            pending.borrow_mut().remove(&id);
            task(js_sys::Date::now());
        });
        let handle = window
            .request_animation_frame(callback.unchecked_ref())
            .map(BrowserHandle::Frame);
        self.track(id, handle);
        id
    }

    fn cancel(&self, id: TaskId) {
        let Some(handle) = self.pending.borrow_mut().remove(&id) else {
            return;
        };
        let Some(window) = web_sys::window() else {
            return;
        };
        match handle {
            BrowserHandle::Timeout(handle) => window.clear_timeout_with_handle(handle),
            BrowserHandle::Frame(handle) => {
                let _ = window.cancel_animation_frame(handle);
            }
        }
    }
}
