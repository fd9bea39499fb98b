//! Hook owning the session runtime while the session page is mounted.

use std::rc::Rc;

use fourstuck_core::{PlayerId, SessionId};
use yew::prelude::*;

use crate::services::runtime::{SessionRuntime, SessionView};

#[derive(Clone, PartialEq)]
pub struct SessionHandle {
    pub runtime: SessionRuntime,
    pub view: SessionView,
}

/// Starts a runtime for `(session_id, user_id)` and re-renders on every
/// change it reports. The runtime is shut down on unmount or when either
/// id changes.
#[hook]
pub fn use_session(session_id: SessionId, user_id: PlayerId) -> SessionHandle {
    let runtime = use_memo((session_id, user_id), |&(session_id, user_id)| {
        SessionRuntime::browser(session_id, user_id)
    });
    let update = use_force_update();

    {
        let runtime = (*runtime).clone();
        use_effect_with(runtime, move |runtime| {
            let runtime = runtime.clone();
            runtime.set_observer(Rc::new(move || update.force_update()));
            runtime.start();
            move || runtime.shutdown()
        });
    }

    SessionHandle {
        view: runtime.view(),
        runtime: (*runtime).clone(),
    }
}
