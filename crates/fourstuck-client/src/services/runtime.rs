//! Session runtime: wires connection, orchestrator, engine driver and cursor
//! sharing together and performs the orchestrator's effects.
//!
//! Socket events, timers, frames and HTTP completions all enter through one
//! dispatch or the engine sink. Borrows are released before effects run, so
//! effects may re-enter freely.

use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use fourstuck_core::cursor::{PointerPublisher, RenderedCursor};
use fourstuck_core::engine::PuzzleInput;
use fourstuck_core::persist::{KeyValueStore, PersistedSession};
use fourstuck_core::schedule::SharedScheduler;
use fourstuck_core::session::{Feedback, PointChange};
use fourstuck_core::{
    ClientConfig, ColorScheme, ConnectionEvent, ConnectionManager, CursorOverlay, EngineDriver,
    EngineEvent, EngineKey, GameStateSnapshot, LatestCell, PlayerId, PlayfieldGeometry, Point,
    PuzzleEngine, PuzzleInstance, RepeatingTask, SessionAction, SessionEffect, SessionId,
    SessionOrchestrator, StatusInfo, TimeoutHandle, Transport, ViewportInfo,
};

use super::http::{HttpPuzzleApi, PuzzleApi};
use super::scheduler::BrowserScheduler;
use super::socket::WebSocketTransport;
use super::storage::{LocalStore, load_config, page_origin};

/// Everything a view needs for one render.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub status: StatusInfo,
    pub snapshot: Option<Rc<GameStateSnapshot>>,
    pub my_puzzle: Option<Rc<PuzzleInstance>>,
    pub engine: Option<(EngineKey, PuzzleEngine)>,
    pub engine_error: Option<String>,
    pub feedback: Option<Feedback>,
    pub submitting: bool,
    pub notifications: Vec<String>,
    pub point_changes: Vec<PointChange>,
    pub colors: ColorScheme,
}

struct RuntimeInner {
    config: ClientConfig,
    user_id: PlayerId,
    session_id: SessionId,
    scheduler: SharedScheduler,
    connection: ConnectionManager,
    driver: EngineDriver,
    publisher: PointerPublisher,
    api: Box<dyn PuzzleApi>,
    store: Rc<dyn KeyValueStore>,
    orchestrator: RefCell<SessionOrchestrator>,
    cursors: RefCell<CursorOverlay>,
    engine_error: RefCell<Option<(EngineKey, String)>>,
    fetch_retry: RefCell<Option<TimeoutHandle>>,
    sweep: RefCell<Option<RepeatingTask>>,
    observer: LatestCell<dyn Fn()>,
}

/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct SessionRuntime {
    inner: Rc<RuntimeInner>,
}

impl PartialEq for SessionRuntime {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl SessionRuntime {
    pub fn new(
        config: ClientConfig,
        user_id: PlayerId,
        session_id: SessionId,
        scheduler: SharedScheduler,
        transport: Box<dyn Transport>,
        api: Box<dyn PuzzleApi>,
        store: Rc<dyn KeyValueStore>,
    ) -> Self {
        let connection = ConnectionManager::new(
            transport,
            Rc::clone(&scheduler),
            config.endpoints.clone(),
            config.reconnect,
        );
        let driver = EngineDriver::new(Rc::clone(&scheduler), config.engines);
        let publisher = PointerPublisher::new(
            Rc::clone(&scheduler),
            connection.clone(),
            user_id,
            config.cursor,
        );
        let inner = Rc::new(RuntimeInner {
            orchestrator: RefCell::new(SessionOrchestrator::new(
                &config,
                user_id,
                session_id,
                ColorScheme::default(),
            )),
            cursors: RefCell::new(CursorOverlay::new(user_id, config.cursor.stale_after_ms)),
            config,
            user_id,
            session_id,
            scheduler,
            connection,
            driver,
            publisher,
            api,
            store,
            engine_error: RefCell::new(None),
            fetch_retry: RefCell::new(None),
            sweep: RefCell::new(None),
            observer: LatestCell::new(Rc::new(|| {})),
        });

        let weak = Rc::downgrade(&inner);
        inner.connection.set_listener(Rc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_connection(event);
            }
        }));
        let weak = Rc::downgrade(&inner);
        inner.driver.set_sink(Rc::new(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.on_engine(event);
            }
        }));

        Self { inner }
    }

    /// Runtime on the page's timers, WebSocket, LocalStorage and fetch.
    pub fn browser(session_id: SessionId, user_id: PlayerId) -> Self {
        let store: Rc<dyn KeyValueStore> = Rc::new(LocalStore);
        let config = load_config(store.as_ref(), page_origin().as_deref());
        let api = HttpPuzzleApi::new(config.endpoints.api_base.clone());
        Self::new(
            config,
            user_id,
            session_id,
            Rc::new(BrowserScheduler::new()),
            Box::new(WebSocketTransport::new()),
            Box::new(api),
            store,
        )
    }

    /// Called after every state change that may affect the view.
    pub fn set_observer(&self, observer: Rc<dyn Fn()>) {
        self.inner.observer.replace(observer);
    }

    /// Opens the push channel and loads the current puzzle.
    pub fn start(&self) {
        tracing::info!(
            session_id = self.inner.session_id,
            user_id = self.inner.user_id,
            "starting session runtime"
        );
        self.inner.connection.connect(self.inner.session_id);
        let weak = Rc::downgrade(&self.inner);
        let sweep = RepeatingTask::every(
            &self.inner.scheduler,
            self.inner.config.cursor.sweep_interval_ms,
            move |now| {
                let Some(inner) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                let removed = inner.cursors.borrow_mut().sweep(now);
                if removed > 0 {
                    inner.changed();
                }
                ControlFlow::Continue(())
            },
        );
        *self.inner.sweep.borrow_mut() = Some(sweep);
        self.inner.dispatch(SessionAction::Start);
    }

    /// Stops timers and closes the channel without touching stored state.
    pub fn shutdown(&self) {
        self.inner.teardown();
        self.inner.observer.replace(Rc::new(|| {}));
    }

    pub fn return_to_lobby(&self) {
        self.inner.dispatch(SessionAction::ReturnToLobby);
    }

    pub fn input(&self, input: PuzzleInput) {
        self.inner.driver.input(input);
    }

    pub fn pointer_moved(
        &self,
        pointer: Point,
        geometry: PlayfieldGeometry,
        viewport: ViewportInfo,
    ) {
        if self.inner.connection.is_open() {
            self.inner.publisher.pointer_moved(pointer, geometry, viewport);
        }
    }

    pub fn cursors(
        &self,
        geometry: &PlayfieldGeometry,
        viewport: &ViewportInfo,
    ) -> Vec<RenderedCursor> {
        let orchestrator = self.inner.orchestrator.borrow();
        let snapshot = orchestrator.snapshot();
        self.inner.cursors.borrow().render(
            geometry,
            viewport,
            self.inner.config.cursor.glyph_size,
            snapshot.as_deref(),
            orchestrator.colors(),
        )
    }

    pub fn glyph_size(&self) -> f64 {
        self.inner.config.cursor.glyph_size
    }

    pub fn user_id(&self) -> PlayerId {
        self.inner.user_id
    }

    pub fn view(&self) -> SessionView {
        let orchestrator = self.inner.orchestrator.borrow();
        SessionView {
            status: orchestrator.status().clone(),
            snapshot: orchestrator.snapshot(),
            my_puzzle: orchestrator.my_puzzle(),
            engine: self.inner.driver.key().zip(self.inner.driver.engine()),
            engine_error: self.inner.engine_error.borrow().as_ref().map(|(_, e)| e.clone()),
            feedback: orchestrator.feedback().cloned(),
            submitting: orchestrator.is_submitting(),
            notifications: orchestrator.notifications().map(str::to_string).collect(),
            point_changes: orchestrator.point_changes().cloned().collect(),
            colors: orchestrator.colors().clone(),
        }
    }
}

impl RuntimeInner {
    fn dispatch(self: &Rc<Self>, action: SessionAction) {
        let effects = self.orchestrator.borrow_mut().dispatch(action);
        for effect in effects {
            self.run(effect);
        }
        self.changed();
    }

    fn run(self: &Rc<Self>, effect: SessionEffect) {
        match effect {
            SessionEffect::FetchPuzzle => {
                let weak = Rc::downgrade(self);
                self.api.current_puzzle(
                    self.user_id,
                    Box::new(move |result| {
                        redispatch(&weak, SessionAction::PuzzleFetched(result));
                    }),
                );
            }
            SessionEffect::ScheduleFetchRetry { delay_ms } => {
                let weak = Rc::downgrade(self);
                let handle = TimeoutHandle::schedule(&self.scheduler, delay_ms, move || {
                    redispatch(&weak, SessionAction::FetchRetryElapsed);
                });
                *self.fetch_retry.borrow_mut() = Some(handle);
            }
            SessionEffect::Submit(request) => {
                let weak = Rc::downgrade(self);
                let puzzle_id = request.puzzle_id;
                self.api.submit_answer(
                    request,
                    Box::new(move |result| {
                        redispatch(&weak, SessionAction::SubmitCompleted { puzzle_id, result });
                    }),
                );
            }
            SessionEffect::BindEngine(puzzle) => {
                // The driver stays silent when the rejected puzzle is bound again.
                let next = puzzle.as_deref().map(EngineKey::of);
                let stale = self
                    .engine_error
                    .borrow()
                    .as_ref()
                    .is_some_and(|(key, _)| Some(*key) != next);
                if stale {
                    self.engine_error.borrow_mut().take();
                }
                self.driver.bind(puzzle.as_deref());
            }
            SessionEffect::Persist(record) => record.save(self.store.as_ref()),
            SessionEffect::ClearPersistedSession => {
                PersistedSession::clear_game(self.store.as_ref());
            }
            SessionEffect::Disconnect => self.teardown(),
        }
    }

    fn on_connection(self: &Rc<Self>, event: ConnectionEvent) {
        let action = match event {
            ConnectionEvent::Connected => SessionAction::ChannelOpened,
            ConnectionEvent::Closed { code, reason } => {
                SessionAction::ChannelClosed { code, reason }
            }
            ConnectionEvent::Error(error) => SessionAction::ChannelError(error),
            ConnectionEvent::StateUpdate(snapshot) => SessionAction::Snapshot(snapshot),
            ConnectionEvent::Notification(notification) => {
                SessionAction::Notification(notification)
            }
            ConnectionEvent::ReconnectExhausted { attempts } => {
                SessionAction::ReconnectExhausted { attempts }
            }
            ConnectionEvent::RemoteCursor(sample) => {
                let now = self.scheduler.now_ms();
                if self.cursors.borrow_mut().record(sample, now) {
                    self.changed();
                }
                return;
            }
        };
        self.dispatch(action);
    }

    fn on_engine(self: &Rc<Self>, event: EngineEvent) {
        match event {
            EngineEvent::Answer { key, answer } => {
                let now_ms = self.scheduler.now_ms();
                self.dispatch(SessionAction::AnswerReady {
                    key,
                    answer,
                    now_ms,
                });
            }
            EngineEvent::Interaction { key, kind, data } => {
                if !self.connection.is_open() {
                    tracing::debug!(?kind, "channel closed, interaction not shared");
                    return;
                }
                if let Err(err) =
                    self.connection
                        .send_puzzle_interaction(self.user_id, key.puzzle_id, kind, data)
                {
                    tracing::warn!("failed to share interaction: {err}");
                }
            }
            EngineEvent::Invalid { key, error } => {
                tracing::warn!(puzzle_id = key.puzzle_id, "puzzle cannot be played: {error}");
                *self.engine_error.borrow_mut() = Some((key, error.to_string()));
                self.changed();
            }
            EngineEvent::Updated(_) | EngineEvent::RevealEnded(_) => self.changed(),
        }
    }

    fn teardown(&self) {
        self.connection.disconnect();
        self.driver.unbind();
        self.publisher.cancel();
        self.sweep.borrow_mut().take();
        self.fetch_retry.borrow_mut().take();
        self.cursors.borrow_mut().clear();
    }

    fn changed(&self) {
        (self.observer.get())();
    }
}

fn redispatch(weak: &Weak<RuntimeInner>, action: SessionAction) {
    if let Some(inner) = weak.upgrade() {
        inner.dispatch(action);
    }
}
