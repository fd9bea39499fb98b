//! Drives connection, orchestrator and engine driver together on a virtual
//! clock, the way the browser runtime wires them.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fourstuck_core::api::{SubmitAnswerRequest, SubmitAnswerResponse};
use fourstuck_core::config::ClientConfig;
use fourstuck_core::connection::RecordingTransport;
use fourstuck_core::engine::PuzzleInput;
use fourstuck_core::persist::{KeyValueStore, MemoryStore, PersistedSession};
use fourstuck_core::schedule::SharedScheduler;
use fourstuck_core::{
    ApiError, ColorScheme, ConnectionEvent, ConnectionManager, EngineDriver, EngineEvent,
    GameStatus, ManualScheduler, PlayerId, Scheduler, SessionAction, SessionEffect,
    SessionOrchestrator, TimeoutHandle, TransportEvent,
};
use serde_json::{Value, json};

const ME: PlayerId = 1;
const SESSION: i64 = 42;

struct Flow {
    clock: Rc<ManualScheduler>,
    scheduler: SharedScheduler,
    transport: RecordingTransport,
    connection: ConnectionManager,
    driver: EngineDriver,
    session: RefCell<SessionOrchestrator>,
    store: MemoryStore,
    fetches: Cell<usize>,
    submits: RefCell<Vec<SubmitAnswerRequest>>,
    retry: RefCell<Option<TimeoutHandle>>,
}

impl Flow {
    fn new() -> Rc<Self> {
        let config = ClientConfig::default();
        let clock = Rc::new(ManualScheduler::new());
        let scheduler: SharedScheduler = clock.clone();
        let transport = RecordingTransport::new();
        let connection = ConnectionManager::new(
            Box::new(transport.clone()),
            Rc::clone(&scheduler),
            config.endpoints.clone(),
            config.reconnect,
        );
        let driver = EngineDriver::new(Rc::clone(&scheduler), config.engines);
        let flow = Rc::new(Self {
            clock,
            scheduler,
            transport,
            connection,
            driver,
            session: RefCell::new(SessionOrchestrator::new(
                &config,
                ME,
                SESSION,
                ColorScheme::default(),
            )),
            store: MemoryStore::new(),
            fetches: Cell::new(0),
            submits: RefCell::new(Vec::new()),
            retry: RefCell::new(None),
        });

        let weak = Rc::downgrade(&flow);
        flow.connection.set_listener(Rc::new(move |event| {
            let Some(flow) = weak.upgrade() else { return };
            let action = match event {
                ConnectionEvent::Connected => SessionAction::ChannelOpened,
                ConnectionEvent::Closed { code, reason } => {
                    SessionAction::ChannelClosed { code, reason }
                }
                ConnectionEvent::Error(error) => SessionAction::ChannelError(error),
                ConnectionEvent::StateUpdate(snapshot) => SessionAction::Snapshot(snapshot),
                ConnectionEvent::Notification(n) => SessionAction::Notification(n),
                ConnectionEvent::ReconnectExhausted { attempts } => {
                    SessionAction::ReconnectExhausted { attempts }
                }
                ConnectionEvent::RemoteCursor(_) => return,
            };
            flow.dispatch(action);
        }));

        let weak = Rc::downgrade(&flow);
        flow.driver.set_sink(Rc::new(move |event| {
            let Some(flow) = weak.upgrade() else { return };
            match event {
                EngineEvent::Answer { key, answer } => flow.dispatch(SessionAction::AnswerReady {
                    key,
                    answer,
                    now_ms: flow.clock.now_ms(),
                }),
                EngineEvent::Interaction { key, kind, data } => {
                    let _ = flow
                        .connection
                        .send_puzzle_interaction(ME, key.puzzle_id, kind, data);
                }
                _ => {}
            }
        }));
        flow
    }

    fn dispatch(self: &Rc<Self>, action: SessionAction) {
        let effects = self.session.borrow_mut().dispatch(action);
        for effect in effects {
            self.run(effect);
        }
    }

    fn run(self: &Rc<Self>, effect: SessionEffect) {
        match effect {
            SessionEffect::FetchPuzzle => self.fetches.set(self.fetches.get() + 1),
            SessionEffect::ScheduleFetchRetry { delay_ms } => {
                let weak = Rc::downgrade(self);
                let handle = TimeoutHandle::schedule(&self.scheduler, delay_ms, move || {
                    if let Some(flow) = weak.upgrade() {
                        flow.dispatch(SessionAction::FetchRetryElapsed);
                    }
                });
                *self.retry.borrow_mut() = Some(handle);
            }
            SessionEffect::Submit(request) => self.submits.borrow_mut().push(request),
            SessionEffect::BindEngine(puzzle) => self.driver.bind(puzzle.as_deref()),
            SessionEffect::Persist(record) => record.save(&self.store),
            SessionEffect::ClearPersistedSession => PersistedSession::clear_game(&self.store),
            SessionEffect::Disconnect => self.connection.disconnect(),
        }
    }

    fn status(&self) -> GameStatus {
        self.session.borrow().status().status
    }

    fn open(&self) {
        self.connection.connect(SESSION);
        self.transport.deliver(TransportEvent::Opened);
    }

    fn push_state(&self, points: &[i64], puzzles: &Value) {
        let players: Vec<Value> = points
            .iter()
            .enumerate()
            .map(|(i, p)| json!({"id": i + 1, "username": format!("p{}", i + 1), "points": p}))
            .collect();
        let message = json!({
            "type": "state_update",
            "timestamp": "2025-01-01T00:00:00Z",
            "data": {
                "session": {"id": SESSION, "status": "active"},
                "team": {"id": 7, "name": "Owls"},
                "players": players,
                "puzzles": puzzles,
            }
        });
        self.transport.deliver_text(&message.to_string());
    }

    fn interactions(&self) -> Vec<String> {
        self.transport
            .sent_json()
            .into_iter()
            .filter(|m| m["type"] == "puzzle_interaction")
            .filter_map(|m| m["interaction_type"].as_str().map(str::to_string))
            .collect()
    }
}

fn grid_puzzle(id: i64) -> Value {
    json!({
        "id": id,
        "user_id": ME,
        "type": "multitasking",
        "status": "active",
        "data": {"rows": 1, "digitsPerRow": 3, "timeLimit": 10, "sixPositions": [1]}
    })
}

#[test]
fn test_solve_and_submit_round() {
    let flow = Flow::new();
    flow.open();
    assert_eq!(
        flow.transport.opened_urls(),
        vec!["ws://localhost:8000/ws/game/42".to_string()]
    );

    flow.push_state(&[10, 10], &json!([grid_puzzle(5)]));
    assert_eq!(flow.status(), GameStatus::Active);
    assert_eq!(flow.driver.key().map(|k| k.puzzle_id), Some(5));
    assert_eq!(flow.interactions(), vec!["start"]);
    assert_eq!(
        PersistedSession::load(&flow.store),
        PersistedSession {
            username: Some("p1".into()),
            team_id: Some(7),
            session_id: Some(SESSION),
        }
    );

    flow.driver.input(PuzzleInput::GridClick { row: 0, col: 0 });
    assert!(flow.submits.borrow().is_empty());
    flow.driver.input(PuzzleInput::GridClick { row: 0, col: 1 });
    assert_eq!(
        *flow.submits.borrow(),
        vec![SubmitAnswerRequest {
            puzzle_id: 5,
            answer: "solved".into(),
            user_id: ME,
        }]
    );
    assert_eq!(flow.interactions(), vec!["start", "click", "click", "complete"]);

    flow.dispatch(SessionAction::SubmitCompleted {
        puzzle_id: 5,
        result: Ok(SubmitAnswerResponse {
            correct: true,
            points_awarded: Some(3),
            awarded_to_user_id: Some(2),
            message: None,
            next_puzzle_id: None,
            next_puzzle: None,
        }),
    });
    assert!(flow.driver.key().is_none());
    assert_eq!(flow.fetches.get(), 1);
    assert_eq!(flow.status(), GameStatus::Waiting);
}

#[test]
fn test_grid_timeout_submits_once() {
    let flow = Flow::new();
    flow.open();
    flow.push_state(&[10], &json!([grid_puzzle(5)]));
    flow.clock.advance(9_000.0);
    assert!(flow.submits.borrow().is_empty());
    flow.clock.advance(1_000.0);
    flow.clock.advance(5_000.0);
    let submits = flow.submits.borrow();
    assert_eq!(submits.len(), 1);
    assert_eq!(submits[0].answer, "timeout");
}

#[test]
fn test_missing_puzzle_retried_on_clock() {
    let flow = Flow::new();
    flow.open();
    flow.dispatch(SessionAction::Start);
    assert_eq!(flow.fetches.get(), 1);

    for expected in 2..=4 {
        flow.dispatch(SessionAction::PuzzleFetched(Err(ApiError::NoActivePuzzle)));
        flow.clock.advance(999.0);
        assert_eq!(flow.fetches.get(), expected - 1);
        flow.clock.advance(1.0);
        assert_eq!(flow.fetches.get(), expected);
    }
    flow.dispatch(SessionAction::PuzzleFetched(Ok(None)));
    flow.clock.advance(5_000.0);
    assert_eq!(flow.fetches.get(), 4);

    flow.push_state(&[10, 10], &json!([]));
    assert_eq!(flow.status(), GameStatus::Waiting);
}

#[test]
fn test_reconnect_exhaustion_reaches_session() {
    let flow = Flow::new();
    flow.open();
    flow.push_state(&[10], &json!([]));

    for attempt in 1..=5u32 {
        flow.transport.deliver(TransportEvent::Closed {
            code: 1006,
            reason: String::new(),
        });
        assert_eq!(flow.status(), GameStatus::Loading);
        flow.clock.advance(f64::from(attempt * 1000));
    }
    assert_eq!(flow.transport.opened_urls().len(), 6);
    flow.transport.deliver(TransportEvent::Closed {
        code: 1006,
        reason: String::new(),
    });
    flow.clock.advance(60_000.0);
    assert_eq!(flow.transport.opened_urls().len(), 6);
    let session = flow.session.borrow();
    assert_eq!(
        session.notifications().next(),
        Some("Connection lost after 5 reconnection attempts")
    );
}

#[test]
fn test_return_to_lobby_tears_down() {
    let flow = Flow::new();
    flow.open();
    flow.push_state(&[10], &json!([grid_puzzle(5)]));
    assert!(flow.driver.is_running());

    flow.dispatch(SessionAction::ReturnToLobby);
    assert!(flow.driver.key().is_none());
    assert!(!flow.connection.is_open());
    assert_eq!(flow.transport.close_count(), 1);
    assert_eq!(flow.store.get("username").as_deref(), Some("p1"));
    assert_eq!(flow.store.get("sessionId"), None);

    flow.clock.advance(20_000.0);
    assert!(flow.submits.borrow().is_empty());
}
