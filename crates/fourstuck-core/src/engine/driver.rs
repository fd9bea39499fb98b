use std::cell::{Cell, RefCell};
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use serde_json::{Value, json};

use crate::config::EngineConfig;
use crate::cursor::Point;
use crate::model::PuzzleInstance;
use crate::protocol::InteractionKind;
use crate::schedule::{LatestCell, RepeatingTask, SharedScheduler};

use super::spatial::SpatialOutcome;
use super::{EngineEvent, EngineKey, PuzzleEngine};

const COUNTDOWN_TICK_MS: u32 = 1000;

/// User input routed to the bound engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PuzzleInput {
    /// Concentration: click the current pair.
    Click,
    /// Memory: choose a color.
    SelectColor(String),
    /// Multitasking: click a cell.
    GridClick { row: usize, col: usize },
    /// Spatial: pointer in playfield coordinates.
    PointerDown(Point),
    PointerMove(Point),
    PointerUp,
}

struct Binding {
    key: EngineKey,
    engine: PuzzleEngine,
    task: Option<RepeatingTask>,
    answered: bool,
}

impl Binding {
    /// Records the answer unless one was already produced.
    fn answer(&mut self, answer: Option<String>, events: &mut Vec<EngineEvent>) -> bool {
        let Some(answer) = answer else {
            return false;
        };
        if self.answered {
            return false;
        }
        self.answered = true;
        self.task = None;
        events.push(EngineEvent::Answer {
            key: self.key,
            answer,
        });
        true
    }
}

struct DriverInner {
    scheduler: SharedScheduler,
    config: EngineConfig,
    sink: LatestCell<dyn Fn(EngineEvent)>,
    binding: RefCell<Option<Binding>>,
    // Puzzle whose payload failed to build, so repeats are skipped.
    rejected: Cell<Option<EngineKey>>,
}

/// Owns the engine for the current puzzle and its timer.
#[derive(Clone)]
pub struct EngineDriver {
    inner: Rc<DriverInner>,
}

impl EngineDriver {
    pub fn new(scheduler: SharedScheduler, config: EngineConfig) -> Self {
        Self {
            inner: Rc::new(DriverInner {
                scheduler,
                config,
                sink: LatestCell::new(Rc::new(|_| {})),
                binding: RefCell::new(None),
                rejected: Cell::new(None),
            }),
        }
    }

    pub fn set_sink(&self, sink: Rc<dyn Fn(EngineEvent)>) {
        self.inner.sink.replace(sink);
    }

    pub fn key(&self) -> Option<EngineKey> {
        self.inner.binding.borrow().as_ref().map(|b| b.key)
    }

    /// Copy of the bound engine's state for rendering.
    pub fn engine(&self) -> Option<PuzzleEngine> {
        self.inner.binding.borrow().as_ref().map(|b| b.engine.clone())
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .binding
            .borrow()
            .as_ref()
            .and_then(|b| b.task.as_ref())
            .is_some_and(RepeatingTask::is_active)
    }

    /// Binds `puzzle`, or unbinds with `None`.
    ///
    /// Rebinding the same kind and id keeps the running engine, and a
    /// puzzle whose data was already rejected is not rebuilt.
    pub fn bind(&self, puzzle: Option<&PuzzleInstance>) {
        let Some(puzzle) = puzzle else {
            self.unbind();
            return;
        };
        let key = EngineKey::of(puzzle);
        if self.key() == Some(key) || self.inner.rejected.get() == Some(key) {
            return;
        }
        self.unbind();

        let now = self.inner.scheduler.now_ms();
        let engine = match PuzzleEngine::build(puzzle, &self.inner.config, now) {
            Ok(engine) => engine,
            Err(error) => {
                tracing::warn!(puzzle_id = key.puzzle_id, kind = %key.kind, "unusable puzzle data: {error}");
                self.inner.rejected.set(Some(key));
                self.emit(EngineEvent::Invalid { key, error });
                return;
            }
        };
        tracing::debug!(puzzle_id = key.puzzle_id, kind = %key.kind, "engine bound");

        let mut events = vec![EngineEvent::Interaction {
            key,
            kind: InteractionKind::Start,
            data: json!({ "puzzle_type": key.kind.as_str() }),
        }];
        let task = self.start_task(key, &engine);
        let reveal_done = matches!(&engine, PuzzleEngine::Memory(m) if m.is_reveal_complete());
        *self.inner.binding.borrow_mut() = Some(Binding {
            key,
            engine,
            task,
            answered: false,
        });
        if reveal_done {
            events.push(EngineEvent::RevealEnded(key));
        }
        events.push(EngineEvent::Updated(key));
        self.emit_all(events);
    }

    /// Drops the binding and cancels its timer.
    pub fn unbind(&self) {
        self.inner.rejected.set(None);
        let old = self.inner.binding.borrow_mut().take();
        drop(old);
    }

    pub fn input(&self, input: PuzzleInput) {
        let events = {
            let mut slot = self.inner.binding.borrow_mut();
            let Some(binding) = slot.as_mut() else {
                return;
            };
            apply_input(binding, input)
        };
        self.emit_all(events);
    }

    fn start_task(&self, key: EngineKey, engine: &PuzzleEngine) -> Option<RepeatingTask> {
        let weak = Rc::downgrade(&self.inner);
        let tick = move |now: f64| on_tick(&weak, key, now);
        let scheduler = &self.inner.scheduler;
        match engine {
            PuzzleEngine::Memory(m) if m.is_reveal_complete() => None,
            PuzzleEngine::Memory(_) | PuzzleEngine::Multitasking(_) => {
                Some(RepeatingTask::every(scheduler, COUNTDOWN_TICK_MS, tick))
            }
            PuzzleEngine::Concentration(c) => {
                Some(RepeatingTask::every(scheduler, c.data().interval_ms(), tick))
            }
            PuzzleEngine::Spatial(_) => Some(RepeatingTask::every_frame(scheduler, tick)),
        }
    }

    fn emit(&self, event: EngineEvent) {
        (self.inner.sink.get())(event);
    }

    fn emit_all(&self, events: Vec<EngineEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

fn on_tick(weak: &Weak<DriverInner>, key: EngineKey, now: f64) -> ControlFlow<()> {
    let Some(inner) = weak.upgrade() else {
        return ControlFlow::Break(());
    };
    let driver = EngineDriver { inner };

    let (flow, events) = {
        let mut slot = driver.inner.binding.borrow_mut();
        let Some(binding) = slot.as_mut().filter(|b| b.key == key) else {
            return ControlFlow::Break(());
        };
        let mut events = Vec::new();
        let step = advance_engine(&mut binding.engine, now);
        if step.reveal_ended {
            events.push(EngineEvent::RevealEnded(key));
        }
        if binding.answer(step.answer, &mut events) {
            if let Some((kind, data)) = step.telemetry {
                events.push(EngineEvent::Interaction { key, kind, data });
            }
        }
        events.push(EngineEvent::Updated(key));
        let flow = if step.done {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        };
        (flow, events)
    };

    driver.emit_all(events);
    flow
}

#[derive(Default)]
struct Step {
    done: bool,
    reveal_ended: bool,
    answer: Option<String>,
    telemetry: Option<(InteractionKind, Value)>,
}

fn advance_engine(engine: &mut PuzzleEngine, now: f64) -> Step {
    match engine {
        PuzzleEngine::Memory(m) => {
            let ended = m.tick(now);
            Step {
                done: ended,
                reveal_ended: ended,
                ..Step::default()
            }
        }
        PuzzleEngine::Concentration(c) => Step {
            answer: c.advance(),
            done: c.is_complete(),
            telemetry: Some((InteractionKind::Timeout, Value::Null)),
            ..Step::default()
        },
        PuzzleEngine::Multitasking(g) => Step {
            answer: g.tick(now),
            done: g.is_finished(),
            telemetry: Some((InteractionKind::Timeout, Value::Null)),
            ..Step::default()
        },
        PuzzleEngine::Spatial(s) => match s.step() {
            Some(outcome) => {
                Step {
                    done: true,
                    answer: Some(outcome.answer().to_string()),
                    telemetry: Some((
                        InteractionKind::Complete,
                        json!({ "result": outcome.answer() }),
                    )),
                    ..Step::default()
                }
            }
            None => Step::default(),
        },
    }
}

fn apply_input(binding: &mut Binding, input: PuzzleInput) -> Vec<EngineEvent> {
    let key = binding.key;
    let mut events = Vec::new();
    let mut changed = false;
    let mut answer = None;
    let mut on_answer = None;

    match input {
        PuzzleInput::Click => {
            if let PuzzleEngine::Concentration(c) = &mut binding.engine {
                answer = c.click();
                if answer.is_some() {
                    changed = true;
                    events.push(EngineEvent::Interaction {
                        key,
                        kind: InteractionKind::Click,
                        data: json!({ "pair_index": c.clicked_index() }),
                    });
                }
            }
        }
        PuzzleInput::SelectColor(color) => {
            if let PuzzleEngine::Memory(m) = &mut binding.engine {
                answer = m.select(&color);
                if answer.is_some() {
                    changed = true;
                    events.push(EngineEvent::Interaction {
                        key,
                        kind: InteractionKind::Click,
                        data: json!({ "color": color }),
                    });
                }
            }
        }
        PuzzleInput::GridClick { row, col } => {
            if let PuzzleEngine::Multitasking(g) = &mut binding.engine {
                if !g.is_finished() {
                    answer = g.click(row, col);
                    changed = true;
                    events.push(EngineEvent::Interaction {
                        key,
                        kind: InteractionKind::Click,
                        data: json!({ "row": row, "col": col }),
                    });
                    on_answer = Some(EngineEvent::Interaction {
                        key,
                        kind: InteractionKind::Complete,
                        data: Value::Null,
                    });
                }
            }
        }
        PuzzleInput::PointerDown(p) => {
            if let PuzzleEngine::Spatial(s) = &mut binding.engine {
                changed = s.begin_drag(p);
            }
        }
        PuzzleInput::PointerMove(p) => {
            if let PuzzleEngine::Spatial(s) = &mut binding.engine {
                changed = s.is_dragging();
                s.drag_to(p);
            }
        }
        PuzzleInput::PointerUp => {
            if let PuzzleEngine::Spatial(s) = &mut binding.engine {
                if s.end_drag() {
                    changed = true;
                    let circle = s.circle();
                    events.push(EngineEvent::Interaction {
                        key,
                        kind: InteractionKind::Drag,
                        data: json!({ "x": circle.x, "y": circle.y }),
                    });
                }
            }
        }
    }

    if binding.answer(answer, &mut events) {
        events.extend(on_answer);
    }
    if changed {
        events.push(EngineEvent::Updated(key));
    } else {
        tracing::trace!(kind = %key.kind, "input ignored");
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spatial::{COLLISION_ANSWER, SOLVED_ANSWER};
    use crate::model::{PuzzleKind, PuzzleStatus};
    use crate::schedule::ManualScheduler;

    struct Harness {
        clock: Rc<ManualScheduler>,
        driver: EngineDriver,
        events: Rc<RefCell<Vec<EngineEvent>>>,
    }

    impl Harness {
        fn answers(&self) -> Vec<String> {
            self.events
                .borrow()
                .iter()
                .filter_map(|e| match e {
                    EngineEvent::Answer { answer, .. } => Some(answer.clone()),
                    _ => None,
                })
                .collect()
        }

        fn count(&self, pred: impl Fn(&EngineEvent) -> bool) -> usize {
            self.events.borrow().iter().filter(|e| pred(e)).count()
        }
    }

    fn harness(config: EngineConfig) -> Harness {
        let clock = Rc::new(ManualScheduler::new());
        let driver = EngineDriver::new(clock.clone(), config);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        driver.set_sink(Rc::new(move |e| sink.borrow_mut().push(e)));
        Harness {
            clock,
            driver,
            events,
        }
    }

    fn puzzle(id: i64, kind: PuzzleKind, data: Value) -> PuzzleInstance {
        PuzzleInstance {
            id,
            user_id: 1,
            kind,
            status: PuzzleStatus::Active,
            data,
        }
    }

    fn memory(id: i64) -> PuzzleInstance {
        puzzle(
            id,
            PuzzleKind::Memory,
            json!({"mapping": {"1": "red", "2": "blue"}, "question_number": 2, "choices": ["red", "blue"]}),
        )
    }

    fn concentration(id: i64) -> PuzzleInstance {
        puzzle(
            id,
            PuzzleKind::Concentration,
            json!({
                "pairs": [
                    {"color_word": "red", "circle_color": "blue", "is_match": false},
                    {"color_word": "blue", "circle_color": "blue", "is_match": true},
                    {"color_word": "green", "circle_color": "red", "is_match": false}
                ],
                "duration": 1
            }),
        )
    }

    #[test]
    fn test_memory_reveal_ends_once() {
        let h = harness(EngineConfig::default());
        h.driver.bind(Some(&memory(1)));
        h.clock.advance(4000.0);
        assert_eq!(h.count(|e| matches!(e, EngineEvent::RevealEnded(_))), 0);
        h.clock.advance(1000.0);
        h.clock.advance(10_000.0);
        assert_eq!(h.count(|e| matches!(e, EngineEvent::RevealEnded(_))), 1);
        assert!(!h.driver.is_running());

        h.driver.input(PuzzleInput::SelectColor("blue".into()));
        h.driver.input(PuzzleInput::SelectColor("red".into()));
        assert_eq!(h.answers(), vec!["blue".to_string()]);
    }

    #[test]
    fn test_memory_zero_duration_ends_at_bind() {
        let h = harness(EngineConfig {
            memory_reveal_secs: 0,
            ..EngineConfig::default()
        });
        h.driver.bind(Some(&memory(1)));
        assert_eq!(h.count(|e| matches!(e, EngineEvent::RevealEnded(_))), 1);
        assert_eq!(h.clock.pending_timers(), 0);
    }

    #[test]
    fn test_rebinding_same_puzzle_keeps_state() {
        let h = harness(EngineConfig::default());
        let p = memory(1);
        h.driver.bind(Some(&p));
        h.clock.advance(3000.0);
        h.driver.bind(Some(&p));
        h.clock.advance(2000.0);
        assert_eq!(h.count(|e| matches!(e, EngineEvent::RevealEnded(_))), 1);
    }

    #[test]
    fn test_new_puzzle_resets_and_cancels_old_timer() {
        let h = harness(EngineConfig::default());
        h.driver.bind(Some(&concentration(1)));
        h.clock.advance(1000.0);
        h.driver.bind(Some(&concentration(2)));
        assert_eq!(h.clock.pending_timers(), 1);
        let Some(PuzzleEngine::Concentration(c)) = h.driver.engine() else {
            panic!("expected concentration engine");
        };
        assert_eq!(c.current_pair_index(), 0);

        h.clock.advance(10_000.0);
        let timeouts: Vec<EngineKey> = h
            .events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Answer { key, .. } => Some(*key),
                _ => None,
            })
            .collect();
        assert_eq!(timeouts.len(), 1);
        assert_eq!(timeouts[0].puzzle_id, 2);
    }

    #[test]
    fn test_concentration_timeout_and_click() {
        let h = harness(EngineConfig::default());
        h.driver.bind(Some(&concentration(1)));
        h.clock.advance(3000.0);
        assert_eq!(h.answers(), vec!["timeout".to_string()]);
        assert!(!h.driver.is_running());

        let h = harness(EngineConfig::default());
        h.driver.bind(Some(&concentration(1)));
        h.clock.advance(1000.0);
        h.driver.input(PuzzleInput::Click);
        h.driver.input(PuzzleInput::Click);
        h.clock.advance(5000.0);
        assert_eq!(h.answers(), vec!["1".to_string()]);
        assert_eq!(h.clock.pending_timers(), 0);
    }

    #[test]
    fn test_multitasking_solve_stops_timer() {
        let h = harness(EngineConfig::default());
        h.driver.bind(Some(&puzzle(
            5,
            PuzzleKind::Multitasking,
            json!({"rows": 2, "digitsPerRow": 4, "timeLimit": 3, "sixPositions": [1, 3]}),
        )));
        h.driver.input(PuzzleInput::GridClick { row: 0, col: 1 });
        h.driver.input(PuzzleInput::GridClick { row: 1, col: 3 });
        assert_eq!(h.answers(), vec![SOLVED_ANSWER.to_string()]);
        h.clock.advance(10_000.0);
        assert_eq!(h.answers().len(), 1);
        assert_eq!(h.clock.pending_timers(), 0);
    }

    #[test]
    fn test_multitasking_timeout() {
        let h = harness(EngineConfig::default());
        h.driver.bind(Some(&puzzle(
            5,
            PuzzleKind::Multitasking,
            json!({"rows": 1, "digitsPerRow": 4, "timeLimit": 3, "sixPositions": [1]}),
        )));
        h.clock.advance(3000.0);
        assert_eq!(h.answers(), vec!["timeout".to_string()]);
    }

    #[test]
    fn test_spatial_collision_answer_once() {
        let h = harness(EngineConfig::default());
        h.driver.bind(Some(&puzzle(3, PuzzleKind::Spatial, json!({}))));
        h.driver.input(PuzzleInput::PointerDown(Point::new(200.0, 40.0)));
        h.driver.input(PuzzleInput::PointerMove(Point::new(40.0, 310.0)));
        h.clock.run_frames(5);
        assert_eq!(h.answers(), vec![COLLISION_ANSWER.to_string()]);
        assert_eq!(h.clock.pending_frames(), 0);
        assert_eq!(
            h.count(|e| matches!(
                e,
                EngineEvent::Interaction { kind: InteractionKind::Complete, data, .. }
                    if data["result"] == COLLISION_ANSWER
            )),
            1
        );
        assert_eq!(
            h.count(|e| matches!(
                e,
                EngineEvent::Interaction { kind: InteractionKind::Timeout, .. }
            )),
            0
        );
    }

    #[test]
    fn test_invalid_data_reports_and_stays_unbound() {
        let h = harness(EngineConfig::default());
        h.driver.bind(Some(&puzzle(4, PuzzleKind::Memory, json!({"mapping": {}}))));
        assert!(h.driver.key().is_none());
        assert_eq!(h.count(|e| matches!(e, EngineEvent::Invalid { .. })), 1);
    }

    #[test]
    fn test_rejected_payload_not_rebuilt() {
        let h = harness(EngineConfig::default());
        let bad = puzzle(4, PuzzleKind::Memory, json!({"mapping": {}}));
        h.driver.bind(Some(&bad));
        h.driver.bind(Some(&bad));
        assert_eq!(h.count(|e| matches!(e, EngineEvent::Invalid { .. })), 1);

        h.driver.bind(Some(&memory(5)));
        assert_eq!(h.driver.key().map(|k| k.puzzle_id), Some(5));

        // A later assignment of the same puzzle is checked again.
        h.driver.bind(Some(&bad));
        assert_eq!(h.count(|e| matches!(e, EngineEvent::Invalid { .. })), 2);
    }

    #[test]
    fn test_sink_may_rebind_reentrantly() {
        let h = harness(EngineConfig::default());
        let driver = h.driver.clone();
        let events = Rc::clone(&h.events);
        h.driver.set_sink(Rc::new(move |e| {
            let is_answer = matches!(e, EngineEvent::Answer { .. });
            events.borrow_mut().push(e);
            if is_answer {
                driver.bind(Some(&memory(99)));
            }
        }));
        h.driver.bind(Some(&concentration(1)));
        h.clock.advance(3000.0);
        assert_eq!(h.driver.key().map(|k| k.puzzle_id), Some(99));
    }
}
