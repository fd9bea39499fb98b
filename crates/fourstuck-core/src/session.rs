//! Session orchestration.
//!
//! [`SessionOrchestrator`] is the single owner of the current snapshot and of
//! "my active puzzle". Every input arrives as a [`SessionAction`]; the
//! orchestrator updates its state and answers with the [`SessionEffect`]s the
//! runtime must perform (network calls, timers, engine binding, storage).
//! Keeping side effects out of here makes the whole flow testable without a
//! browser.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::api::{SubmitAnswerRequest, SubmitAnswerResponse};
use crate::config::{ClientConfig, FetchRetryConfig};
use crate::engine::EngineKey;
use crate::error::{ApiError, ConnectionError};
use crate::model::{
    GameStateSnapshot, PlayerId, PuzzleId, PuzzleInstance, SessionId, SessionStatus,
};
use crate::palette::ColorScheme;
use crate::persist::PersistedSession;
use crate::protocol::PushNotification;
use crate::status::{GameStatus, StatusInfo, derive_status};
use crate::submission::{AnswerGuard, SubmitRejection};

const MAX_NOTIFICATIONS: usize = 5;
const MAX_POINT_CHANGES: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// The runtime is up; load whatever puzzle is already assigned.
    Start,
    ChannelOpened,
    ChannelClosed { code: u16, reason: String },
    ChannelError(ConnectionError),
    ReconnectExhausted { attempts: u32 },
    Snapshot(Rc<GameStateSnapshot>),
    Notification(PushNotification),
    PuzzleFetched(Result<Option<PuzzleInstance>, ApiError>),
    FetchRetryElapsed,
    AnswerReady {
        key: EngineKey,
        answer: String,
        now_ms: f64,
    },
    SubmitCompleted {
        puzzle_id: PuzzleId,
        result: Result<SubmitAnswerResponse, ApiError>,
    },
    ReturnToLobby,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    FetchPuzzle,
    ScheduleFetchRetry { delay_ms: u32 },
    Submit(SubmitAnswerRequest),
    /// Bind the engine driver to this puzzle, or unbind on `None`.
    BindEngine(Option<Rc<PuzzleInstance>>),
    Persist(PersistedSession),
    ClearPersistedSession,
    Disconnect,
}

/// Outcome of the last submission, shown next to the puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    Correct {
        points_awarded: Option<i64>,
        message: Option<String>,
    },
    Incorrect {
        message: Option<String>,
    },
    /// The server refused because the player has no points left.
    OutOfPoints(String),
    SubmitFailed(String),
}

impl Feedback {
    pub fn text(&self) -> String {
        match self {
            Self::Correct {
                points_awarded: Some(points),
                ..
            } => format!("Correct! +{points} points sent"),
            Self::Correct { .. } => "Correct!".to_string(),
            Self::Incorrect { .. } => "Incorrect.".to_string(),
            Self::OutOfPoints(_) => "You are out of points and cannot answer.".to_string(),
            Self::SubmitFailed(_) => "Failed to submit answer.".to_string(),
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Correct { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointChangeKind {
    /// Points received from a teammate's solved puzzle.
    Gain,
    /// The periodic single-point decay.
    Decay,
    Loss,
}

/// One entry of the point-transfer feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointChange {
    pub player_id: PlayerId,
    pub username: String,
    pub kind: PointChangeKind,
    pub amount: i64,
    /// Likely source of a gain: a teammate who lost points in the same update.
    pub counterpart: Option<String>,
}

impl PointChange {
    pub fn describe(&self) -> String {
        match (self.kind, &self.counterpart) {
            (PointChangeKind::Gain, Some(from)) => {
                format!("{from} gave {} points to {}", self.amount, self.username)
            }
            (PointChangeKind::Gain, None) => {
                format!("{} gained {} points", self.username, self.amount)
            }
            (PointChangeKind::Decay, _) => format!("{} lost 1 point (decay)", self.username),
            (PointChangeKind::Loss, _) => {
                format!("{} lost {} points", self.username, self.amount)
            }
        }
    }
}

/// Compares two consecutive snapshots. Players missing from `previous` are
/// skipped.
pub fn diff_points(previous: &GameStateSnapshot, current: &GameStateSnapshot) -> Vec<PointChange> {
    let before = |id: PlayerId| previous.player(id).map(|p| p.points);
    let mut changes = Vec::new();
    for player in &current.players {
        let Some(old) = before(player.id) else {
            continue;
        };
        let delta = player.points - old;
        if delta == 0 {
            continue;
        }
        let change = if delta > 0 {
            let counterpart = current
                .players
                .iter()
                .find(|other| other.id != player.id && before(other.id).is_some_and(|p| p > other.points))
                .map(|giver| giver.username.clone());
            PointChange {
                player_id: player.id,
                username: player.username.clone(),
                kind: PointChangeKind::Gain,
                amount: delta,
                counterpart,
            }
        } else {
            PointChange {
                player_id: player.id,
                username: player.username.clone(),
                kind: if delta == -1 {
                    PointChangeKind::Decay
                } else {
                    PointChangeKind::Loss
                },
                amount: -delta,
                counterpart: None,
            }
        };
        changes.push(change);
    }
    changes
}

pub struct SessionOrchestrator {
    user_id: PlayerId,
    session_id: SessionId,
    colors: ColorScheme,
    fetch_retry: FetchRetryConfig,
    guard: AnswerGuard,

    snapshot: Option<Rc<GameStateSnapshot>>,
    my_puzzle: Option<Rc<PuzzleInstance>>,
    channel_open: bool,
    status: StatusInfo,

    fetch_in_flight: bool,
    fetch_retries: u32,
    submitting: Option<PuzzleId>,
    persisted: Option<PersistedSession>,
    left: bool,

    feedback: Option<Feedback>,
    notifications: VecDeque<String>,
    point_changes: VecDeque<PointChange>,
}

impl SessionOrchestrator {
    pub fn new(
        config: &ClientConfig,
        user_id: PlayerId,
        session_id: SessionId,
        colors: ColorScheme,
    ) -> Self {
        Self {
            user_id,
            session_id,
            colors,
            fetch_retry: config.puzzle_fetch,
            guard: AnswerGuard::new(config.submission.min_gap_ms),
            snapshot: None,
            my_puzzle: None,
            channel_open: false,
            status: StatusInfo::default(),
            fetch_in_flight: false,
            fetch_retries: 0,
            submitting: None,
            persisted: None,
            left: false,
            feedback: None,
            notifications: VecDeque::new(),
            point_changes: VecDeque::new(),
        }
    }

    pub fn user_id(&self) -> PlayerId {
        self.user_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn colors(&self) -> &ColorScheme {
        &self.colors
    }

    pub fn snapshot(&self) -> Option<Rc<GameStateSnapshot>> {
        self.snapshot.clone()
    }

    pub fn my_puzzle(&self) -> Option<Rc<PuzzleInstance>> {
        self.my_puzzle.clone()
    }

    pub fn status(&self) -> &StatusInfo {
        &self.status
    }

    pub fn channel_open(&self) -> bool {
        self.channel_open
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    /// Newest first.
    pub fn notifications(&self) -> impl Iterator<Item = &str> {
        self.notifications.iter().map(String::as_str)
    }

    /// Newest first.
    pub fn point_changes(&self) -> impl Iterator<Item = &PointChange> {
        self.point_changes.iter()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.is_some()
    }

    pub fn has_left(&self) -> bool {
        self.left
    }

    pub fn dispatch(&mut self, action: SessionAction) -> Vec<SessionEffect> {
        if self.left {
            tracing::debug!(?action, "session left, ignoring action");
            return Vec::new();
        }
        let mut effects = Vec::new();
        match action {
            SessionAction::Start => self.request_fetch(&mut effects),
            SessionAction::ChannelOpened => {
                tracing::info!(session_id = self.session_id, "game channel open");
                self.channel_open = true;
            }
            SessionAction::ChannelClosed { code, reason } => {
                tracing::info!(code, %reason, "game channel closed");
                self.channel_open = false;
                self.notify("Connection closed".to_string());
            }
            SessionAction::ChannelError(error) => {
                self.notify(format!("Connection error: {error}"));
            }
            SessionAction::ReconnectExhausted { attempts } => {
                self.channel_open = false;
                self.notify(format!("Connection lost after {attempts} reconnection attempts"));
            }
            SessionAction::Snapshot(snapshot) => self.on_snapshot(snapshot, &mut effects),
            SessionAction::Notification(notification) => {
                let name = self.display_name(notification.user_id);
                self.notify(notification.describe(&name));
            }
            SessionAction::PuzzleFetched(result) => self.on_fetched(result, &mut effects),
            SessionAction::FetchRetryElapsed => {
                self.fetch_in_flight = false;
                if self.my_puzzle.is_none() && self.puzzles_expected() {
                    self.request_fetch(&mut effects);
                }
            }
            SessionAction::AnswerReady {
                key,
                answer,
                now_ms,
            } => match self.admit(key, &answer, now_ms) {
                Ok(()) => {
                    tracing::info!(puzzle_id = key.puzzle_id, kind = %key.kind, %answer, "submitting answer");
                    self.feedback = None;
                    self.submitting = Some(key.puzzle_id);
                    effects.push(SessionEffect::Submit(SubmitAnswerRequest {
                        puzzle_id: key.puzzle_id,
                        answer,
                        user_id: self.user_id,
                    }));
                }
                Err(rejection) => {
                    tracing::debug!(%rejection, "answer not submitted");
                }
            },
            SessionAction::SubmitCompleted { puzzle_id, result } => {
                self.on_submitted(puzzle_id, result, &mut effects);
            }
            SessionAction::ReturnToLobby => {
                tracing::info!(session_id = self.session_id, "returning to lobby");
                self.left = true;
                self.channel_open = false;
                if self.my_puzzle.take().is_some() {
                    effects.push(SessionEffect::BindEngine(None));
                }
                effects.push(SessionEffect::Disconnect);
                effects.push(SessionEffect::ClearPersistedSession);
            }
        }
        self.refresh_status();
        effects
    }

    fn on_snapshot(&mut self, snapshot: Rc<GameStateSnapshot>, effects: &mut Vec<SessionEffect>) {
        if let Some(previous) = &self.snapshot {
            for change in diff_points(previous, &snapshot) {
                self.point_changes.push_front(change);
            }
            self.point_changes.truncate(MAX_POINT_CHANGES);
        }
        let was_active = self
            .snapshot
            .as_ref()
            .is_some_and(|s| s.session.status == SessionStatus::Active);
        self.snapshot = Some(Rc::clone(&snapshot));

        if snapshot.session.status == SessionStatus::Active {
            if let Some(assigned) = snapshot.active_puzzle_for(self.user_id) {
                if self.my_puzzle.as_ref().map(|p| EngineKey::of(p)) != Some(EngineKey::of(assigned)) {
                    self.set_puzzle(Some(Rc::new(assigned.clone())), effects);
                }
            } else if let Some(current) = &self.my_puzzle {
                let finished = snapshot
                    .puzzles
                    .iter()
                    .any(|p| p.id == current.id && !p.is_active());
                if finished {
                    self.set_puzzle(None, effects);
                    self.request_fetch(effects);
                }
            } else if !was_active {
                self.fetch_retries = 0;
                self.request_fetch(effects);
            }
        } else if self.my_puzzle.is_some() {
            tracing::debug!(status = ?snapshot.session.status, "session not active, dropping puzzle");
            self.set_puzzle(None, effects);
        }

        if let Some(team) = &snapshot.team {
            let record = PersistedSession {
                username: snapshot.player(self.user_id).map(|p| p.username.clone()),
                team_id: Some(team.id),
                session_id: Some(self.session_id),
            };
            if self.persisted.as_ref() != Some(&record) {
                self.persisted = Some(record.clone());
                effects.push(SessionEffect::Persist(record));
            }
        }
    }

    fn on_fetched(
        &mut self,
        result: Result<Option<PuzzleInstance>, ApiError>,
        effects: &mut Vec<SessionEffect>,
    ) {
        self.fetch_in_flight = false;
        match result {
            Ok(Some(puzzle)) if puzzle.is_active() && puzzle.user_id == self.user_id => {
                self.fetch_retries = 0;
                if !self.puzzles_expected() {
                    tracing::debug!(puzzle_id = puzzle.id, "session not active, ignoring fetched puzzle");
                    return;
                }
                let unchanged = self
                    .my_puzzle
                    .as_ref()
                    .is_some_and(|p| EngineKey::of(p) == EngineKey::of(&puzzle));
                if !unchanged {
                    self.set_puzzle(Some(Rc::new(puzzle)), effects);
                }
            }
            Ok(_) | Err(ApiError::NoActivePuzzle) => self.retry_fetch(effects),
            Err(error) => {
                tracing::warn!(%error, "failed to load puzzle");
                self.notify(format!("Failed to load puzzle: {error}"));
            }
        }
    }

    fn retry_fetch(&mut self, effects: &mut Vec<SessionEffect>) {
        if self.my_puzzle.is_some() || !self.puzzles_expected() {
            return;
        }
        if self.fetch_retries < self.fetch_retry.max_attempts {
            self.fetch_retries += 1;
            // Held until FetchRetryElapsed so snapshots don't start a parallel fetch.
            self.fetch_in_flight = true;
            tracing::debug!(attempt = self.fetch_retries, "no puzzle yet, retrying");
            effects.push(SessionEffect::ScheduleFetchRetry {
                delay_ms: self.fetch_retry.delay_ms,
            });
        } else {
            tracing::debug!("no puzzle assigned, waiting");
            self.fetch_retries = 0;
        }
    }

    fn on_submitted(
        &mut self,
        puzzle_id: PuzzleId,
        result: Result<SubmitAnswerResponse, ApiError>,
        effects: &mut Vec<SessionEffect>,
    ) {
        if self.submitting == Some(puzzle_id) {
            self.submitting = None;
        }
        let next = match result {
            Ok(response) => {
                tracing::info!(puzzle_id, correct = response.correct, "answer processed");
                self.feedback = Some(if response.correct {
                    Feedback::Correct {
                        points_awarded: response.points_awarded,
                        message: response.message,
                    }
                } else {
                    Feedback::Incorrect {
                        message: response.message,
                    }
                });
                response
                    .next_puzzle
                    .filter(|p| p.is_active() && p.user_id == self.user_id)
            }
            Err(ApiError::OutOfPoints(detail)) => {
                tracing::info!(puzzle_id, %detail, "answer refused, player out of points");
                self.notify("You are out of points".to_string());
                self.feedback = Some(Feedback::OutOfPoints(detail));
                if self.my_puzzle.is_some() {
                    self.set_puzzle(None, effects);
                }
                return;
            }
            Err(error) => {
                tracing::warn!(puzzle_id, %error, "answer submission failed");
                if error != ApiError::NoActivePuzzle {
                    self.feedback = Some(Feedback::SubmitFailed(error.to_string()));
                }
                None
            }
        };

        if !self.puzzles_expected() {
            return;
        }
        match next {
            Some(puzzle) => self.set_puzzle(Some(Rc::new(puzzle)), effects),
            None => {
                let answered = self.my_puzzle.as_ref().is_some_and(|p| p.id == puzzle_id);
                if answered {
                    self.set_puzzle(None, effects);
                }
                if self.my_puzzle.is_none() {
                    self.fetch_retries = 0;
                    self.request_fetch(effects);
                }
            }
        }
    }

    fn admit(&mut self, key: EngineKey, answer: &str, now_ms: f64) -> Result<(), SubmitRejection> {
        let current = self
            .my_puzzle
            .as_ref()
            .filter(|p| EngineKey::of(p) == key)
            .ok_or(SubmitRejection::NotCurrentPuzzle(key.puzzle_id))?;
        if self.status.is_eliminated {
            return Err(SubmitRejection::Eliminated);
        }
        self.guard.admit(current.id, key.kind, answer, now_ms)
    }

    fn set_puzzle(&mut self, puzzle: Option<Rc<PuzzleInstance>>, effects: &mut Vec<SessionEffect>) {
        if let Some(p) = &puzzle {
            tracing::info!(puzzle_id = p.id, kind = %p.kind, "puzzle assigned");
        }
        self.my_puzzle.clone_from(&puzzle);
        effects.push(SessionEffect::BindEngine(puzzle));
    }

    fn request_fetch(&mut self, effects: &mut Vec<SessionEffect>) {
        if self.fetch_in_flight {
            return;
        }
        self.fetch_in_flight = true;
        effects.push(SessionEffect::FetchPuzzle);
    }

    /// Before the first snapshot the session state is unknown and a puzzle
    /// may already be waiting.
    fn puzzles_expected(&self) -> bool {
        self.snapshot
            .as_ref()
            .is_none_or(|s| s.session.status == SessionStatus::Active)
    }

    fn display_name(&self, user_id: Option<PlayerId>) -> String {
        match user_id {
            Some(id) => self
                .snapshot
                .as_ref()
                .and_then(|s| s.player(id))
                .map_or_else(|| format!("Player {id}"), |p| p.username.clone()),
            None => "Someone".to_string(),
        }
    }

    fn notify(&mut self, line: String) {
        self.notifications.push_front(line);
        self.notifications.truncate(MAX_NOTIFICATIONS);
    }

    fn refresh_status(&mut self) {
        self.status = match &self.snapshot {
            Some(snapshot) => derive_status(
                snapshot,
                self.user_id,
                self.my_puzzle.is_some(),
                self.channel_open,
            ),
            None => StatusInfo {
                status: GameStatus::Loading,
                ..StatusInfo::default()
            },
        };
    }
}
