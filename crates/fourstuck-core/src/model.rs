//! Authoritative game state as pushed by the server.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Player identifier assigned by the server.
pub type PlayerId = i64;

/// Puzzle instance identifier.
pub type PuzzleId = i64;

/// Game session identifier.
pub type SessionId = i64;

/// Lifecycle of a game session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Lobby,
    Countdown,
    Active,
    Finished,
    /// A status this client does not know about.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SessionInfo {
    pub id: SessionId,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub survival_time_seconds: Option<f64>,
    #[serde(default)]
    pub countdown_remaining: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamInfo {
    pub id: i64,
    pub name: String,
}

/// A teammate and their share of the survival pool.
///
/// Points are never clamped; zero or below means eliminated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub points: i64,
    #[serde(default)]
    pub color: Option<String>,
}

impl Player {
    pub fn is_eliminated(&self) -> bool {
        self.points <= 0
    }
}

/// The four puzzle families.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PuzzleKind {
    Memory,
    Spatial,
    Concentration,
    Multitasking,
}

impl PuzzleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Spatial => "spatial",
            Self::Concentration => "concentration",
            Self::Multitasking => "multitasking",
        }
    }
}

impl fmt::Display for PuzzleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PuzzleStatus {
    #[default]
    Active,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// A puzzle assigned to one player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PuzzleInstance {
    pub id: PuzzleId,
    pub user_id: PlayerId,
    #[serde(rename = "type")]
    pub kind: PuzzleKind,
    #[serde(default)]
    pub status: PuzzleStatus,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl PuzzleInstance {
    pub fn is_active(&self) -> bool {
        self.status == PuzzleStatus::Active
    }
}

/// Full team state, replaced wholesale on every push.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameStateSnapshot {
    pub session: SessionInfo,
    #[serde(default)]
    pub team: Option<TeamInfo>,
    pub players: Vec<Player>,
    #[serde(default)]
    pub puzzles: Vec<PuzzleInstance>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl GameStateSnapshot {
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// The active puzzle assigned to `user_id`, if the server included one.
    pub fn active_puzzle_for(&self, user_id: PlayerId) -> Option<&PuzzleInstance> {
        self.puzzles
            .iter()
            .find(|p| p.user_id == user_id && p.is_active())
    }
}
