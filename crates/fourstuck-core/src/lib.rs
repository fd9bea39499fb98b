//! 4stuck Core Library
//!
//! Client-side synchronization core for the 4stuck survival puzzle game.
//!
//! Everything here is target independent: the browser shell plugs in a
//! [`schedule::Scheduler`], a [`connection::Transport`] and a
//! [`persist::KeyValueStore`], while tests drive the same code with
//! [`schedule::ManualScheduler`] and in-memory fakes.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod model;
pub mod palette;
pub mod persist;
pub mod protocol;
pub mod schedule;
pub mod session;
pub mod status;
pub mod submission;

pub use config::ClientConfig;
pub use connection::{ConnectionEvent, ConnectionManager, Transport, TransportEvent};
pub use cursor::{CursorOverlay, NormalizedPoint, PlayfieldGeometry, Point, ViewportInfo};
pub use engine::{EngineDriver, EngineEvent, EngineKey, PuzzleEngine};
pub use error::{ApiError, ConfigError, ConnectionError, ProtocolError, PuzzleDataError};
pub use model::{
    GameStateSnapshot, Player, PlayerId, PuzzleId, PuzzleInstance, PuzzleKind, SessionId,
    SessionInfo, SessionStatus,
};
pub use palette::ColorScheme;
pub use schedule::{LatestCell, ManualScheduler, RepeatingTask, Scheduler, TimeoutHandle};
pub use session::{SessionAction, SessionEffect, SessionOrchestrator};
pub use status::{GameStatus, StatusInfo};
