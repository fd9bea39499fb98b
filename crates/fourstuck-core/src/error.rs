//! Error types shared across the core.

use thiserror::Error;

use crate::model::PuzzleKind;

/// Errors raised while decoding an inbound push-channel payload.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("unrecognized message shape")]
    UnknownShape,

    #[error("state update is missing `{0}`")]
    IncompleteSnapshot(&'static str),

    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by the connection manager.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Cannot send message: WebSocket not connected")]
    NotConnected,

    #[error("WebSocket error: {0}")]
    Transport(String),

    #[error("failed to open WebSocket: {0}")]
    OpenFailed(String),

    #[error("failed to encode outbound message: {0}")]
    Encode(String),

    #[error("Max reconnection attempts reached ({attempts})")]
    ReconnectExhausted { attempts: u32 },
}

/// Puzzle payload or configuration validation failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PuzzleDataError {
    #[error("{kind} puzzle data could not be decoded: {message}")]
    Decode { kind: PuzzleKind, message: String },

    #[error("memory mapping is empty")]
    EmptyMapping,

    #[error("question number {0} is not in the mapping")]
    QuestionNotMapped(u32),

    #[error("correct color `{0}` is not among the choices")]
    AnswerNotInChoices(String),

    #[error("concentration puzzle has no pairs")]
    NoPairs,

    #[error("duration must be positive, got {0}")]
    NonPositiveDuration(f64),

    #[error("grid needs at least one row, one column and one second")]
    EmptyGrid,

    #[error("expected {expected} target positions, got {actual}")]
    TargetCount { expected: usize, actual: usize },

    #[error("target column {column} in row {row} is out of bounds")]
    TargetOutOfBounds { row: usize, column: usize },

    #[error("invalid spatial config: {0}")]
    SpatialConfig(&'static str),
}

/// Failures from the puzzle collaborator endpoints.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("no active puzzle yet")]
    NoActivePuzzle,

    #[error("{0}")]
    OutOfPoints(String),

    #[error("request rejected ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classifies a non-success HTTP response.
    ///
    /// A 400 whose detail mentions elimination is the server refusing an
    /// answer from a player with no points left.
    pub fn from_status(status: u16, detail: String) -> Self {
        match status {
            404 => Self::NoActivePuzzle,
            400 if detail.to_ascii_lowercase().contains("eliminated") => {
                Self::OutOfPoints(detail)
            }
            _ => Self::Rejected { status, detail },
        }
    }
}

/// Configuration override could not be applied.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Spatial(#[from] PuzzleDataError),
}
