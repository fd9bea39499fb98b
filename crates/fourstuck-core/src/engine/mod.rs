//! Local timing and physics for the four puzzle kinds.
//!
//! Each kind is a plain state machine; [`EngineDriver`] owns the one that
//! is bound to the current puzzle and feeds it time.

pub mod concentration;
mod driver;
pub mod memory;
pub mod multitasking;
pub mod spatial;

use serde_json::Value;

pub use driver::{EngineDriver, PuzzleInput};

use crate::config::EngineConfig;
use crate::error::PuzzleDataError;
use crate::model::{PuzzleId, PuzzleInstance, PuzzleKind};
use crate::protocol::InteractionKind;

use concentration::{ConcentrationData, ConcentrationEngine};
use memory::{MemoryData, MemoryEngine};
use multitasking::{GridSpec, MultitaskingEngine};
use spatial::SpatialEngine;

/// Identity of a bound puzzle. A change of either field resets the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineKey {
    pub kind: PuzzleKind,
    pub puzzle_id: PuzzleId,
}

impl EngineKey {
    pub fn of(puzzle: &PuzzleInstance) -> Self {
        Self {
            kind: puzzle.kind,
            puzzle_id: puzzle.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PuzzleEngine {
    Memory(MemoryEngine),
    Concentration(ConcentrationEngine),
    Spatial(SpatialEngine),
    Multitasking(MultitaskingEngine),
}

impl PuzzleEngine {
    pub fn build(
        puzzle: &PuzzleInstance,
        config: &EngineConfig,
        now: f64,
    ) -> Result<Self, PuzzleDataError> {
        Ok(match puzzle.kind {
            PuzzleKind::Memory => Self::Memory(MemoryEngine::new(
                MemoryData::parse(&puzzle.data)?,
                config.memory_reveal_secs,
                now,
            )),
            PuzzleKind::Concentration => {
                Self::Concentration(ConcentrationEngine::new(ConcentrationData::parse(&puzzle.data)?))
            }
            PuzzleKind::Spatial => {
                config.spatial.validate()?;
                Self::Spatial(SpatialEngine::new(config.spatial))
            }
            PuzzleKind::Multitasking => Self::Multitasking(MultitaskingEngine::new(
                GridSpec::from_value(&puzzle.data, puzzle.id)?,
                now,
            )),
        })
    }

    pub fn kind(&self) -> PuzzleKind {
        match self {
            Self::Memory(_) => PuzzleKind::Memory,
            Self::Concentration(_) => PuzzleKind::Concentration,
            Self::Spatial(_) => PuzzleKind::Spatial,
            Self::Multitasking(_) => PuzzleKind::Multitasking,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Engine state changed; views should re-read it.
    Updated(EngineKey),
    /// The memory mapping was hidden.
    RevealEnded(EngineKey),
    /// The puzzle produced its answer. Emitted at most once per binding.
    Answer { key: EngineKey, answer: String },
    /// Telemetry for teammates.
    Interaction {
        key: EngineKey,
        kind: InteractionKind,
        data: Value,
    },
    /// The puzzle payload could not be used.
    Invalid {
        key: EngineKey,
        error: PuzzleDataError,
    },
}
