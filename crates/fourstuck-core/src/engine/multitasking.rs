//! Multitasking puzzle: find the single 6 hidden in each row of 9s.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::spatial::SOLVED_ANSWER;
use crate::error::PuzzleDataError;
use crate::model::{PuzzleId, PuzzleKind};

pub const TIMEOUT_ANSWER: &str = "timeout";
pub const TARGET_DIGIT: char = '6';
pub const FILLER_DIGIT: char = '9';

const DEFAULT_ROWS: usize = 3;
const DEFAULT_COLUMNS: usize = 9;
const DEFAULT_TIME_LIMIT: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GridSpec {
    pub rows: usize,
    pub digits_per_row: usize,
    /// Seconds.
    pub time_limit: u32,
    /// Target column for each row.
    pub six_positions: Vec<usize>,
}

impl GridSpec {
    /// Decodes the server payload. An empty payload means the client picks
    /// the targets, seeded by the puzzle id so every render agrees.
    pub fn from_value(value: &Value, puzzle_id: PuzzleId) -> Result<Self, PuzzleDataError> {
        let is_empty = match value {
            Value::Null => true,
            Value::Object(map) => !map.contains_key("sixPositions"),
            _ => false,
        };
        if is_empty {
            return Ok(Self::generate(puzzle_id));
        }
        let spec: Self =
            serde_json::from_value(value.clone()).map_err(|e| PuzzleDataError::Decode {
                kind: PuzzleKind::Multitasking,
                message: e.to_string(),
            })?;
        spec.validate()?;
        Ok(spec)
    }

    #[allow(clippy::cast_sign_loss)]
    pub fn generate(seed: PuzzleId) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
        Self {
            rows: DEFAULT_ROWS,
            digits_per_row: DEFAULT_COLUMNS,
            time_limit: DEFAULT_TIME_LIMIT,
            six_positions: (0..DEFAULT_ROWS)
                .map(|_| rng.random_range(0..DEFAULT_COLUMNS))
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), PuzzleDataError> {
        if self.rows == 0 || self.digits_per_row == 0 || self.time_limit == 0 {
            return Err(PuzzleDataError::EmptyGrid);
        }
        if self.six_positions.len() != self.rows {
            return Err(PuzzleDataError::TargetCount {
                expected: self.rows,
                actual: self.six_positions.len(),
            });
        }
        if let Some((row, &column)) = self
            .six_positions
            .iter()
            .enumerate()
            .find(|&(_, &c)| c >= self.digits_per_row)
        {
            return Err(PuzzleDataError::TargetOutOfBounds { row, column });
        }
        Ok(())
    }

    pub fn grid(&self) -> Vec<Vec<char>> {
        self.six_positions
            .iter()
            .map(|&target| {
                (0..self.digits_per_row)
                    .map(|col| if col == target { TARGET_DIGIT } else { FILLER_DIGIT })
                    .collect()
            })
            .collect()
    }
}

/// Whether every row's selection is its target column.
pub fn all_found(targets: &[usize], selections: &[Option<usize>]) -> bool {
    targets.len() == selections.len()
        && targets
            .iter()
            .zip(selections)
            .all(|(&target, &selected)| selected == Some(target))
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultitaskingEngine {
    spec: GridSpec,
    grid: Vec<Vec<char>>,
    selections: Vec<Option<usize>>,
    started_at: f64,
    seconds_left: u32,
    complete: bool,
    timed_out: bool,
}

impl MultitaskingEngine {
    pub fn new(spec: GridSpec, now: f64) -> Self {
        Self {
            grid: spec.grid(),
            selections: vec![None; spec.rows],
            seconds_left: spec.time_limit,
            started_at: now,
            complete: false,
            timed_out: false,
            spec,
        }
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn grid(&self) -> &[Vec<char>] {
        &self.grid
    }

    pub fn selections(&self) -> &[Option<usize>] {
        &self.selections
    }

    pub fn seconds_left(&self) -> u32 {
        self.seconds_left
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn is_finished(&self) -> bool {
        self.complete || self.timed_out
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(&self) -> f64 {
        let found = self
            .selections
            .iter()
            .zip(&self.spec.six_positions)
            .filter(|(s, t)| **s == Some(**t))
            .count();
        found as f64 / self.spec.rows as f64 * 100.0
    }

    /// Records a cell click, replacing that row's previous pick. Returns the
    /// answer when this click completes the grid.
    pub fn click(&mut self, row: usize, col: usize) -> Option<String> {
        if self.is_finished() || row >= self.spec.rows || col >= self.spec.digits_per_row {
            return None;
        }
        self.selections[row] = Some(col);
        if all_found(&self.spec.six_positions, &self.selections) {
            self.complete = true;
            return Some(SOLVED_ANSWER.to_string());
        }
        None
    }

    /// Recomputes the countdown from the start time. Returns the timeout
    /// answer on the tick that runs out.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn tick(&mut self, now: f64) -> Option<String> {
        if self.is_finished() {
            return None;
        }
        let elapsed = ((now - self.started_at) / 1000.0).floor().max(0.0) as u32;
        self.seconds_left = self.spec.time_limit.saturating_sub(elapsed);
        if self.seconds_left == 0 {
            self.timed_out = true;
            return Some(TIMEOUT_ANSWER.to_string());
        }
        None
    }
}
