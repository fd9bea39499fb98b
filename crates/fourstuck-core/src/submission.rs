//! Local checks applied to an answer before it is submitted.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::{PuzzleId, PuzzleKind};

/// Colors a memory answer may name.
pub const MEMORY_COLORS: [&str; 6] = ["red", "blue", "yellow", "green", "purple", "orange"];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SubmitRejection {
    #[error("`{answer}` is not a valid {kind} answer")]
    Malformed { kind: PuzzleKind, answer: String },

    #[error("submitted {elapsed_ms}ms after the previous answer")]
    TooSoon { elapsed_ms: f64 },

    #[error("puzzle {0} is not the current puzzle")]
    NotCurrentPuzzle(PuzzleId),

    #[error("eliminated players cannot answer")]
    Eliminated,
}

/// Whether `answer` has the shape the server expects for `kind`.
pub fn is_well_formed(kind: PuzzleKind, answer: &str) -> bool {
    match kind {
        PuzzleKind::Spatial => matches!(answer, "solved" | "collision"),
        PuzzleKind::Concentration => {
            answer == "timeout" || (!answer.is_empty() && answer.bytes().all(|b| b.is_ascii_digit()))
        }
        PuzzleKind::Memory => MEMORY_COLORS.contains(&answer),
        PuzzleKind::Multitasking => matches!(answer, "solved" | "timeout"),
    }
}

/// Rate limit and format guard for submissions.
#[derive(Debug, Clone)]
pub struct AnswerGuard {
    min_gap_ms: f64,
    last_submit: HashMap<PuzzleId, f64>,
}

impl AnswerGuard {
    pub fn new(min_gap_ms: f64) -> Self {
        Self {
            min_gap_ms,
            last_submit: HashMap::new(),
        }
    }

    /// Accepts and records a submission, or says why not.
    pub fn admit(
        &mut self,
        puzzle_id: PuzzleId,
        kind: PuzzleKind,
        answer: &str,
        now: f64,
    ) -> Result<(), SubmitRejection> {
        if !is_well_formed(kind, answer) {
            return Err(SubmitRejection::Malformed {
                kind,
                answer: answer.to_string(),
            });
        }
        if let Some(&last) = self.last_submit.get(&puzzle_id) {
            let elapsed_ms = now - last;
            if elapsed_ms < self.min_gap_ms {
                return Err(SubmitRejection::TooSoon { elapsed_ms });
            }
        }
        self.last_submit.insert(puzzle_id, now);
        Ok(())
    }

    pub fn forget(&mut self, puzzle_id: PuzzleId) {
        self.last_submit.remove(&puzzle_id);
    }
}
