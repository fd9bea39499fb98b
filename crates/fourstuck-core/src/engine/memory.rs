//! Memorization puzzle: show a number-to-color mapping, then ask for one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PuzzleDataError;
use crate::model::PuzzleKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoryData {
    /// Number (as a string key) to color name.
    pub mapping: BTreeMap<String, String>,
    pub question_number: u32,
    pub choices: Vec<String>,
}

impl MemoryData {
    pub fn parse(value: &Value) -> Result<Self, PuzzleDataError> {
        let data: Self =
            serde_json::from_value(value.clone()).map_err(|e| PuzzleDataError::Decode {
                kind: PuzzleKind::Memory,
                message: e.to_string(),
            })?;
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> Result<(), PuzzleDataError> {
        if self.mapping.is_empty() {
            return Err(PuzzleDataError::EmptyMapping);
        }
        let answer = self
            .correct_color()
            .ok_or(PuzzleDataError::QuestionNotMapped(self.question_number))?;
        if !self.choices.iter().any(|c| c == answer) {
            return Err(PuzzleDataError::AnswerNotInChoices(answer.to_string()));
        }
        Ok(())
    }

    pub fn correct_color(&self) -> Option<&str> {
        self.mapping
            .get(&self.question_number.to_string())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPhase {
    Revealing,
    Questioning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEngine {
    data: MemoryData,
    duration_secs: i64,
    started_at: f64,
    seconds_left: i64,
    phase: MemoryPhase,
    selected: Option<String>,
}

impl MemoryEngine {
    /// A non-positive duration skips the reveal entirely.
    pub fn new(data: MemoryData, duration_secs: i64, now: f64) -> Self {
        let revealing = duration_secs > 0;
        Self {
            data,
            duration_secs,
            started_at: now,
            seconds_left: duration_secs.max(0),
            phase: if revealing {
                MemoryPhase::Revealing
            } else {
                MemoryPhase::Questioning
            },
            selected: None,
        }
    }

    pub fn data(&self) -> &MemoryData {
        &self.data
    }

    pub fn phase(&self) -> MemoryPhase {
        self.phase
    }

    pub fn seconds_left(&self) -> i64 {
        self.seconds_left
    }

    pub fn is_reveal_complete(&self) -> bool {
        self.phase == MemoryPhase::Questioning
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Recomputes the countdown from the start time. Returns `true` on the
    /// tick that ends the reveal.
    #[allow(clippy::cast_possible_truncation)]
    pub fn tick(&mut self, now: f64) -> bool {
        if self.phase == MemoryPhase::Questioning {
            return false;
        }
        let elapsed = ((now - self.started_at) / 1000.0).floor() as i64;
        self.seconds_left = (self.duration_secs - elapsed).max(0);
        if self.seconds_left == 0 {
            self.phase = MemoryPhase::Questioning;
            return true;
        }
        false
    }

    /// Picks a color. Only the first pick after the reveal counts, and only
    /// one of the offered choices.
    pub fn select(&mut self, color: &str) -> Option<String> {
        if self.phase != MemoryPhase::Questioning || self.selected.is_some() {
            return None;
        }
        if !self.data.choices.iter().any(|c| c == color) {
            return None;
        }
        self.selected = Some(color.to_string());
        self.selected.clone()
    }
}
