//! Concentration puzzle: click when the word matches the circle color.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PuzzleDataError;
use crate::model::PuzzleKind;

/// Answer sent when the sequence runs out without a click.
pub const TIMEOUT_ANSWER: &str = "timeout";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColorPair {
    pub color_word: String,
    pub circle_color: String,
    pub is_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConcentrationData {
    pub pairs: Vec<ColorPair>,
    /// Seconds each pair stays on screen.
    pub duration: f64,
}

impl ConcentrationData {
    pub fn parse(value: &Value) -> Result<Self, PuzzleDataError> {
        let data: Self =
            serde_json::from_value(value.clone()).map_err(|e| PuzzleDataError::Decode {
                kind: PuzzleKind::Concentration,
                message: e.to_string(),
            })?;
        if data.pairs.is_empty() {
            return Err(PuzzleDataError::NoPairs);
        }
        if data.duration <= 0.0 {
            return Err(PuzzleDataError::NonPositiveDuration(data.duration));
        }
        Ok(data)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn interval_ms(&self) -> u32 {
        (self.duration * 1000.0).round().max(1.0) as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcentrationResult {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConcentrationEngine {
    data: ConcentrationData,
    current_pair_index: usize,
    has_clicked: bool,
    is_complete: bool,
    result: Option<ConcentrationResult>,
    clicked_index: Option<usize>,
}

impl ConcentrationEngine {
    pub fn new(data: ConcentrationData) -> Self {
        Self {
            data,
            current_pair_index: 0,
            has_clicked: false,
            is_complete: false,
            result: None,
            clicked_index: None,
        }
    }

    pub fn data(&self) -> &ConcentrationData {
        &self.data
    }

    pub fn current_pair_index(&self) -> usize {
        self.current_pair_index
    }

    pub fn current_pair(&self) -> Option<&ColorPair> {
        self.data.pairs.get(self.current_pair_index)
    }

    pub fn has_clicked(&self) -> bool {
        self.has_clicked
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn result(&self) -> Option<ConcentrationResult> {
        self.result
    }

    pub fn clicked_index(&self) -> Option<usize> {
        self.clicked_index
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(&self) -> f64 {
        let total = self.data.pairs.len();
        if total == 0 {
            return 0.0;
        }
        (self.current_pair_index + 1).min(total) as f64 / total as f64 * 100.0
    }

    /// Moves to the next pair. Passing the last pair fails the puzzle and
    /// yields the timeout answer.
    pub fn advance(&mut self) -> Option<String> {
        if self.is_complete || self.has_clicked {
            return None;
        }
        if self.current_pair_index + 1 >= self.data.pairs.len() {
            self.is_complete = true;
            self.result = Some(ConcentrationResult::Failure);
            return Some(TIMEOUT_ANSWER.to_string());
        }
        self.current_pair_index += 1;
        None
    }

    /// Clicks the current pair. Returns the answer (the pair index).
    pub fn click(&mut self) -> Option<String> {
        if self.is_complete || self.has_clicked {
            return None;
        }
        let pair = self.current_pair()?;
        self.result = Some(if pair.is_match {
            ConcentrationResult::Success
        } else {
            ConcentrationResult::Failure
        });
        self.has_clicked = true;
        self.is_complete = true;
        self.clicked_index = Some(self.current_pair_index);
        Some(self.current_pair_index.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> ConcentrationData {
        ConcentrationData::parse(&json!({
            "pairs": [
                {"color_word": "red", "circle_color": "blue", "is_match": false},
                {"color_word": "green", "circle_color": "green", "is_match": true},
                {"color_word": "blue", "circle_color": "yellow", "is_match": false}
            ],
            "duration": 1.5
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_validation() {
        assert_eq!(data().interval_ms(), 1500);
        assert_eq!(
            ConcentrationData::parse(&json!({"pairs": [], "duration": 1})).unwrap_err(),
            PuzzleDataError::NoPairs
        );
        assert!(matches!(
            ConcentrationData::parse(&json!({
                "pairs": [{"color_word": "red", "circle_color": "red", "is_match": true}],
                "duration": 0
            })),
            Err(PuzzleDataError::NonPositiveDuration(_))
        ));
    }

    #[test]
    fn test_click_on_match_succeeds() {
        let mut engine = ConcentrationEngine::new(data());
        assert_eq!(engine.advance(), None);
        assert_eq!(engine.current_pair_index(), 1);
        assert_eq!(engine.click().as_deref(), Some("1"));
        assert!(engine.is_complete());
        assert_eq!(engine.result(), Some(ConcentrationResult::Success));
        assert_eq!(engine.clicked_index(), Some(1));

        assert_eq!(engine.click(), None);
        assert_eq!(engine.advance(), None);
        assert_eq!(engine.current_pair_index(), 1);
    }

    #[test]
    fn test_click_on_mismatch_fails() {
        let mut engine = ConcentrationEngine::new(data());
        assert_eq!(engine.click().as_deref(), Some("0"));
        assert_eq!(engine.result(), Some(ConcentrationResult::Failure));
    }

    #[test]
    fn test_running_out_of_pairs_times_out() {
        let mut engine = ConcentrationEngine::new(data());
        assert_eq!(engine.advance(), None);
        assert_eq!(engine.advance(), None);
        assert_eq!(engine.advance().as_deref(), Some(TIMEOUT_ANSWER));
        assert!(engine.is_complete());
        assert_eq!(engine.result(), Some(ConcentrationResult::Failure));
        assert_eq!(engine.clicked_index(), None);
        assert!((engine.progress_percent() - 100.0).abs() < 1e-9);
    }
}
