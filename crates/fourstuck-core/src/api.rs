//! Request and response shapes of the puzzle REST endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{PlayerId, PuzzleId, PuzzleInstance};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitAnswerRequest {
    pub puzzle_id: PuzzleId,
    pub answer: String,
    pub user_id: PlayerId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitAnswerResponse {
    pub correct: bool,
    #[serde(default)]
    pub points_awarded: Option<i64>,
    #[serde(default)]
    pub awarded_to_user_id: Option<PlayerId>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub next_puzzle_id: Option<PuzzleId>,
    #[serde(default)]
    pub next_puzzle: Option<PuzzleInstance>,
}

/// FastAPI-style error body. `detail` is a string or a list of
/// validation errors.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Value,
}

impl ErrorBody {
    pub fn detail_text(&self) -> String {
        match &self.detail {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

pub fn current_puzzle_url(api_base: &str, user_id: PlayerId) -> String {
    format!("{}/puzzle/current/{user_id}", api_base.trim_end_matches('/'))
}

pub fn submit_answer_url(api_base: &str) -> String {
    format!("{}/puzzle/answer", api_base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        assert_eq!(
            current_puzzle_url("http://localhost:8000/", 3),
            "http://localhost:8000/puzzle/current/3"
        );
        assert_eq!(
            submit_answer_url("http://localhost:8000"),
            "http://localhost:8000/puzzle/answer"
        );
    }

    #[test]
    fn test_minimal_response() {
        let resp: SubmitAnswerResponse =
            serde_json::from_str(r#"{"correct": true, "points_awarded": 10, "next_puzzle": null}"#)
                .unwrap();
        assert!(resp.correct);
        assert_eq!(resp.points_awarded, Some(10));
        assert!(resp.next_puzzle.is_none());
    }

    #[test]
    fn test_error_body_detail() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail": "Eliminated players cannot answer puzzles"}"#).unwrap();
        assert_eq!(body.detail_text(), "Eliminated players cannot answer puzzles");
    }
}
