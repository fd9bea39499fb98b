//! JSON wire format of the game push channel.
//!
//! Every server message is an envelope `{type, timestamp, data}`. Older
//! servers sent the bare snapshot without an envelope; that shape is still
//! accepted.

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cursor::{GameArea, ViewportInfo};
use crate::error::ProtocolError;
use crate::model::{GameStateSnapshot, PlayerId, PuzzleId};

/// Pointer position as broadcast between teammates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CursorSample {
    pub user_id: PlayerId,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewportInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_area: Option<GameArea>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Kinds of teammate activity the server relays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    PuzzleInteraction,
    TeamCommunication,
    Achievement,
}

/// Relayed teammate activity.
#[derive(Debug, Clone, PartialEq)]
pub struct PushNotification {
    pub kind: NotificationKind,
    pub user_id: Option<PlayerId>,
    pub data: Value,
    pub timestamp: Option<String>,
}

impl PushNotification {
    /// One-line description for the notification feed.
    pub fn describe(&self, name: &str) -> String {
        let field = |key: &str| {
            self.data
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string()
        };
        match self.kind {
            NotificationKind::PuzzleInteraction => {
                format!("{name}: {}", field("interaction_type"))
            }
            NotificationKind::TeamCommunication => {
                format!("{name} says: {}", field("message_type"))
            }
            NotificationKind::Achievement => {
                format!("{name} earned {}", field("achievement_type"))
            }
        }
    }
}

/// A decoded server message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    StateUpdate(GameStateSnapshot),
    Notification(PushNotification),
    Cursor(CursorSample),
    /// Well-formed envelope of a type this client does not handle.
    Unrecognized(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    user_id: Option<PlayerId>,
    #[serde(default)]
    data: Option<Value>,
}

impl InboundMessage {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Some(object) = value.as_object() else {
            return Err(ProtocolError::NotAnObject);
        };

        if object.get("type").is_some_and(Value::is_string) {
            let envelope: Envelope = serde_json::from_value(value.clone())?;
            return Self::from_envelope(envelope, &value);
        }

        // TODO: drop the bare-snapshot fallback once every server emits envelopes.
        if object.contains_key("session") && object.contains_key("players") {
            return decode_snapshot(value, None).map(Self::StateUpdate);
        }

        Err(ProtocolError::UnknownShape)
    }

    fn from_envelope(envelope: Envelope, raw: &Value) -> Result<Self, ProtocolError> {
        let Envelope {
            kind,
            timestamp,
            user_id,
            data,
        } = envelope;

        let notification = |kind| {
            let data = data.clone().unwrap_or(Value::Null);
            let user_id = user_id.or_else(|| data.get("user_id").and_then(Value::as_i64));
            Self::Notification(PushNotification {
                kind,
                user_id,
                data,
                timestamp: timestamp.clone(),
            })
        };

        match kind.as_str() {
            "state_update" => {
                let data = data
                    .clone()
                    .ok_or(ProtocolError::IncompleteSnapshot("data"))?;
                decode_snapshot(data, timestamp.clone()).map(Self::StateUpdate)
            }
            "puzzle_interaction" => Ok(notification(NotificationKind::PuzzleInteraction)),
            "team_communication" => Ok(notification(NotificationKind::TeamCommunication)),
            "achievement" => Ok(notification(NotificationKind::Achievement)),
            "mouse_cursor" | "mouse_position" => {
                let payload = data.clone().unwrap_or_else(|| raw.clone());
                serde_json::from_value(payload)
                    .map(Self::Cursor)
                    .map_err(|source| ProtocolError::InvalidPayload {
                        kind: kind.clone(),
                        source,
                    })
            }
            other => {
                let legacy = raw
                    .as_object()
                    .is_some_and(|o| o.contains_key("session") && o.contains_key("players"));
                if legacy {
                    return decode_snapshot(raw.clone(), timestamp.clone()).map(Self::StateUpdate);
                }
                Ok(Self::Unrecognized(other.to_string()))
            }
        }
    }
}

fn decode_snapshot(
    data: Value,
    envelope_timestamp: Option<String>,
) -> Result<GameStateSnapshot, ProtocolError> {
    for field in ["session", "players"] {
        if data.get(field).is_none_or(Value::is_null) {
            return Err(ProtocolError::IncompleteSnapshot(field));
        }
    }
    let mut snapshot: GameStateSnapshot =
        serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload {
            kind: "state_update".to_string(),
            source,
        })?;
    if snapshot.timestamp.is_none() {
        snapshot.timestamp = envelope_timestamp;
    }
    Ok(snapshot)
}

/// Puzzle telemetry categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Start,
    Click,
    Drag,
    Timeout,
    Complete,
}

/// Messages the client sends on the push channel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    MousePosition(CursorSample),
    PuzzleInteraction {
        user_id: PlayerId,
        puzzle_id: PuzzleId,
        interaction_type: InteractionKind,
        interaction_data: Value,
        timestamp: Option<String>,
    },
    TeamCommunication {
        user_id: PlayerId,
        message_type: String,
        message_data: Value,
        timestamp: Option<String>,
    },
    PlayerActivity {
        user_id: PlayerId,
        activity_data: Value,
        timestamp: Option<String>,
    },
    Achievement {
        user_id: PlayerId,
        achievement_type: String,
        achievement_data: Value,
        timestamp: Option<String>,
    },
    Ping {
        timestamp: Option<String>,
    },
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// RFC 3339 timestamp with millisecond precision for an epoch-millis clock.
#[allow(clippy::cast_possible_truncation)]
pub fn format_timestamp(epoch_ms: f64) -> Option<String> {
    DateTime::from_timestamp_millis(epoch_ms as i64)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionStatus;
    use serde_json::json;

    #[test]
    fn test_parse_state_update_envelope() {
        let text = json!({
            "type": "state_update",
            "timestamp": "2025-01-01T00:00:00Z",
            "data": {
                "session": {"id": 5, "status": "active"},
                "players": [{"id": 1, "username": "ana", "points": 30}],
                "puzzles": []
            }
        })
        .to_string();
        let InboundMessage::StateUpdate(snapshot) = InboundMessage::parse(&text).unwrap() else {
            panic!("expected state update");
        };
        assert_eq!(snapshot.session.status, SessionStatus::Active);
        assert_eq!(snapshot.timestamp.as_deref(), Some("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_state_update_without_players_is_rejected() {
        let text = json!({"type": "state_update", "data": {"session": {"id": 5}}}).to_string();
        assert!(matches!(
            InboundMessage::parse(&text),
            Err(ProtocolError::IncompleteSnapshot("players"))
        ));
        let text = json!({"type": "state_update"}).to_string();
        assert!(matches!(
            InboundMessage::parse(&text),
            Err(ProtocolError::IncompleteSnapshot("data"))
        ));
    }

    #[test]
    fn test_parse_legacy_bare_snapshot() {
        let text = json!({
            "session": {"id": 9, "status": "countdown"},
            "players": [],
            "puzzles": [],
            "timestamp": "t"
        })
        .to_string();
        let parsed = InboundMessage::parse(&text).unwrap();
        assert!(matches!(parsed, InboundMessage::StateUpdate(s) if s.session.id == 9));
    }

    #[test]
    fn test_parse_notifications() {
        let text = json!({
            "type": "puzzle_interaction",
            "data": {"user_id": 4, "puzzle_id": 2, "interaction_type": "click"}
        })
        .to_string();
        let InboundMessage::Notification(n) = InboundMessage::parse(&text).unwrap() else {
            panic!("expected notification");
        };
        assert_eq!(n.kind, NotificationKind::PuzzleInteraction);
        assert_eq!(n.user_id, Some(4));
        assert_eq!(n.describe("bo"), "bo: click");
    }

    #[test]
    fn test_parse_cursor() {
        let text = json!({
            "type": "mouse_cursor",
            "data": {"user_id": 3, "x": 10.0, "y": 20.0, "normalized_x": 0.5, "normalized_y": 0.25, "color": "blue"}
        })
        .to_string();
        let InboundMessage::Cursor(sample) = InboundMessage::parse(&text).unwrap() else {
            panic!("expected cursor");
        };
        assert_eq!(sample.user_id, 3);
        assert_eq!(sample.normalized_x, Some(0.5));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            InboundMessage::parse("{not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            InboundMessage::parse("[1, 2]"),
            Err(ProtocolError::NotAnObject)
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"hello": 1}"#),
            Err(ProtocolError::UnknownShape)
        ));
        assert_eq!(
            InboundMessage::parse(r#"{"type": "pong"}"#).unwrap(),
            InboundMessage::Unrecognized("pong".to_string())
        );
    }

    #[test]
    fn test_outbound_serialization() {
        let msg = OutboundMessage::PuzzleInteraction {
            user_id: 1,
            puzzle_id: 7,
            interaction_type: InteractionKind::Click,
            interaction_data: json!({"row": 0}),
            timestamp: None,
        };
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "puzzle_interaction");
        assert_eq!(value["interaction_type"], "click");
        assert_eq!(value["puzzle_id"], 7);

        let sample = CursorSample {
            user_id: 1,
            x: 5.0,
            y: 6.0,
            normalized_x: Some(0.1),
            normalized_y: Some(0.2),
            timestamp: None,
            viewport: None,
            game_area: None,
            color: None,
        };
        let value: Value =
            serde_json::from_str(&OutboundMessage::MousePosition(sample).to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "mouse_position");
        assert_eq!(value["normalized_y"], 0.2);
        assert!(value.get("viewport").is_none());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(1_700_000_000_123.0).as_deref(),
            Some("2023-11-14T22:13:20.123Z")
        );
    }
}
