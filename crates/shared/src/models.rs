//! Wire models: participants, queue items, and the WebSocket envelope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Display name reported for identities that are not in the directory.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Identity of one WebSocket connection, assigned by the transport on upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Default display name: `USER-` plus the first six hex digits of the id.
    pub fn default_name(&self) -> String {
        let simple = self.0.simple().to_string();
        format!("USER-{}", &simple[..6])
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A connected participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ConnectionId,
    pub name: String,
}

/// One entry in the shared playback queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub item_id: String,
    pub title: String,
    pub added_by_id: ConnectionId,
    /// Copy of the adder's display name, kept in sync on rename.
    pub added_by_name: String,
}

/// Reorder direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl FromStr for Direction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(ProtocolError::InvalidDirection(other.to_string())),
        }
    }
}

/// Read-only view of the whole session, served by `GET /api/session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub participants: Vec<Participant>,
    pub queue: Vec<QueueItem>,
    pub current_index: Option<usize>,
}

/// Errors decoding a frame into a typed message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("invalid direction: {0} (expected \"up\" or \"down\")")]
    InvalidDirection(String),
}

// --- WebSocket envelope ---

/// WebSocket message envelope (version 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsEnvelope {
    #[serde(default)]
    pub version: u8,
    pub r#type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
}

impl WsEnvelope {
    pub fn new(kind: &str, payload: Value) -> Self {
        Self {
            version: 1,
            r#type: kind.to_string(),
            payload,
            ts: Some(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        }
    }

    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Decode the payload into `T`. A missing payload is read as `{}`.
    fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let payload = if self.payload.is_null() {
            Value::Object(Default::default())
        } else {
            self.payload.clone()
        };
        serde_json::from_value(payload).map_err(|e| ProtocolError::InvalidPayload {
            kind: self.r#type.clone(),
            reason: e.to_string(),
        })
    }
}

/// WebSocket message types.
pub mod ws_types {
    // client -> server
    pub const RENAME: &str = "rename";
    pub const LEAVE: &str = "leave";
    pub const ENQUEUE: &str = "enqueue";
    pub const DEQUEUE: &str = "dequeue";
    pub const REORDER: &str = "reorder";
    pub const ADVANCE: &str = "advance";
    pub const SYNC_POSITION: &str = "sync_position";
    pub const SYNC_PAUSE: &str = "sync_pause";
    pub const PING: &str = "ping";

    // server -> client
    pub const PARTICIPANT_LIST_UPDATED: &str = "participant_list_updated";
    pub const QUEUE_UPDATED: &str = "queue_updated";
    pub const PLAY_STARTED: &str = "play_started";
    pub const POSITION_SYNC: &str = "position_sync";
    pub const PAUSE_BROADCAST: &str = "pause_broadcast";
    pub const QUEUE_FINISHED: &str = "queue_finished";
    pub const ERROR_NOTICE: &str = "error_notice";
    pub const NAME_ASSIGNED: &str = "name_assigned";
    pub const PONG: &str = "pong";
}

// --- Inbound payloads ---

/// rename payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePayload {
    #[serde(default)]
    pub name: String,
}

/// enqueue / dequeue payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
    #[serde(default)]
    pub item_id: String,
}

/// reorder payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderPayload {
    #[serde(default)]
    pub item_id: String,
    pub direction: Direction,
}

/// sync_position payload. `time` is seconds into the current item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPositionPayload {
    pub time: f64,
}

/// An event submitted to the session coordinator on behalf of one connection.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Implied by the WebSocket upgrade; never decoded from a frame.
    Join,
    Rename { name: String },
    Leave,
    Enqueue { item_id: String },
    Dequeue { item_id: String },
    Reorder { item_id: String, direction: Direction },
    Advance,
    SyncPosition { time: f64 },
    SyncPause,
    Ping,
}

impl InboundEvent {
    pub fn from_envelope(env: &WsEnvelope) -> Result<Self, ProtocolError> {
        let event = match env.r#type.as_str() {
            ws_types::RENAME => {
                let p: RenamePayload = env.payload_as()?;
                Self::Rename { name: p.name }
            }
            ws_types::LEAVE => Self::Leave,
            ws_types::ENQUEUE => {
                let p: ItemPayload = env.payload_as()?;
                Self::Enqueue { item_id: p.item_id }
            }
            ws_types::DEQUEUE => {
                let p: ItemPayload = env.payload_as()?;
                Self::Dequeue { item_id: p.item_id }
            }
            ws_types::REORDER => {
                let p: ReorderPayload = env.payload_as()?;
                Self::Reorder {
                    item_id: p.item_id,
                    direction: p.direction,
                }
            }
            ws_types::ADVANCE => Self::Advance,
            ws_types::SYNC_POSITION => {
                let p: SyncPositionPayload = env.payload_as()?;
                Self::SyncPosition { time: p.time }
            }
            ws_types::SYNC_PAUSE => Self::SyncPause,
            ws_types::PING => Self::Ping,
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        };
        Ok(event)
    }

    /// Encode for sending. `Join` has no wire form and encodes as `None`.
    pub fn to_envelope(&self) -> Option<WsEnvelope> {
        let env = match self {
            Self::Join => return None,
            Self::Rename { name } => {
                WsEnvelope::new(ws_types::RENAME, serde_json::json!({ "name": name }))
            }
            Self::Leave => WsEnvelope::new(ws_types::LEAVE, serde_json::json!({})),
            Self::Enqueue { item_id } => {
                WsEnvelope::new(ws_types::ENQUEUE, serde_json::json!({ "itemId": item_id }))
            }
            Self::Dequeue { item_id } => {
                WsEnvelope::new(ws_types::DEQUEUE, serde_json::json!({ "itemId": item_id }))
            }
            Self::Reorder { item_id, direction } => WsEnvelope::new(
                ws_types::REORDER,
                serde_json::json!({ "itemId": item_id, "direction": direction.as_str() }),
            ),
            Self::Advance => WsEnvelope::new(ws_types::ADVANCE, serde_json::json!({})),
            Self::SyncPosition { time } => {
                WsEnvelope::new(ws_types::SYNC_POSITION, serde_json::json!({ "time": time }))
            }
            Self::SyncPause => WsEnvelope::new(ws_types::SYNC_PAUSE, serde_json::json!({})),
            Self::Ping => WsEnvelope::new(ws_types::PING, serde_json::json!({})),
        };
        Some(env)
    }
}

// --- Outbound payloads ---

/// play_started payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayStartedPayload {
    pub item_id: String,
    #[serde(default)]
    pub start_time: f64,
}

/// position_sync payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSyncPayload {
    pub item_id: String,
    pub time: f64,
}

/// error_notice payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorNoticePayload {
    pub message: String,
}

/// name_assigned payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameAssignedPayload {
    pub name: String,
}

/// A message produced by the coordinator for delivery to clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    ParticipantListUpdated(Vec<Participant>),
    QueueUpdated(Vec<QueueItem>),
    PlayStarted(PlayStartedPayload),
    PositionSync(PositionSyncPayload),
    PauseBroadcast,
    QueueFinished,
    ErrorNotice(ErrorNoticePayload),
    NameAssigned(NameAssignedPayload),
    Pong,
}

impl ServerMessage {
    pub fn play_started(item_id: impl Into<String>, start_time: f64) -> Self {
        Self::PlayStarted(PlayStartedPayload {
            item_id: item_id.into(),
            start_time,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::ErrorNotice(ErrorNoticePayload {
            message: message.into(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ParticipantListUpdated(_) => ws_types::PARTICIPANT_LIST_UPDATED,
            Self::QueueUpdated(_) => ws_types::QUEUE_UPDATED,
            Self::PlayStarted(_) => ws_types::PLAY_STARTED,
            Self::PositionSync(_) => ws_types::POSITION_SYNC,
            Self::PauseBroadcast => ws_types::PAUSE_BROADCAST,
            Self::QueueFinished => ws_types::QUEUE_FINISHED,
            Self::ErrorNotice(_) => ws_types::ERROR_NOTICE,
            Self::NameAssigned(_) => ws_types::NAME_ASSIGNED,
            Self::Pong => ws_types::PONG,
        }
    }

    pub fn to_envelope(&self) -> Result<WsEnvelope, serde_json::Error> {
        let payload = match self {
            Self::ParticipantListUpdated(p) => serde_json::to_value(p)?,
            Self::QueueUpdated(q) => serde_json::to_value(q)?,
            Self::PlayStarted(p) => serde_json::to_value(p)?,
            Self::PositionSync(p) => serde_json::to_value(p)?,
            Self::ErrorNotice(p) => serde_json::to_value(p)?,
            Self::NameAssigned(p) => serde_json::to_value(p)?,
            Self::PauseBroadcast | Self::QueueFinished | Self::Pong => serde_json::json!({}),
        };
        Ok(WsEnvelope::new(self.kind(), payload))
    }

    pub fn from_envelope(env: &WsEnvelope) -> Result<Self, ProtocolError> {
        let msg = match env.r#type.as_str() {
            ws_types::PARTICIPANT_LIST_UPDATED => Self::ParticipantListUpdated(env.payload_as()?),
            ws_types::QUEUE_UPDATED => Self::QueueUpdated(env.payload_as()?),
            ws_types::PLAY_STARTED => Self::PlayStarted(env.payload_as()?),
            ws_types::POSITION_SYNC => Self::PositionSync(env.payload_as()?),
            ws_types::PAUSE_BROADCAST => Self::PauseBroadcast,
            ws_types::QUEUE_FINISHED => Self::QueueFinished,
            ws_types::ERROR_NOTICE => Self::ErrorNotice(env.payload_as()?),
            ws_types::NAME_ASSIGNED => Self::NameAssigned(env.payload_as()?),
            ws_types::PONG => Self::Pong,
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_types;
    use serde_json::json;

    fn envelope(kind: &str, payload: Value) -> WsEnvelope {
        WsEnvelope {
            version: 1,
            r#type: kind.to_string(),
            payload,
            ts: None,
        }
    }

    #[test]
    fn default_name_uses_six_hex_digits() {
        let id = ConnectionId(Uuid::parse_str("0a1b2c3d-4e5f-4000-8000-000000000000").unwrap());
        assert_eq!(id.default_name(), "USER-0a1b2c");
    }

    #[test]
    fn parses_enqueue_with_camel_case_item_id() {
        let env = envelope(ws_types::ENQUEUE, json!({ "itemId": "dQw4w9WgXcQ" }));
        let event = InboundEvent::from_envelope(&env).unwrap();
        assert_eq!(
            event,
            InboundEvent::Enqueue {
                item_id: "dQw4w9WgXcQ".to_string()
            }
        );
    }

    #[test]
    fn missing_item_id_decodes_as_empty() {
        let env = envelope(ws_types::DEQUEUE, json!({}));
        let event = InboundEvent::from_envelope(&env).unwrap();
        assert_eq!(
            event,
            InboundEvent::Dequeue {
                item_id: String::new()
            }
        );
    }

    #[test]
    fn reorder_rejects_unknown_direction() {
        let env = envelope(ws_types::REORDER, json!({ "itemId": "a", "direction": "left" }));
        let err = InboundEvent::from_envelope(&env).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));
    }

    #[test]
    fn reorder_requires_direction() {
        let env = envelope(ws_types::REORDER, json!({ "itemId": "a" }));
        assert!(InboundEvent::from_envelope(&env).is_err());
    }

    #[test]
    fn null_payload_is_accepted_for_payloadless_events() {
        let env = WsEnvelope::parse(r#"{"type":"advance"}"#).unwrap();
        assert_eq!(env.version, 0);
        assert_eq!(InboundEvent::from_envelope(&env).unwrap(), InboundEvent::Advance);
    }

    #[test]
    fn sync_position_requires_time() {
        let env = envelope(ws_types::SYNC_POSITION, json!({}));
        assert!(InboundEvent::from_envelope(&env).is_err());

        let env = envelope(ws_types::SYNC_POSITION, json!({ "time": 12.5 }));
        assert_eq!(
            InboundEvent::from_envelope(&env).unwrap(),
            InboundEvent::SyncPosition { time: 12.5 }
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let env = envelope("join", json!({}));
        let err = InboundEvent::from_envelope(&env).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(t) if t == "join"));
    }

    #[test]
    fn malformed_frame_is_rejected() {
        assert!(matches!(
            WsEnvelope::parse("not json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn queue_item_serializes_camel_case() {
        let item = QueueItem {
            item_id: "abc".to_string(),
            title: "Video abc".to_string(),
            added_by_id: ConnectionId::new(),
            added_by_name: "alice".to_string(),
        };
        let env = ServerMessage::QueueUpdated(vec![item]).to_envelope().unwrap();
        assert_eq!(env.r#type, ws_types::QUEUE_UPDATED);
        assert_eq!(env.payload[0]["itemId"], "abc");
        assert_eq!(env.payload[0]["addedByName"], "alice");
        assert!(env.payload[0].get("addedById").is_some());
    }

    #[test]
    fn play_started_envelope_carries_start_time() {
        let env = ServerMessage::play_started("xyz", 0.0).to_envelope().unwrap();
        assert_eq!(env.version, 1);
        assert_eq!(env.payload, json!({ "itemId": "xyz", "startTime": 0.0 }));
        assert_eq!(
            ServerMessage::from_envelope(&env).unwrap(),
            ServerMessage::play_started("xyz", 0.0)
        );
    }

    #[test]
    fn client_encoded_reorder_decodes_on_server() {
        let sent = InboundEvent::Reorder {
            item_id: "b".to_string(),
            direction: Direction::Down,
        };
        let env = sent.to_envelope().unwrap();
        let text = serde_json::to_string(&env).unwrap();
        let parsed = WsEnvelope::parse(&text).unwrap();
        assert_eq!(InboundEvent::from_envelope(&parsed).unwrap(), sent);
        assert!(InboundEvent::Join.to_envelope().is_none());
    }

    #[test]
    fn direction_from_str() {
        assert_eq!("up".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("down".parse::<Direction>().unwrap(), Direction::Down);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
