//! Shared wire types for the watch party server and client.

mod models;

// Explicit re-exports (avoids rust-analyzer issues with `pub use models::*`)
pub use models::ws_types;
pub use models::{
    ConnectionId, Direction, ErrorNoticePayload, InboundEvent, ItemPayload,
    NameAssignedPayload, Participant, PlayStartedPayload, PositionSyncPayload, ProtocolError,
    QueueItem, RenamePayload, ReorderPayload, ServerMessage, SessionSnapshot, SyncPositionPayload,
    WsEnvelope, UNKNOWN_USER,
};
