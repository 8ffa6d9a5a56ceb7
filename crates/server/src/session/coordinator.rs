//! Session coordinator: the only code that mutates session state.
//!
//! Each operation takes `&mut self`, applies one complete transition to the
//! directory and queue, and returns the messages that describe it. Callers
//! must serialize access (see [`super::handle::SessionHandle`]).

use shared::{
    ConnectionId, Direction, InboundEvent, NameAssignedPayload, PositionSyncPayload, QueueItem,
    ServerMessage, SessionSnapshot,
};

use super::directory::ParticipantDirectory;
use super::error::SessionError;
use super::queue::{Advanced, Moved, PlaybackQueue};

/// Who receives an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    To(ConnectionId),
    All,
    AllExcept(ConnectionId),
}

impl Target {
    pub fn includes(&self, id: ConnectionId) -> bool {
        match self {
            Self::To(to) => *to == id,
            Self::All => true,
            Self::AllExcept(excluded) => *excluded != id,
        }
    }
}

/// A message addressed by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: Target,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn to(id: ConnectionId, message: ServerMessage) -> Self {
        Self {
            target: Target::To(id),
            message,
        }
    }

    pub fn all(message: ServerMessage) -> Self {
        Self {
            target: Target::All,
            message,
        }
    }

    pub fn all_except(id: ConnectionId, message: ServerMessage) -> Self {
        Self {
            target: Target::AllExcept(id),
            message,
        }
    }
}

/// Delivery sink for coordinator output. Fire-and-forget.
pub trait Gateway: Send + Sync {
    fn send_to(&self, id: ConnectionId, message: ServerMessage);

    fn broadcast(&self, message: ServerMessage, exclude: Option<ConnectionId>);

    fn dispatch(&self, outbound: Vec<Outbound>) {
        for out in outbound {
            match out.target {
                Target::To(id) => self.send_to(id, out.message),
                Target::All => self.broadcast(out.message, None),
                Target::AllExcept(id) => self.broadcast(out.message, Some(id)),
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Coordinator {
    directory: ParticipantDirectory,
    queue: PlaybackQueue,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one inbound event from `sender`. Errors become an `error_notice`
    /// for the sender only.
    pub fn apply(&mut self, sender: ConnectionId, event: InboundEvent) -> Vec<Outbound> {
        let result = match event {
            InboundEvent::Join => Ok(self.join(sender)),
            InboundEvent::Leave => Ok(self.leave(sender)),
            InboundEvent::Rename { name } => self.rename(sender, &name),
            InboundEvent::Enqueue { item_id } => self.enqueue(sender, &item_id),
            InboundEvent::Dequeue { item_id } => self.dequeue(&item_id),
            InboundEvent::Reorder { item_id, direction } => self.reorder(&item_id, direction),
            InboundEvent::Advance => Ok(self.advance()),
            InboundEvent::SyncPosition { time } => Ok(self.sync_position(sender, time)),
            InboundEvent::SyncPause => Ok(self.sync_pause(sender)),
            InboundEvent::Ping => Ok(vec![Outbound::to(sender, ServerMessage::Pong)]),
        };
        debug_assert!(self.queue.pointer_is_valid());

        result.unwrap_or_else(|err| Self::reject(sender, &err))
    }

    /// Render an error for the connection that caused it.
    pub fn reject(sender: ConnectionId, err: &SessionError) -> Vec<Outbound> {
        tracing::debug!(connection_id = %sender, error = %err, "event rejected");
        vec![Outbound::to(sender, ServerMessage::error(err.to_string()))]
    }

    pub fn join(&mut self, id: ConnectionId) -> Vec<Outbound> {
        let participant = self.directory.add(id);
        tracing::info!(connection_id = %id, name = %participant.name, "participant joined");

        let mut out = vec![
            Outbound::to(
                id,
                ServerMessage::NameAssigned(NameAssignedPayload {
                    name: participant.name,
                }),
            ),
            Outbound::all(ServerMessage::ParticipantListUpdated(self.directory.snapshot())),
        ];
        out.extend(self.playback_state_for(id));
        out
    }

    /// Re-send the full session state to one connection that missed
    /// messages. Nothing is sent for an identity that already left.
    pub fn resync(&self, id: ConnectionId) -> Vec<Outbound> {
        if !self.directory.contains(id) {
            return Vec::new();
        }
        tracing::info!(connection_id = %id, "resyncing connection");
        let mut out = vec![Outbound::to(
            id,
            ServerMessage::ParticipantListUpdated(self.directory.snapshot()),
        )];
        out.extend(self.playback_state_for(id));
        out
    }

    /// Queue, then the playing item if any, addressed to `id`.
    fn playback_state_for(&self, id: ConnectionId) -> Vec<Outbound> {
        let mut out = vec![Outbound::to(id, self.queue_updated())];
        if let Some(current) = self.queue.current_item() {
            out.push(Outbound::to(
                id,
                ServerMessage::play_started(current.item_id.clone(), 0.0),
            ));
        }
        out
    }

    /// Remove a participant. Items they queued stay, with their last name.
    pub fn leave(&mut self, id: ConnectionId) -> Vec<Outbound> {
        match self.directory.remove(id) {
            Some(p) => {
                tracing::info!(connection_id = %id, name = %p.name, "participant left");
                vec![Outbound::all(ServerMessage::ParticipantListUpdated(
                    self.directory.snapshot(),
                ))]
            }
            None => Vec::new(),
        }
    }

    pub fn rename(&mut self, id: ConnectionId, name: &str) -> Result<Vec<Outbound>, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::Validation("name must not be empty".to_string()));
        }
        if !self.directory.rename(id, name) {
            return Err(SessionError::NotFound("participant not found".to_string()));
        }
        let changed = self.queue.rename_adder(id, name);
        tracing::info!(connection_id = %id, %name, queue_items = changed, "participant renamed");

        Ok(vec![
            Outbound::all(self.queue_updated()),
            Outbound::all(ServerMessage::ParticipantListUpdated(self.directory.snapshot())),
        ])
    }

    pub fn enqueue(
        &mut self,
        sender: ConnectionId,
        item_id: &str,
    ) -> Result<Vec<Outbound>, SessionError> {
        if item_id.trim().is_empty() {
            return Err(SessionError::Validation("itemId is required".to_string()));
        }
        let item = QueueItem {
            item_id: item_id.to_string(),
            title: format!("Video {item_id}"),
            added_by_id: sender,
            added_by_name: self.directory.lookup_name(sender),
        };
        tracing::info!(connection_id = %sender, %item_id, "item queued");

        let started = self.queue.append(item);
        let mut out = vec![Outbound::all(self.queue_updated())];
        if started {
            tracing::info!(%item_id, "playback started");
            out.push(Outbound::all(ServerMessage::play_started(item_id, 0.0)));
        }
        Ok(out)
    }

    pub fn dequeue(&mut self, item_id: &str) -> Result<Vec<Outbound>, SessionError> {
        if item_id.trim().is_empty() {
            return Err(SessionError::Validation("itemId is required".to_string()));
        }
        let removed = self
            .queue
            .remove(item_id)
            .ok_or_else(|| SessionError::NotFound(format!("item not found in queue: {item_id}")))?;
        tracing::info!(
            %item_id,
            index = removed.index,
            title = %removed.item.title,
            "item removed"
        );

        let mut out = vec![Outbound::all(self.queue_updated())];
        if removed.was_current {
            match self.queue.current_item() {
                Some(next) => {
                    tracing::info!(item_id = %next.item_id, "playing next after removal");
                    out.push(Outbound::all(ServerMessage::play_started(
                        next.item_id.clone(),
                        0.0,
                    )));
                }
                None => tracing::info!("queue ended after removing current item"),
            }
        }
        Ok(out)
    }

    pub fn reorder(
        &mut self,
        item_id: &str,
        direction: Direction,
    ) -> Result<Vec<Outbound>, SessionError> {
        if item_id.trim().is_empty() {
            return Err(SessionError::Validation("itemId is required".to_string()));
        }
        match self.queue.move_item(item_id, direction) {
            None => Err(SessionError::NotFound(format!(
                "item not found for reordering: {item_id}"
            ))),
            Some(Moved::AtBoundary) => Ok(Vec::new()),
            Some(Moved::Swapped { from, to }) => {
                tracing::info!(%item_id, from, to, "item reordered");
                Ok(vec![Outbound::all(self.queue_updated())])
            }
        }
    }

    /// The playing item finished. Any connection may report this.
    pub fn advance(&mut self) -> Vec<Outbound> {
        match self.queue.advance() {
            Some(Advanced::Next(item)) => {
                tracing::info!(item_id = %item.item_id, "advancing to next item");
                vec![Outbound::all(ServerMessage::play_started(item.item_id, 0.0))]
            }
            Some(Advanced::Finished) => {
                tracing::info!("queue finished");
                vec![Outbound::all(ServerMessage::QueueFinished)]
            }
            None => {
                tracing::debug!("advance ignored while idle");
                Vec::new()
            }
        }
    }

    pub fn sync_position(&self, sender: ConnectionId, time: f64) -> Vec<Outbound> {
        match self.queue.current_item() {
            Some(current) => vec![Outbound::all_except(
                sender,
                ServerMessage::PositionSync(PositionSyncPayload {
                    item_id: current.item_id.clone(),
                    time,
                }),
            )],
            None => Vec::new(),
        }
    }

    pub fn sync_pause(&self, sender: ConnectionId) -> Vec<Outbound> {
        if self.queue.current_item().is_none() {
            return Vec::new();
        }
        vec![Outbound::all_except(sender, ServerMessage::PauseBroadcast)]
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            participants: self.directory.snapshot(),
            queue: self.queue.items().to_vec(),
            current_index: self.queue.current_index(),
        }
    }

    fn queue_updated(&self) -> ServerMessage {
        ServerMessage::QueueUpdated(self.queue.items().to_vec())
    }
}
