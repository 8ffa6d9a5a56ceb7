//! WebSocket relay state and broadcast.
//!
//! One `tokio::sync::broadcast` channel carries every outbound message; each
//! connection subscribes and keeps only the messages addressed to it.

use std::sync::Arc;

use shared::{ConnectionId, ServerMessage};
use tokio::sync::broadcast;

use crate::session::{Gateway, Outbound};

/// Relay state: broadcast channel for WebSocket messages.
#[derive(Clone)]
pub struct RelayState {
    tx: broadcast::Sender<Arc<Outbound>>,
}

impl RelayState {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Outbound>> {
        self.tx.subscribe()
    }

    pub fn publish(&self, outbound: Outbound) {
        // Err only means nobody is connected.
        let _ = self.tx.send(Arc::new(outbound));
    }
}

impl Gateway for RelayState {
    fn send_to(&self, id: ConnectionId, message: ServerMessage) {
        self.publish(Outbound::to(id, message));
    }

    fn broadcast(&self, message: ServerMessage, exclude: Option<ConnectionId>) {
        let outbound = match exclude {
            Some(id) => Outbound::all_except(id, message),
            None => Outbound::all(message),
        };
        self.publish(outbound);
    }
}
