//! Single-owner event loop around the [`Coordinator`].
//!
//! Connection handlers never touch session state directly; they submit events
//! over a channel and one task applies them in arrival order, then hands the
//! resulting messages to the gateway.

use std::sync::Arc;

use shared::{ConnectionId, InboundEvent, SessionSnapshot};
use tokio::sync::{mpsc, oneshot};

use super::coordinator::{Coordinator, Gateway};
use super::error::SessionError;

enum Command {
    Event {
        sender: ConnectionId,
        event: InboundEvent,
    },
    Reject {
        sender: ConnectionId,
        error: SessionError,
    },
    Resync {
        id: ConnectionId,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Cloneable handle to the session event loop.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Spawn the event loop on the current runtime. The loop ends once every
    /// handle has been dropped.
    pub fn spawn<G>(gateway: Arc<G>, capacity: usize) -> Self
    where
        G: Gateway + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(run(rx, gateway, Coordinator::new()));
        Self { tx }
    }

    /// Queue an event from `sender`. Resolves once the event is accepted by
    /// the loop, not once it has been applied.
    pub async fn submit(&self, sender: ConnectionId, event: InboundEvent) -> Result<(), SessionError> {
        self.tx
            .send(Command::Event { sender, event })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Report a transport-level error to `sender`, ordered with its other
    /// messages.
    pub async fn reject(&self, sender: ConnectionId, error: SessionError) -> Result<(), SessionError> {
        self.tx
            .send(Command::Reject { sender, error })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Re-send the full session state to `id`, ordered after every message
    /// already dispatched.
    pub async fn resync(&self, id: ConnectionId) -> Result<(), SessionError> {
        self.tx
            .send(Command::Resync { id })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// State between two transitions.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}

async fn run<G>(mut rx: mpsc::Receiver<Command>, gateway: Arc<G>, mut coordinator: Coordinator)
where
    G: Gateway + ?Sized,
{
    tracing::debug!("session event loop started");
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Event { sender, event } => {
                let outbound = coordinator.apply(sender, event);
                gateway.dispatch(outbound);
            }
            Command::Reject { sender, error } => {
                gateway.dispatch(Coordinator::reject(sender, &error));
            }
            Command::Resync { id } => {
                gateway.dispatch(coordinator.resync(id));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(coordinator.snapshot());
            }
        }
    }
    tracing::debug!("session event loop stopped");
}
