//! Participant directory: connection identity to display name.

use shared::{ConnectionId, Participant, UNKNOWN_USER};

/// Connected participants in arrival order.
#[derive(Debug, Default)]
pub struct ParticipantDirectory {
    participants: Vec<Participant>,
}

impl ParticipantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant with the default name for `id`.
    ///
    /// Adding an identity that is already present is a no-op and returns the
    /// existing entry unchanged.
    pub fn add(&mut self, id: ConnectionId) -> Participant {
        if let Some(existing) = self.get(id) {
            return existing.clone();
        }
        let participant = Participant {
            id,
            name: id.default_name(),
        };
        self.participants.push(participant.clone());
        participant
    }

    /// Rename a participant. Returns false if `id` is unknown or the trimmed
    /// name is empty.
    pub fn rename(&mut self, id: ConnectionId, new_name: &str) -> bool {
        let name = new_name.trim();
        if name.is_empty() {
            return false;
        }
        match self.participants.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.name = name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Participant> {
        let pos = self.participants.iter().position(|p| p.id == id)?;
        Some(self.participants.remove(pos))
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.get(id).is_some()
    }

    /// Display name for `id`, or "Unknown User".
    pub fn lookup_name(&self, id: ConnectionId) -> String {
        self.get(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| UNKNOWN_USER.to_string())
    }

    pub fn snapshot(&self) -> Vec<Participant> {
        self.participants.clone()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
