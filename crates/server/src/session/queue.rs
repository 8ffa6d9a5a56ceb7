//! Playback queue and the authoritative "now playing" pointer.
//!
//! The pointer is stored as an index but every method that permutes or
//! shrinks the queue recomputes it so it keeps naming the same item.

use shared::{ConnectionId, Direction, QueueItem};

/// An item removed from the queue.
#[derive(Debug, Clone)]
pub struct Removed {
    pub index: usize,
    pub item: QueueItem,
    /// The removed item was the one playing.
    pub was_current: bool,
}

/// Result of a reorder request for an item that exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moved {
    Swapped { from: usize, to: usize },
    /// Already at the boundary in the requested direction.
    AtBoundary,
}

/// Result of advancing while something is playing.
#[derive(Debug, Clone, PartialEq)]
pub enum Advanced {
    Next(QueueItem),
    Finished,
}

#[derive(Debug, Default)]
pub struct PlaybackQueue {
    items: Vec<QueueItem>,
    current: Option<usize>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `None` is IDLE, `Some(i)` is PLAYING(i).
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_item(&self) -> Option<&QueueItem> {
        self.current.and_then(|i| self.items.get(i))
    }

    /// Append an item. Returns true when this starts playback, i.e. the queue
    /// was empty and idle before the append.
    pub fn append(&mut self, item: QueueItem) -> bool {
        let starts = self.is_empty() && self.current.is_none();
        self.items.push(item);
        if starts {
            self.current = Some(0);
        }
        starts
    }

    fn position(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.item_id == item_id)
    }

    /// Remove the first item with `item_id`.
    ///
    /// Removing the playing item leaves the pointer on whatever shifted into
    /// its slot, or goes idle if it was the last one.
    pub fn remove(&mut self, item_id: &str) -> Option<Removed> {
        let index = self.position(item_id)?;
        let item = self.items.remove(index);
        let was_current = self.current == Some(index);

        self.current = match self.current {
            Some(cur) if cur == index => (index < self.items.len()).then_some(index),
            Some(cur) if index < cur => Some(cur - 1),
            other => other,
        };

        Some(Removed {
            index,
            item,
            was_current,
        })
    }

    /// Move the first item with `item_id` one slot in `direction`.
    /// Returns `None` if no such item exists.
    pub fn move_item(&mut self, item_id: &str, direction: Direction) -> Option<Moved> {
        let from = self.position(item_id)?;
        let to = match direction {
            Direction::Up if from > 0 => from - 1,
            Direction::Down if from + 1 < self.items.len() => from + 1,
            _ => return Some(Moved::AtBoundary),
        };

        self.items.swap(from, to);
        // Adjacent swap: the pointer follows whichever item it named.
        self.current = self.current.map(|cur| {
            if cur == from {
                to
            } else if cur == to {
                from
            } else {
                cur
            }
        });

        Some(Moved::Swapped { from, to })
    }

    /// Step past the playing item. Returns `None` when idle.
    pub fn advance(&mut self) -> Option<Advanced> {
        let cur = self.current?;
        let next = cur + 1;
        match self.items.get(next) {
            Some(item) => {
                self.current = Some(next);
                Some(Advanced::Next(item.clone()))
            }
            None => {
                self.current = None;
                Some(Advanced::Finished)
            }
        }
    }

    /// Update the denormalized adder name on every item added by `id`.
    /// Returns how many items changed.
    pub fn rename_adder(&mut self, id: ConnectionId, name: &str) -> usize {
        let mut changed = 0;
        for item in self.items.iter_mut().filter(|i| i.added_by_id == id) {
            item.added_by_name = name.to_string();
            changed += 1;
        }
        changed
    }

    /// IDLE, or PLAYING(i) with `i` in bounds.
    pub fn pointer_is_valid(&self) -> bool {
        match self.current {
            None => true,
            Some(i) => i < self.items.len(),
        }
    }
}
