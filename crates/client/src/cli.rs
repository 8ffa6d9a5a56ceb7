//! CLI argument parsing.

use clap::{Parser, Subcommand};
use shared::{Direction, InboundEvent};

#[derive(Parser)]
#[command(name = "watchparty")]
#[command(about = "Watch party participant — follow the shared queue or change it")]
pub struct Cli {
    /// Server WebSocket URL (default: $RELAY_WS_URL or ws://localhost:5000/ws)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Display name to take after connecting
    #[arg(long, global = true)]
    pub name: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print every session event until interrupted [default]
    Watch,

    /// Add an item to the end of the queue
    Enqueue {
        #[arg(value_name = "ITEM_ID")]
        item_id: String,
    },

    /// Remove the first queued item with this id
    Dequeue {
        #[arg(value_name = "ITEM_ID")]
        item_id: String,
    },

    /// Move an item one slot up or down
    Reorder {
        #[arg(value_name = "ITEM_ID")]
        item_id: String,

        /// "up" or "down"
        #[arg(value_name = "DIRECTION")]
        direction: String,
    },

    /// Report that the playing item finished
    Advance,

    /// Change display name
    Rename {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Report the playback position (seconds) to everyone else
    Sync {
        #[arg(value_name = "TIME")]
        time: f64,
    },

    /// Tell everyone else to pause
    Pause,
}

impl Commands {
    /// The event this command sends, or `None` for `watch`.
    pub fn to_event(&self) -> anyhow::Result<Option<InboundEvent>> {
        let event = match self {
            Self::Watch => return Ok(None),
            Self::Enqueue { item_id } => InboundEvent::Enqueue {
                item_id: item_id.clone(),
            },
            Self::Dequeue { item_id } => InboundEvent::Dequeue {
                item_id: item_id.clone(),
            },
            Self::Reorder { item_id, direction } => InboundEvent::Reorder {
                item_id: item_id.clone(),
                direction: direction.parse::<Direction>()?,
            },
            Self::Advance => InboundEvent::Advance,
            Self::Rename { name } => InboundEvent::Rename { name: name.clone() },
            Self::Sync { time } => InboundEvent::SyncPosition { time: *time },
            Self::Pause => InboundEvent::SyncPause,
        };
        Ok(Some(event))
    }
}
