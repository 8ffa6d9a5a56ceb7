//! Shared session state: participants, queue, playback pointer.

mod coordinator;
mod directory;
mod error;
mod handle;
mod queue;

pub use coordinator::{Coordinator, Gateway, Outbound, Target};
pub use directory::ParticipantDirectory;
pub use error::SessionError;
pub use handle::SessionHandle;
pub use queue::{Advanced, Moved, PlaybackQueue, Removed};
