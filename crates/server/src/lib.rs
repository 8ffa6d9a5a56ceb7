//! Watch party server — shared queue, playback pointer, WebSocket fan-out.

pub mod api;
pub mod config;
pub mod relay;
pub mod session;
