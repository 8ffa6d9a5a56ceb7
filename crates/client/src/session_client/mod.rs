//! WebSocket session client.

mod ws;

pub use ws::{decode, describe, run_watch, send_once};
