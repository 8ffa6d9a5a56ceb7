//! Watch party client — command-line participant.

pub mod cli;
pub mod session_client;
