//! Configuration for the watch party server.

use std::net::{AddrParseError, SocketAddr};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Outbound messages buffered per subscriber before it lags.
    pub broadcast_capacity: usize,
    /// Inbound events buffered ahead of the session loop.
    pub event_queue_capacity: usize,
    pub ping_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unparsable values fall back
    /// to their defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = var("PORT").and_then(|v| v.parse().ok()).unwrap_or(5000);
        let broadcast_capacity = var("BROADCAST_CAPACITY")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024);
        let event_queue_capacity = var("EVENT_QUEUE_CAPACITY")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024);
        let ping_interval_secs = var("PING_INTERVAL_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Self {
            host,
            port,
            broadcast_capacity,
            event_queue_capacity,
            ping_interval_secs,
        }
    }

    pub fn for_test() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            broadcast_capacity: 256,
            event_queue_capacity: 64,
            ping_interval_secs: 30,
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}
