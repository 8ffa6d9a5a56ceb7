//! HTTP and WebSocket API.

mod routes;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::relay::RelayState;
use crate::session::SessionHandle;

/// Shared app state.
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub relay: Arc<RelayState>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build the relay and spawn the session loop. Must be called inside a
    /// tokio runtime.
    pub fn new(config: Config) -> Self {
        let relay = Arc::new(RelayState::new(config.broadcast_capacity));
        let session = SessionHandle::spawn(relay.clone(), config.event_queue_capacity);
        Self {
            session,
            relay,
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .nest("/api", routes::api_routes())
        .route("/ws", get(routes::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
