//! API route handlers.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use shared::{ConnectionId, InboundEvent, SessionSnapshot, WsEnvelope};

use crate::api::AppState;
use crate::session::SessionError;

pub fn api_routes() -> Router<AppState> {
    Router::new().route("/session", get(session_snapshot))
}

/// Read-only view of participants, queue, and pointer.
async fn session_snapshot(
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, (StatusCode, String)> {
    state
        .session
        .snapshot()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

// --- WebSocket ---

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> axum::response::Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One participant. The upgrade is the join, the end of the stream is the
/// leave; every frame in between is decoded and submitted to the session
/// loop.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::new();
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Subscribe before joining so the join snapshot is not missed.
    let mut rx = state.relay.subscribe();
    if state
        .session
        .submit(connection_id, InboundEvent::Join)
        .await
        .is_err()
    {
        return;
    }

    let mut ping_interval =
        tokio::time::interval(Duration::from_secs(state.config.ping_interval_secs.max(1)));
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let session = state.session.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                recv = rx.recv() => {
                    let outbound = match recv {
                        Ok(o) => o,
                        Err(RecvError::Lagged(skipped)) => {
                            // Dropped messages are gone; replace them with the
                            // current state, queued behind what is still buffered.
                            tracing::warn!(%connection_id, skipped, "connection lagged behind relay");
                            if session.resync(connection_id).await.is_err() {
                                break;
                            }
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if !outbound.target.includes(connection_id) {
                        continue;
                    }
                    let encoded = outbound
                        .message
                        .to_envelope()
                        .and_then(|env| serde_json::to_string(&env));
                    let json = match encoded {
                        Ok(j) => j,
                        Err(e) => {
                            tracing::error!(%connection_id, error = %e, "failed to encode message");
                            continue;
                        }
                    };
                    if ws_tx.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "ws read error");
                break;
            }
        };

        let decoded = WsEnvelope::parse(text.as_str()).and_then(|env| InboundEvent::from_envelope(&env));
        let submitted = match decoded {
            Ok(InboundEvent::Leave) => break,
            Ok(event) => state.session.submit(connection_id, event).await,
            Err(e) => {
                state
                    .session
                    .reject(connection_id, SessionError::from(e))
                    .await
            }
        };
        if submitted.is_err() {
            break;
        }
    }

    let _ = state
        .session
        .submit(connection_id, InboundEvent::Leave)
        .await;
    writer.abort();
    tracing::debug!(%connection_id, "connection closed");
}

#[cfg(test)]
mod tests {
    use crate::api::{router, AppState};
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures_util::{SinkExt, StreamExt};
    use http_body_util::BodyExt;
    use shared::{ws_types, InboundEvent, ServerMessage, SessionSnapshot, WsEnvelope};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use tower::ServiceExt;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn spawn_server() -> (SocketAddr, AppState) {
        spawn_server_with(Config::for_test()).await
    }

    async fn spawn_server_with(config: Config) -> (SocketAddr, AppState) {
        let state = AppState::new(config);
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, state)
    }

    async fn send(ws: &mut Client, event: InboundEvent) {
        let env = event.to_envelope().unwrap();
        ws.send(Message::Text(serde_json::to_string(&env).unwrap()))
            .await
            .unwrap();
    }

    async fn next_message(ws: &mut Client) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for a frame");
            match frame {
                Some(Ok(Message::Text(t))) => {
                    let env = WsEnvelope::parse(&t).unwrap();
                    return ServerMessage::from_envelope(&env).unwrap();
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {other:?}"),
            }
        }
    }

    /// Read until a message of `kind`, returning it and everything skipped.
    async fn next_of_kind(ws: &mut Client, kind: &str) -> (ServerMessage, Vec<ServerMessage>) {
        let mut skipped = Vec::new();
        loop {
            let msg = next_message(ws).await;
            if msg.kind() == kind {
                return (msg, skipped);
            }
            skipped.push(msg);
        }
    }

    /// Connect and consume the join snapshot. Returns the assigned name.
    async fn join(addr: SocketAddr) -> (Client, String) {
        let (mut ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        let name = match next_of_kind(&mut ws, ws_types::NAME_ASSIGNED).await.0 {
            ServerMessage::NameAssigned(p) => p.name,
            other => panic!("unexpected {other:?}"),
        };
        next_of_kind(&mut ws, ws_types::PARTICIPANT_LIST_UPDATED).await;
        next_of_kind(&mut ws, ws_types::QUEUE_UPDATED).await;
        (ws, name)
    }

    async fn wait_for_snapshot(
        state: &AppState,
        done: impl Fn(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        for _ in 0..100 {
            let snap = state.session.snapshot().await.unwrap();
            if done(&snap) {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("session never reached the expected state");
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let state = AppState::new(Config::for_test());
        let response = router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn session_snapshot_route_reports_state() {
        let state = AppState::new(Config::for_test());
        let alice = shared::ConnectionId::new();
        state
            .session
            .submit(alice, InboundEvent::Join)
            .await
            .unwrap();
        state
            .session
            .submit(
                alice,
                InboundEvent::Enqueue {
                    item_id: "abc".to_string(),
                },
            )
            .await
            .unwrap();

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["currentIndex"], 0);
        assert_eq!(json["queue"][0]["itemId"], "abc");
        assert_eq!(json["participants"][0]["name"], alice.default_name());
    }

    #[tokio::test]
    async fn two_participants_share_queue_and_sync() {
        let (addr, _state) = spawn_server().await;
        let (mut a, a_name) = join(addr).await;
        let (mut b, _) = join(addr).await;
        assert!(a_name.starts_with("USER-"));

        match next_of_kind(&mut a, ws_types::PARTICIPANT_LIST_UPDATED).await.0 {
            ServerMessage::ParticipantListUpdated(list) => assert_eq!(list.len(), 2),
            other => panic!("unexpected {other:?}"),
        }

        send(
            &mut a,
            InboundEvent::Enqueue {
                item_id: "vid1".to_string(),
            },
        )
        .await;
        for ws in [&mut a, &mut b] {
            match next_of_kind(ws, ws_types::QUEUE_UPDATED).await.0 {
                ServerMessage::QueueUpdated(q) => {
                    assert_eq!(q.len(), 1);
                    assert_eq!(q[0].added_by_name, a_name);
                }
                other => panic!("unexpected {other:?}"),
            }
            assert_eq!(
                next_message(ws).await,
                ServerMessage::play_started("vid1", 0.0)
            );
        }

        // position reports reach everyone but the sender
        send(&mut a, InboundEvent::SyncPosition { time: 12.0 }).await;
        match next_of_kind(&mut b, ws_types::POSITION_SYNC).await.0 {
            ServerMessage::PositionSync(p) => {
                assert_eq!(p.item_id, "vid1");
                assert_eq!(p.time, 12.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        send(&mut a, InboundEvent::Ping).await;
        let (_, skipped) = next_of_kind(&mut a, ws_types::PONG).await;
        assert!(skipped.iter().all(|m| m.kind() != ws_types::POSITION_SYNC));

        // a malformed frame is reported to its sender only
        b.send(Message::Text("garbage".to_string())).await.unwrap();
        assert!(matches!(
            next_of_kind(&mut b, ws_types::ERROR_NOTICE).await.0,
            ServerMessage::ErrorNotice(_)
        ));
        send(&mut a, InboundEvent::Ping).await;
        let (_, skipped) = next_of_kind(&mut a, ws_types::PONG).await;
        assert!(skipped.iter().all(|m| m.kind() != ws_types::ERROR_NOTICE));

        // disconnecting is a leave
        a.close(None).await.unwrap();
        loop {
            if let ServerMessage::ParticipantListUpdated(list) =
                next_of_kind(&mut b, ws_types::PARTICIPANT_LIST_UPDATED).await.0
            {
                if list.len() == 1 {
                    break;
                }
            }
        }
    }

    #[tokio::test]
    async fn late_joiner_receives_current_item() {
        let (addr, _state) = spawn_server().await;
        let (mut a, _) = join(addr).await;
        for id in ["A", "B"] {
            send(
                &mut a,
                InboundEvent::Enqueue {
                    item_id: id.to_string(),
                },
            )
            .await;
        }
        send(&mut a, InboundEvent::Advance).await;
        assert_eq!(
            next_of_kind(&mut a, ws_types::PLAY_STARTED).await.0,
            ServerMessage::play_started("A", 0.0)
        );
        assert_eq!(
            next_of_kind(&mut a, ws_types::PLAY_STARTED).await.0,
            ServerMessage::play_started("B", 0.0)
        );

        let (mut c, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        match next_of_kind(&mut c, ws_types::QUEUE_UPDATED).await.0 {
            ServerMessage::QueueUpdated(q) => assert_eq!(q.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            next_message(&mut c).await,
            ServerMessage::play_started("B", 0.0)
        );
    }

    #[tokio::test]
    async fn lagging_connection_is_resynced() {
        let config = Config {
            broadcast_capacity: 8,
            ..Config::for_test()
        };
        let (addr, state) = spawn_server_with(config).await;
        let (mut b, _) = join(addr).await;
        let (mut a, _) = join(addr).await;

        // b stops reading while a floods the session
        for n in 0..300 {
            send(
                &mut a,
                InboundEvent::Enqueue {
                    item_id: n.to_string(),
                },
            )
            .await;
        }
        send(&mut a, InboundEvent::Advance).await;
        wait_for_snapshot(&state, |s| {
            s.queue.len() == 300 && s.current_index == Some(1)
        })
        .await;

        let mut last_queue_len = 0;
        loop {
            match next_message(&mut b).await {
                ServerMessage::QueueUpdated(q) => last_queue_len = q.len(),
                ServerMessage::PlayStarted(p) if p.item_id == "1" => break,
                _ => {}
            }
        }
        assert_eq!(last_queue_len, 300);
        assert_eq!(state.session.snapshot().await.unwrap().participants.len(), 2);
    }

    #[tokio::test]
    async fn explicit_leave_removes_participant() {
        let (addr, state) = spawn_server().await;
        let (mut a, _) = join(addr).await;
        let (_b, _) = join(addr).await;
        assert_eq!(state.session.snapshot().await.unwrap().participants.len(), 2);

        send(&mut a, InboundEvent::Leave).await;
        let snap = wait_for_snapshot(&state, |s| s.participants.len() == 1).await;
        assert_eq!(snap.participants.len(), 1);
    }

    #[tokio::test]
    async fn rename_over_websocket_updates_queue_names() {
        let (addr, state) = spawn_server().await;
        let (mut a, _) = join(addr).await;
        send(
            &mut a,
            InboundEvent::Enqueue {
                item_id: "x".to_string(),
            },
        )
        .await;
        send(
            &mut a,
            InboundEvent::Rename {
                name: "alice".to_string(),
            },
        )
        .await;

        let snap = wait_for_snapshot(&state, |s| {
            s.participants.first().map(|p| p.name.as_str()) == Some("alice")
        })
        .await;
        assert_eq!(snap.queue[0].added_by_name, "alice");
    }
}
