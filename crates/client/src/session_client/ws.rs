//! WebSocket client for following and driving a watch party session.

use std::time::Duration;

use anyhow::Result;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use shared::{InboundEvent, ProtocolError, ServerMessage, WsEnvelope};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Decode one text frame from the server.
pub fn decode(text: &str) -> Result<ServerMessage, ProtocolError> {
    let envelope = WsEnvelope::parse(text)?;
    ServerMessage::from_envelope(&envelope)
}

/// One-line human-readable rendering of a server message.
pub fn describe(msg: &ServerMessage) -> String {
    match msg {
        ServerMessage::ParticipantListUpdated(list) => {
            let names: Vec<&str> = list.iter().map(|p| p.name.as_str()).collect();
            format!("participants: {}", names.join(", "))
        }
        ServerMessage::QueueUpdated(queue) if queue.is_empty() => "queue: (empty)".to_string(),
        ServerMessage::QueueUpdated(queue) => {
            let entries: Vec<String> = queue
                .iter()
                .enumerate()
                .map(|(i, item)| format!("{}. {} ({})", i + 1, item.title, item.added_by_name))
                .collect();
            format!("queue: {}", entries.join(", "))
        }
        ServerMessage::PlayStarted(p) => format!("play {} from {:.1}s", p.item_id, p.start_time),
        ServerMessage::PositionSync(p) => format!("sync {} at {:.1}s", p.item_id, p.time),
        ServerMessage::PauseBroadcast => "pause".to_string(),
        ServerMessage::QueueFinished => "queue finished".to_string(),
        ServerMessage::ErrorNotice(e) => format!("error: {}", e.message),
        ServerMessage::NameAssigned(n) => format!("you are {}", n.name),
        ServerMessage::Pong => "pong".to_string(),
    }
}

async fn send_event(tx: &mut WsSink, event: &InboundEvent) -> Result<()> {
    let Some(envelope) = event.to_envelope() else {
        return Ok(());
    };
    tx.send(Message::Text(serde_json::to_string(&envelope)?))
        .await?;
    Ok(())
}

/// Follow the session and print every event. Reconnects after 5s on failure.
pub async fn run_watch(ws_url: &str, name: Option<&str>) -> Result<()> {
    loop {
        match connect_async(ws_url).await {
            Ok((ws, _)) => {
                tracing::info!("Connected to {}", ws_url);
                match watch_connection(ws, name).await {
                    Ok(()) => tracing::info!("Server closed the connection"),
                    Err(e) => tracing::warn!("Connection error: {}", e),
                }
            }
            Err(e) => {
                tracing::warn!("Connect failed: {}, retrying in 5s", e);
            }
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

async fn watch_connection(
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    name: Option<&str>,
) -> Result<()> {
    let (mut ws_tx, mut ws_rx) = ws.split();

    if let Some(name) = name {
        send_event(
            &mut ws_tx,
            &InboundEvent::Rename {
                name: name.to_string(),
            },
        )
        .await?;
    }

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) => break,
            Err(e) => return Err(e.into()),
            _ => continue,
        };
        match decode(&text) {
            Ok(m) => println!("{}", describe(&m)),
            Err(e) => tracing::warn!("Ignoring frame: {}", e),
        }
    }

    Ok(())
}

/// Connect, optionally rename, send `event`, collect whatever arrives within
/// `settle`, then leave.
pub async fn send_once(
    ws_url: &str,
    name: Option<&str>,
    event: InboundEvent,
    settle: Duration,
) -> Result<Vec<ServerMessage>> {
    let (ws, _) = connect_async(ws_url).await?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    if let Some(name) = name {
        send_event(
            &mut ws_tx,
            &InboundEvent::Rename {
                name: name.to_string(),
            },
        )
        .await?;
    }
    send_event(&mut ws_tx, &event).await?;
    tracing::debug!(?event, "event sent");

    let deadline = tokio::time::Instant::now() + settle;
    let mut received = Vec::new();
    loop {
        let next = match tokio::time::timeout_at(deadline, ws_rx.next()).await {
            Ok(next) => next,
            Err(_) => break,
        };
        match next {
            Some(Ok(Message::Text(t))) => match decode(&t) {
                Ok(m) => received.push(m),
                Err(e) => tracing::warn!("Ignoring frame: {}", e),
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        }
    }

    let _ = send_event(&mut ws_tx, &InboundEvent::Leave).await;
    let _ = ws_tx.close().await;
    Ok(received)
}
