//! Watch party client — command-line participant.

use std::env;
use std::time::Duration;

use clap::Parser;
use shared::ServerMessage;
use tracing_subscriber::EnvFilter;
use watchparty_client::{cli, session_client};

/// How long a one-shot command waits for replies.
const SETTLE: Duration = Duration::from_millis(750);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = cli::Cli::parse();
    let ws_url = cli
        .url
        .clone()
        .or_else(|| env::var("RELAY_WS_URL").ok())
        .unwrap_or_else(|| "ws://localhost:5000/ws".to_string());
    let command = cli.command.unwrap_or(cli::Commands::Watch);

    let Some(event) = command.to_event()? else {
        return session_client::run_watch(&ws_url, cli.name.as_deref()).await;
    };

    let replies = session_client::send_once(&ws_url, cli.name.as_deref(), event, SETTLE).await?;
    let mut failure = None;
    for msg in &replies {
        println!("{}", session_client::describe(msg));
        if let ServerMessage::ErrorNotice(e) = msg {
            failure = Some(e.message.clone());
        }
    }
    if let Some(message) = failure {
        anyhow::bail!("server rejected the request: {}", message);
    }

    Ok(())
}
