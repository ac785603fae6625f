//! ws-link command-line client.
//!
//! Connects to `WS_LINK_URL`, prints inbound frames (or, with
//! `WS_LINK_EVENT`, the payloads of that event) to stdout, and sends each
//! line read from stdin as a frame.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use ws_link::config::{ClientConfig, LogFormat};
use ws_link::connection::{Connection, ConnectionOptions, ConnectionState};
use ws_link::subscription::{Subscription, SubscriptionOptions};
use ws_link::transport::CloseInfo;

/// How long to wait for the socket to finish closing on exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Either a raw connection or an event subscription.
enum Session {
    Raw(Connection),
    Events(Subscription),
}

impl Session {
    fn connection(&self) -> &Connection {
        match self {
            Self::Raw(connection) => connection,
            Self::Events(subscription) => subscription.connection(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ClientConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
    tracing::info!(url = %config.url, event = ?config.event, "starting ws-link");

    // Every socket close is reported here, so shutdown can wait for it
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel::<u16>();
    let on_close = move |info: &CloseInfo| {
        let _ = closed_tx.send(info.code);
    };

    let session = match config.event.clone() {
        Some(event) => Session::Events(Subscription::open(
            SubscriptionOptions::new(config.url.clone(), event, |data| println!("{data}"))
                .reconnect_policy(config.policy)
                .on_close(on_close),
        )),
        None => Session::Raw(Connection::open(
            ConnectionOptions::new(config.url.clone())
                .reconnect_policy(config.policy)
                .on_message(|text| println!("{text}"))
                .on_close(on_close),
        )),
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if !line.is_empty() {
                            session.connection().send(line);
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to read stdin");
                        break;
                    }
                }
            }
        }
    }

    // Unsubscribe and close, then wait for the socket task to finish the
    // close handshake. Without a live socket there is nothing to wait for.
    while closed_rx.try_recv().is_ok() {}
    let has_socket = matches!(
        session.connection().status(),
        ConnectionState::Connecting | ConnectionState::Connected
    );
    if let Session::Events(subscription) = &session {
        subscription.set_enabled(false);
    }
    session.connection().disconnect();
    if has_socket
        && tokio::time::timeout(SHUTDOWN_GRACE, closed_rx.recv())
            .await
            .is_err()
    {
        tracing::warn!("socket did not close in time");
    }
    drop(session);
    tracing::info!("ws-link stopped");

    Ok(())
}
