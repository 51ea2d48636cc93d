//! WebSocket client for the live-score feed

use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, instrument, warn};

use super::messages::parse_live_events;
use crate::common::errors::{EngineError, Result};
use crate::common::types::{ConnectionStatus, FeedEvent};
use crate::config::types::FeedConfig;

/// How a single connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionEnd {
    /// Server closed or the stream ended; reconnect
    Closed(Option<String>),
    /// Nobody is listening any more; stop for good
    ReceiverDropped,
}

/// Persistent live-score connection
///
/// Decodes every pushed frame into [`FeedEvent`]s and forwards them, in
/// arrival order, to a single consumer. Reconnects after a fixed delay,
/// forever, until the shutdown signal fires or the consumer goes away.
pub struct ScoreFeedClient {
    /// WebSocket URL, including provider query parameters
    url: String,
    /// Delay between reconnection attempts
    reconnect_delay: Duration,
    /// Connected state flag
    is_connected: Arc<AtomicBool>,
}

impl ScoreFeedClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_secs(5),
            is_connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        Ok(Self::new(config.connection_url()?.to_string())
            .with_reconnect_delay(config.reconnect_delay()))
    }

    /// Set the reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::SeqCst)
    }

    /// Run the connect/read/reconnect loop until shutdown
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        sender: mpsc::Sender<FeedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut attempt: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = tokio::select! {
                outcome = self.run_session(&sender) => outcome,
                _ = shutdown.changed() => break,
            };
            self.is_connected.store(false, Ordering::SeqCst);

            let status = match outcome {
                Ok(SessionEnd::ReceiverDropped) => {
                    info!("Feed consumer dropped, stopping score feed");
                    return Ok(());
                }
                Ok(SessionEnd::Closed(reason)) => {
                    warn!("Score feed connection closed: {:?}", reason);
                    ConnectionStatus::Disconnected(reason)
                }
                Err(e) => {
                    error!("Score feed error: {}", e);
                    ConnectionStatus::Error(e.to_string())
                }
            };
            if sender.send(FeedEvent::ConnectionStatus(status)).await.is_err() {
                return Ok(());
            }

            attempt += 1;
            info!(
                "Reconnecting to score feed in {:?} (attempt {})",
                self.reconnect_delay, attempt
            );
            let _ = sender
                .send(FeedEvent::ConnectionStatus(ConnectionStatus::Reconnecting { attempt }))
                .await;

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("Score feed stopped by shutdown signal");
        Ok(())
    }

    /// One connection: connect, forward frames until the stream ends
    async fn run_session(&self, sender: &mpsc::Sender<FeedEvent>) -> Result<SessionEnd> {
        debug!("Connecting to score feed: {}", self.url);
        let (mut ws_stream, _response) = connect_async(&self.url)
            .await
            .map_err(|e| EngineError::WebSocketConnection(e.to_string()))?;

        info!("Score feed connection established");
        self.is_connected.store(true, Ordering::SeqCst);
        if sender
            .send(FeedEvent::ConnectionStatus(ConnectionStatus::Connected))
            .await
            .is_err()
        {
            return Ok(SessionEnd::ReceiverDropped);
        }

        while let Some(msg) = ws_stream.next().await {
            match msg? {
                Message::Text(text) => {
                    if Self::forward_frame(&text, sender).await.is_err() {
                        return Ok(SessionEnd::ReceiverDropped);
                    }
                }
                Message::Ping(_) => {
                    // tungstenite queues the pong itself
                    debug!("Received Ping");
                }
                Message::Close(frame) => {
                    return Ok(SessionEnd::Closed(frame.map(|f| f.reason.to_string())));
                }
                _ => {}
            }
        }

        Ok(SessionEnd::Closed(None))
    }

    /// Decode a text frame and forward its records in order
    async fn forward_frame(
        text: &str,
        sender: &mpsc::Sender<FeedEvent>,
    ) -> std::result::Result<(), mpsc::error::SendError<FeedEvent>> {
        let observed_at = chrono::Utc::now();
        let records = match parse_live_events(text, observed_at) {
            Ok(records) => records,
            Err(e) => {
                warn!("Dropping undecodable feed frame: {}", e);
                return sender
                    .send(FeedEvent::Malformed {
                        reason: e.to_string(),
                    })
                    .await;
            }
        };

        for record in records {
            let event = match record {
                Ok(update) => FeedEvent::Update(update),
                Err(e) => {
                    warn!("Dropping malformed feed record: {}", e);
                    FeedEvent::Malformed {
                        reason: e.to_string(),
                    }
                }
            };
            sender.send(event).await?;
        }
        Ok(())
    }
}
