//! WebSocket transport loop
//!
//! Thin collaborator around `tokio-tungstenite`: connects, feeds inbound
//! text frames to the dispatcher strictly in arrival order, drains the
//! outbound message channel, answers transport-level pings, and reconnects
//! with capped exponential backoff. All protocol knowledge lives in the
//! dispatcher and adapter; nothing here inspects frame contents.

use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{FeedError, Result};

/// Maximum backoff delay in milliseconds (60 seconds)
const MAX_BACKOFF_MS: u64 = 60_000;
/// Cooldown period after which reconnect attempts are reset (5 minutes)
const RECONNECT_COOLDOWN_SECS: u64 = 300;

/// Called after each successful connect so subscriptions can be (re)sent.
pub type OnConnect = Box<dyn Fn() -> Result<()> + Send>;

/// Runs one exchange connection indefinitely, reconnecting on failure.
pub struct FeedRunner {
    endpoint: String,
    reconnect_delay_ms: u64,
    dispatcher: Dispatcher,
    outbound: mpsc::UnboundedReceiver<String>,
    on_connect: Option<OnConnect>,
    reconnect_attempts: u32,
    last_successful_connection: Option<Instant>,
}

impl FeedRunner {
    pub fn new(
        endpoint: &str,
        reconnect_delay_ms: u64,
        dispatcher: Dispatcher,
        outbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            reconnect_delay_ms,
            dispatcher,
            outbound,
            on_connect: None,
            reconnect_attempts: 0,
            last_successful_connection: None,
        }
    }

    pub fn on_connect(mut self, hook: OnConnect) -> Self {
        self.on_connect = Some(hook);
        self
    }

    /// Run the connection loop indefinitely with automatic reconnection.
    pub async fn run(&mut self) -> Result<()> {
        info!(endpoint = %self.endpoint, "starting feed runner");

        loop {
            if let Some(last_success) = self.last_successful_connection {
                if last_success.elapsed() > Duration::from_secs(RECONNECT_COOLDOWN_SECS)
                    && self.reconnect_attempts > 0
                {
                    info!(
                        previous_attempts = self.reconnect_attempts,
                        "resetting reconnect counter after cooldown"
                    );
                    self.reconnect_attempts = 0;
                }
            }

            match self.connect_and_process().await {
                Ok(()) => {
                    info!("connection closed normally, reconnecting");
                    sleep(Duration::from_secs(1)).await;
                }
                Err(e) => {
                    error!(error = %e, "connection error");
                    self.reconnect_attempts += 1;

                    let base_delay =
                        self.reconnect_delay_ms * 2u64.pow(self.reconnect_attempts.min(6));
                    let delay = Duration::from_millis(base_delay.min(MAX_BACKOFF_MS));

                    warn!(
                        attempt = self.reconnect_attempts,
                        delay_secs = delay.as_secs(),
                        "reconnecting after error"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn connect_and_process(&mut self) -> Result<()> {
        let (stream, response) = connect_async(&self.endpoint).await.map_err(|e| {
            FeedError::WebSocketConnection(format!("failed to connect: {e}"))
        })?;
        info!(status = ?response.status(), "connected");

        self.last_successful_connection = Some(Instant::now());
        self.reconnect_attempts = 0;

        // Channel ids are per-connection; drop stale associations.
        self.dispatcher.reset();

        if let Some(hook) = &self.on_connect {
            if let Err(e) = hook() {
                warn!(error = %e, "on-connect hook failed");
            }
        }

        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                outbound = self.outbound.recv() => {
                    match outbound {
                        Some(text) => write.send(Message::Text(text)).await?,
                        None => return Err(FeedError::OutboundClosed),
                    }
                }
                inbound = read.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) => self.dispatcher.on_frame(&text),
                        Some(Ok(Message::Binary(data))) => {
                            if let Ok(text) = String::from_utf8(data) {
                                self.dispatcher.on_frame(&text);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                        Some(Ok(Message::Close(frame))) => {
                            warn!(frame = ?frame, "close frame received");
                            return Ok(());
                        }
                        Some(Err(e)) => {
                            return Err(FeedError::WebSocketMessage(e.to_string()));
                        }
                        None => {
                            return Err(FeedError::WebSocketConnection(
                                "stream ended".to_string(),
                            ));
                        }
                    }
                }
            }
        }
    }
}
