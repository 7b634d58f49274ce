//! Error types for the normalization layer

use thiserror::Error;

use crate::exchanges::ChannelKind;

/// Feed handler errors
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Failed to parse frame: {0}")]
    ParseError(String),

    #[error("{exchange} does not support {kind} subscriptions")]
    Unsupported {
        exchange: &'static str,
        kind: ChannelKind,
    },

    #[error("Outbound channel closed")]
    OutboundClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::WebSocketConnection(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
