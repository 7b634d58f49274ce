//! Exchange adapters
//!
//! Each exchange is a variant implementing [`ExchangeAdapter`]: wire message
//! builders for subscribe/unsubscribe, a frame classifier, and normalizers
//! from exchange payloads into the canonical model. Shared connection
//! lifecycle (dispatch, registry, delivery) lives in the rest of the crate,
//! parameterized by the adapter.

pub mod kraken;

pub use kraken::KrakenAdapter;

use std::fmt;

use serde_json::Value;

use crate::error::Result;
use crate::model::{Level2Snapshot, Level2Update, Market, Ticker, Trade};
use crate::registry::ChannelId;

/// The four kinds of market data channel an adapter can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Ticker,
    Trades,
    Level2Snapshots,
    Level2Updates,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelKind::Ticker => "ticker",
            ChannelKind::Trades => "trades",
            ChannelKind::Level2Snapshots => "level2 snapshot",
            ChannelKind::Level2Updates => "level2 update",
        };
        f.write_str(name)
    }
}

/// Which channel kinds an exchange adapter supports. Callers must not
/// subscribe to an unsupported kind; the subscription controller rejects
/// such calls before anything is sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub tickers: bool,
    pub trades: bool,
    pub level2_snapshots: bool,
    pub level2_updates: bool,
}

impl Capabilities {
    pub fn supports(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Ticker => self.tickers,
            ChannelKind::Trades => self.trades,
            ChannelKind::Level2Snapshots => self.level2_snapshots,
            ChannelKind::Level2Updates => self.level2_updates,
        }
    }
}

/// Result of classifying one inbound frame.
///
/// A closed set of frame shapes per exchange: adding a new shape is a
/// compile-time-checked addition here rather than another untyped field
/// probe at the dispatch site. Data variants carry only the wire channel id;
/// the matching normalizer re-reads the payload with typed wire structs.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedFrame {
    /// The exchange confirmed a subscription, associating a wire channel id
    /// with an exchange-native pair name.
    SubscriptionAck {
        channel_id: ChannelId,
        remote_pair: String,
    },
    /// The exchange confirmed an unsubscribe; the channel id is dead.
    UnsubscriptionAck { channel_id: ChannelId },
    /// Application-level error reported by the exchange.
    ExchangeError { detail: String },
    /// Keep-alive request carrying a peer token to echo back.
    Ping { token: Value },
    Ticker { channel_id: ChannelId },
    Trades { channel_id: ChannelId },
    Snapshot { channel_id: ChannelId },
    Update { channel_id: ChannelId },
    /// Heartbeats, status frames, and anything else safely skippable.
    Ignored,
}

/// Fixed capability interface implemented by each exchange variant.
pub trait ExchangeAdapter: Send + Sync {
    /// Exchange display name.
    fn name(&self) -> &'static str;

    /// Channel kinds this adapter supports.
    fn capabilities(&self) -> Capabilities;

    /// Build the literal subscribe wire messages for the given markets.
    ///
    /// Batching is exchange-specific: the result may be one message per
    /// market, a single batch message, or an envelope with fixed parameters.
    fn subscribe_messages(&self, kind: ChannelKind, markets: &[Market]) -> Vec<String>;

    /// Build the literal unsubscribe wire messages for the given markets.
    fn unsubscribe_messages(&self, kind: ChannelKind, markets: &[Market]) -> Vec<String>;

    /// Classify one parsed inbound frame.
    fn classify(&self, frame: &Value) -> ClassifiedFrame;

    /// Build the keep-alive response echoing the peer's token.
    fn pong_message(&self, token: &Value) -> String;

    fn normalize_ticker(&self, frame: &Value, market: &Market) -> Result<Ticker>;

    fn normalize_trades(&self, frame: &Value, market: &Market) -> Result<Vec<Trade>>;

    fn normalize_snapshot(&self, frame: &Value, market: &Market) -> Result<Level2Snapshot>;

    /// Normalize an incremental book frame. Runs the payload through the
    /// reconciliation engine so the result has at most one entry per price
    /// per side.
    fn normalize_update(&self, frame: &Value, market: &Market) -> Result<Level2Update>;
}
