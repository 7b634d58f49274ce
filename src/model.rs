//! Canonical market data model
//!
//! Exchange-neutral value types produced by the normalizers. Everything here
//! is an immutable value object; the only mutable state in the crate lives in
//! the channel registry.

use rust_decimal::Decimal;
use serde::Serialize;

/// A trading pair, identified both in caller vocabulary (base/quote) and in
/// the exchange's own vocabulary (`remote_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Market {
    pub base: String,
    pub quote: String,
    /// Exchange-native identifier, e.g. "XBT/USD" on Kraken.
    pub remote_id: String,
}

impl Market {
    pub fn new(base: &str, quote: &str, remote_id: &str) -> Self {
        Self {
            base: base.to_string(),
            quote: quote.to_string(),
            remote_id: remote_id.to_string(),
        }
    }

    /// Caller-facing pair name, e.g. "BTC/USD".
    pub fn pair(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// One price level: size 0 signals removal of the level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Level2Point {
    pub price: Decimal,
    pub size: Decimal,
    /// Number of orders at this level, when the exchange supplies it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl Level2Point {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self {
            price,
            size,
            count: None,
        }
    }
}

/// Full (or fixed-depth) view of the order book at one instant.
///
/// Asks ascending, bids descending by price, preserved from the exchange
/// ordering where the exchange already sorts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Level2Snapshot {
    pub market: Market,
    pub asks: Vec<Level2Point>,
    pub bids: Vec<Level2Point>,
    pub timestamp_ms: u64,
}

/// Incremental delta naming only the price levels that changed.
///
/// Sequence order carries no book-ranking meaning: each side is the
/// deduplicated set of changed levels, at most one entry per price, and the
/// consumer may apply them in any order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Level2Update {
    pub market: Market,
    pub asks: Vec<Level2Point>,
    pub bids: Vec<Level2Point>,
    pub timestamp_ms: u64,
}

/// Normalized 24h ticker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticker {
    pub market: Market,
    pub timestamp_ms: u64,
    pub last: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    /// Base-asset volume.
    pub volume: Decimal,
    /// Quote-asset volume.
    pub quote_volume: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
}

/// Normalized public trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub market: Market,
    pub trade_id: String,
    pub side: TradeSide,
    /// Unix timestamp in whole seconds, regardless of the exchange's native
    /// unit.
    pub unix: u64,
    pub price: Decimal,
    pub amount: Decimal,
}

/// One normalized event, tagged by kind, as delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data")]
pub enum MarketEvent {
    #[serde(rename = "ticker")]
    Ticker(Ticker),
    #[serde(rename = "trade")]
    Trade(Trade),
    #[serde(rename = "l2snapshot")]
    L2Snapshot(Level2Snapshot),
    #[serde(rename = "l2update")]
    L2Update(Level2Update),
}

impl MarketEvent {
    /// Event kind label used for tagging and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            MarketEvent::Ticker(_) => "ticker",
            MarketEvent::Trade(_) => "trade",
            MarketEvent::L2Snapshot(_) => "l2snapshot",
            MarketEvent::L2Update(_) => "l2update",
        }
    }

    /// The market the event belongs to.
    pub fn market(&self) -> &Market {
        match self {
            MarketEvent::Ticker(t) => &t.market,
            MarketEvent::Trade(t) => &t.market,
            MarketEvent::L2Snapshot(s) => &s.market,
            MarketEvent::L2Update(u) => &u.market,
        }
    }
}
