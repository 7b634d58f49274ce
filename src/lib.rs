//! marketfeed - Market Data Normalization Library
//!
//! This crate connects to a cryptocurrency exchange's WebSocket feed,
//! subscribes to ticker/trade/order-book channels per trading pair, and
//! translates exchange-specific wire messages into a canonical event model
//! delivered to a downstream consumer.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod exchanges;
pub mod model;
pub mod publisher;
pub mod reconcile;
pub mod registry;
pub mod subscription;
pub mod websocket;

pub use config::Config;
pub use dispatcher::Dispatcher;
pub use error::{FeedError, Result};
pub use exchanges::{Capabilities, ChannelKind, ExchangeAdapter, KrakenAdapter};
pub use model::{
    Level2Point, Level2Snapshot, Level2Update, Market, MarketEvent, Ticker, Trade, TradeSide,
};
pub use publisher::{Consumer, Publisher};
pub use registry::{ChannelId, ChannelRegistry};
pub use subscription::SubscriptionController;
pub use websocket::FeedRunner;
