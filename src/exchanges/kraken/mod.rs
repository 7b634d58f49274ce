//! Kraken exchange adapter
//!
//! Wire message builders, frame classifier, and normalizers for the Kraken
//! WebSocket feed. Subscription protocols differ per channel kind: ticker
//! and trade topics take one templated message per market, book updates take
//! a single batch message for all markets, and the book-snapshot RPC takes a
//! fixed parameter set.

mod types;

use chrono::Utc;
use serde_json::{json, Value};

use crate::error::{FeedError, Result};
use crate::exchanges::{Capabilities, ChannelKind, ClassifiedFrame, ExchangeAdapter};
use crate::model::{
    Level2Point, Level2Snapshot, Level2Update, Market, Ticker, Trade, TradeSide,
};
use crate::reconcile::{reconcile_side, RawPoint};
use crate::registry::ChannelId;

use types::{
    parse_book_tuple, unix_seconds, KrakenBookDeltaData, KrakenBookSnapshotData, KrakenControl,
    KrakenTickerData, KrakenTradeData,
};

/// Adapter for Kraken's public WebSocket API.
pub struct KrakenAdapter {
    book_depth: u32,
}

impl KrakenAdapter {
    pub fn new(book_depth: u32) -> Self {
        Self { book_depth }
    }

    fn classify_control(&self, frame: &Value) -> ClassifiedFrame {
        let Ok(control) = serde_json::from_value::<KrakenControl>(frame.clone()) else {
            return ClassifiedFrame::Ignored;
        };

        if let Some(detail) = control.error_message {
            return ClassifiedFrame::ExchangeError { detail };
        }
        if let Some(error) = control.error {
            return ClassifiedFrame::ExchangeError {
                detail: error.to_string(),
            };
        }
        if let Some(token) = control.ping {
            return ClassifiedFrame::Ping { token };
        }

        if control.event.as_deref() == Some("subscriptionStatus") {
            if control.status.as_deref() == Some("unsubscribed") {
                if let Some(id) = control.channel_id {
                    return ClassifiedFrame::UnsubscriptionAck {
                        channel_id: ChannelId(id),
                    };
                }
            }
            if let (Some(id), Some(pair)) = (control.channel_id, control.pair) {
                return ClassifiedFrame::SubscriptionAck {
                    channel_id: ChannelId(id),
                    remote_pair: pair,
                };
            }
        }

        // heartbeat, systemStatus, subscribe echoes
        ClassifiedFrame::Ignored
    }

    fn classify_data(&self, items: &[Value]) -> ClassifiedFrame {
        let Some(id) = items.first().and_then(Value::as_u64) else {
            return ClassifiedFrame::Ignored;
        };
        let channel_id = ChannelId(id);

        // Channel name is the first string element after the payloads.
        if let Some(name) = items.iter().skip(1).find_map(Value::as_str) {
            if name.starts_with("trade") || name.contains(".trade.") {
                return ClassifiedFrame::Trades { channel_id };
            }
            if name.starts_with("ticker") || name.ends_with(".detail") {
                return ClassifiedFrame::Ticker { channel_id };
            }
        }

        // Book frames are discriminated by payload shape: `as`/`bs` carry a
        // full book, `a`/`b` carry a delta.
        let objects = items.iter().filter_map(Value::as_object);
        for obj in objects {
            if obj.contains_key("as") || obj.contains_key("bs") {
                return ClassifiedFrame::Snapshot { channel_id };
            }
            if obj.contains_key("a") || obj.contains_key("b") {
                return ClassifiedFrame::Update { channel_id };
            }
        }

        ClassifiedFrame::Ignored
    }
}

impl Default for KrakenAdapter {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ExchangeAdapter for KrakenAdapter {
    fn name(&self) -> &'static str {
        "Kraken"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            tickers: true,
            trades: true,
            level2_snapshots: false,
            level2_updates: true,
        }
    }

    fn subscribe_messages(&self, kind: ChannelKind, markets: &[Market]) -> Vec<String> {
        match kind {
            ChannelKind::Ticker => markets
                .iter()
                .map(|m| {
                    json!({
                        "sub": format!("market.{}.detail", m.remote_id),
                        "id": m.remote_id,
                    })
                    .to_string()
                })
                .collect(),
            ChannelKind::Trades => markets
                .iter()
                .map(|m| {
                    json!({
                        "sub": format!("market.{}.trade.detail", m.remote_id),
                        "id": m.remote_id,
                    })
                    .to_string()
                })
                .collect(),
            ChannelKind::Level2Snapshots => markets
                .iter()
                .map(|m| {
                    json!({
                        "method": "depth.subscribe",
                        "params": [m.remote_id, 5, "0"],
                        "id": null,
                    })
                    .to_string()
                })
                .collect(),
            ChannelKind::Level2Updates => {
                if markets.is_empty() {
                    return Vec::new();
                }
                let pairs: Vec<&str> = markets.iter().map(|m| m.remote_id.as_str()).collect();
                vec![json!({
                    "event": "subscribe",
                    "pair": pairs,
                    "subscription": { "name": "book", "depth": self.book_depth },
                })
                .to_string()]
            }
        }
    }

    fn unsubscribe_messages(&self, kind: ChannelKind, markets: &[Market]) -> Vec<String> {
        markets
            .iter()
            .map(|m| match kind {
                ChannelKind::Ticker => json!({
                    "unsub": format!("market.{}.detail", m.remote_id),
                    "id": m.remote_id,
                }),
                ChannelKind::Trades => json!({
                    "unsub": format!("market.{}.trade.detail", m.remote_id),
                    "id": m.remote_id,
                }),
                ChannelKind::Level2Snapshots | ChannelKind::Level2Updates => json!({
                    "unsub": format!("market.{}.depth.step0", m.remote_id),
                }),
            })
            .map(|v| v.to_string())
            .collect()
    }

    fn classify(&self, frame: &Value) -> ClassifiedFrame {
        match frame {
            Value::Object(_) => self.classify_control(frame),
            Value::Array(items) => self.classify_data(items),
            _ => ClassifiedFrame::Ignored,
        }
    }

    fn pong_message(&self, token: &Value) -> String {
        json!({ "pong": token }).to_string()
    }

    fn normalize_ticker(&self, frame: &Value, market: &Market) -> Result<Ticker> {
        let data = payload_objects(frame)
            .next()
            .ok_or_else(|| FeedError::ParseError("ticker frame without payload".into()))?;
        let data: KrakenTickerData = serde_json::from_value(Value::Object(data.clone()))?;

        let change = data.close - data.open;
        let change_percent = if data.open.is_zero() {
            rust_decimal::Decimal::ZERO
        } else {
            change / data.open * rust_decimal::Decimal::from(100)
        };

        Ok(Ticker {
            market: market.clone(),
            timestamp_ms: now_ms(),
            last: data.close,
            open: data.open,
            high: data.high,
            low: data.low,
            volume: data.amount,
            quote_volume: data.vol,
            change,
            change_percent,
        })
    }

    fn normalize_trades(&self, frame: &Value, market: &Market) -> Result<Vec<Trade>> {
        let Value::Array(items) = frame else {
            return Err(FeedError::ParseError("trade frame is not an array".into()));
        };

        // Entries arrive either as bare objects or as one array of objects.
        let entries = items.iter().skip(1).flat_map(|item| match item {
            Value::Array(inner) => inner.iter().collect::<Vec<_>>(),
            other => vec![other],
        });

        let trades = entries
            .filter(|v| v.is_object())
            .filter_map(|v| serde_json::from_value::<KrakenTradeData>((*v).clone()).ok())
            .map(|datum| {
                let side = if datum.direction == "buy" {
                    TradeSide::Buy
                } else {
                    TradeSide::Sell
                };
                Trade {
                    market: market.clone(),
                    trade_id: datum.id,
                    side,
                    unix: unix_seconds(datum.ts),
                    price: datum.price,
                    amount: datum.amount,
                }
            })
            .collect();

        Ok(trades)
    }

    fn normalize_snapshot(&self, frame: &Value, market: &Market) -> Result<Level2Snapshot> {
        let data = payload_objects(frame)
            .find(|obj| obj.contains_key("as") || obj.contains_key("bs"))
            .ok_or_else(|| FeedError::ParseError("snapshot frame without book payload".into()))?;
        let data: KrakenBookSnapshotData = serde_json::from_value(Value::Object(data.clone()))?;

        let to_points = |tuples: &[Vec<String>]| -> Result<Vec<Level2Point>> {
            tuples
                .iter()
                .map(|t| parse_book_tuple(t).map(|raw| Level2Point::new(raw.price, raw.size)))
                .collect()
        };

        Ok(Level2Snapshot {
            market: market.clone(),
            asks: to_points(&data.asks)?,
            bids: to_points(&data.bids)?,
            timestamp_ms: now_ms(),
        })
    }

    fn normalize_update(&self, frame: &Value, market: &Market) -> Result<Level2Update> {
        // Asks and bids may be split across two payload objects within the
        // same frame; merge them before reconciling.
        let mut raw_asks: Vec<RawPoint> = Vec::new();
        let mut raw_bids: Vec<RawPoint> = Vec::new();

        for obj in payload_objects(frame) {
            if !obj.contains_key("a") && !obj.contains_key("b") {
                continue;
            }
            let data: KrakenBookDeltaData = serde_json::from_value(Value::Object(obj.clone()))?;
            for tuple in &data.a {
                raw_asks.push(parse_book_tuple(tuple)?);
            }
            for tuple in &data.b {
                raw_bids.push(parse_book_tuple(tuple)?);
            }
        }

        Ok(Level2Update {
            market: market.clone(),
            asks: reconcile_side(&raw_asks),
            bids: reconcile_side(&raw_bids),
            timestamp_ms: now_ms(),
        })
    }
}

/// Iterate the object-shaped payload elements of an array frame.
fn payload_objects(frame: &Value) -> impl Iterator<Item = &serde_json::Map<String, Value>> {
    frame
        .as_array()
        .map(|items| items.as_slice())
        .unwrap_or(&[])
        .iter()
        .skip(1)
        .filter_map(Value::as_object)
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
