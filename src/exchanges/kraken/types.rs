//! Kraken wire-format types for WebSocket message deserialization.
//!
//! Control frames are JSON objects carrying an `event` tag; market data
//! arrives as positionally-encoded arrays `[channelID, payload.., channelName,
//! pair]` whose payload objects are deserialized with the types below before
//! normalization.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{FeedError, Result};
use crate::reconcile::RawPoint;

/// Object-shaped control frame: subscription status, heartbeat, system
/// status, error, or keep-alive request.
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenControl {
    pub event: Option<String>,
    #[serde(rename = "channelID")]
    pub channel_id: Option<u64>,
    pub pair: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
    pub error: Option<Value>,
    /// Peer keep-alive token, echoed back verbatim in the pong.
    pub ping: Option<Value>,
}

/// Full-book payload object: `as`/`bs` carry the complete (depth-limited)
/// book as `[price, size, timestamp]` string tuples.
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenBookSnapshotData {
    #[serde(rename = "as", default)]
    pub asks: Vec<Vec<String>>,
    #[serde(rename = "bs", default)]
    pub bids: Vec<Vec<String>>,
}

/// Incremental-book payload object: `a`/`b` name only changed levels. A
/// single wire frame may split asks and bids across two of these objects.
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenBookDeltaData {
    #[serde(default)]
    pub a: Vec<Vec<String>>,
    #[serde(default)]
    pub b: Vec<Vec<String>>,
}

/// 24h ticker payload from the `detail` topic.
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenTickerData {
    #[serde(deserialize_with = "decimal_flex")]
    pub open: Decimal,
    #[serde(deserialize_with = "decimal_flex")]
    pub close: Decimal,
    #[serde(deserialize_with = "decimal_flex")]
    pub high: Decimal,
    #[serde(deserialize_with = "decimal_flex")]
    pub low: Decimal,
    /// Quote-asset volume.
    #[serde(deserialize_with = "decimal_flex")]
    pub vol: Decimal,
    /// Base-asset volume.
    #[serde(deserialize_with = "decimal_flex")]
    pub amount: Decimal,
}

/// One trade from the `trade.detail` topic.
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenTradeData {
    #[serde(deserialize_with = "decimal_flex")]
    pub amount: Decimal,
    /// "buy" or "sell".
    pub direction: String,
    /// Exchange-native timestamp: whole milliseconds, whole seconds, or a
    /// fractional-seconds string.
    #[serde(deserialize_with = "decimal_flex")]
    pub ts: Decimal,
    #[serde(deserialize_with = "decimal_flex")]
    pub price: Decimal,
    #[serde(deserialize_with = "string_flex")]
    pub id: String,
}

/// Parse a `[price, size]` or `[price, size, timestamp]` string tuple.
pub fn parse_book_tuple(tuple: &[String]) -> Result<RawPoint> {
    if tuple.len() < 2 {
        return Err(FeedError::ParseError(format!(
            "book tuple too short: {tuple:?}"
        )));
    }
    let price: Decimal = tuple[0]
        .parse()
        .map_err(|_| FeedError::ParseError(format!("bad price: {}", tuple[0])))?;
    let size: Decimal = tuple[1]
        .parse()
        .map_err(|_| FeedError::ParseError(format!("bad size: {}", tuple[1])))?;
    let timestamp = tuple.get(2).and_then(|t| t.parse().ok());
    Ok(RawPoint::new(price, size, timestamp))
}

/// Normalize an exchange-native timestamp to whole unix seconds.
///
/// Values at millisecond magnitude are scaled down; fractional seconds are
/// truncated.
pub fn unix_seconds(ts: Decimal) -> u64 {
    let millis_threshold = Decimal::from(1_000_000_000_000u64);
    let seconds = if ts >= millis_threshold {
        ts / Decimal::from(1000)
    } else {
        ts
    };
    seconds.trunc().to_u64().unwrap_or(0)
}

/// Deserialize a decimal the exchange may encode as string or number.
fn decimal_flex<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .to_string()
            .parse()
            .map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected decimal, got {other}"
        ))),
    }
}

/// Deserialize an identifier the exchange may encode as string or number.
fn string_flex<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected identifier, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deserialize_subscription_status() {
        let json = r#"{
            "channelID": 10001,
            "channelName": "book-100",
            "event": "subscriptionStatus",
            "pair": "XBT/USD",
            "status": "subscribed"
        }"#;
        let ctl: KrakenControl = serde_json::from_str(json).unwrap();
        assert_eq!(ctl.event.as_deref(), Some("subscriptionStatus"));
        assert_eq!(ctl.channel_id, Some(10001));
        assert_eq!(ctl.pair.as_deref(), Some("XBT/USD"));
        assert!(ctl.error_message.is_none());
    }

    #[test]
    fn test_deserialize_error_frame() {
        let json = r#"{
            "event": "subscriptionStatus",
            "errorMessage": "Subscription depth not supported",
            "status": "error"
        }"#;
        let ctl: KrakenControl = serde_json::from_str(json).unwrap();
        assert_eq!(
            ctl.error_message.as_deref(),
            Some("Subscription depth not supported")
        );
    }

    #[test]
    fn test_deserialize_snapshot_payload() {
        let json = r#"{
            "as": [["9000.1", "1.5", "1534614057.321597"]],
            "bs": [["8990.0", "2.0", "1534614057.324"]]
        }"#;
        let data: KrakenBookSnapshotData = serde_json::from_str(json).unwrap();
        assert_eq!(data.asks.len(), 1);
        assert_eq!(data.bids.len(), 1);
        assert_eq!(data.asks[0][0], "9000.1");
    }

    #[test]
    fn test_deserialize_delta_payload_single_side() {
        let json = r#"{"a": [["9000.1", "0", "1534614057.321597"]]}"#;
        let data: KrakenBookDeltaData = serde_json::from_str(json).unwrap();
        assert_eq!(data.a.len(), 1);
        assert!(data.b.is_empty());
    }

    #[test]
    fn test_parse_book_tuple_with_timestamp() {
        let tuple = vec![
            "9000.1".to_string(),
            "1.5".to_string(),
            "1534614057.321597".to_string(),
        ];
        let point = parse_book_tuple(&tuple).unwrap();
        assert_eq!(point.price, dec!(9000.1));
        assert_eq!(point.size, dec!(1.5));
        assert!(point.timestamp.is_some());
    }

    #[test]
    fn test_parse_book_tuple_without_timestamp() {
        let tuple = vec!["9000".to_string(), "1".to_string()];
        let point = parse_book_tuple(&tuple).unwrap();
        assert_eq!(point.timestamp, None);
    }

    #[test]
    fn test_parse_book_tuple_rejects_short_tuple() {
        let tuple = vec!["9000".to_string()];
        assert!(parse_book_tuple(&tuple).is_err());
    }

    #[test]
    fn test_ticker_data_accepts_numbers_and_strings() {
        let json = r#"{
            "open": 8800.0,
            "close": "9000.5",
            "high": 9100,
            "low": "8700.25",
            "vol": "1200000",
            "amount": 135.5
        }"#;
        let data: KrakenTickerData = serde_json::from_str(json).unwrap();
        assert_eq!(data.open, dec!(8800.0));
        assert_eq!(data.close, dec!(9000.5));
        assert_eq!(data.amount, dec!(135.5));
    }

    #[test]
    fn test_trade_data_numeric_id() {
        let json = r#"{
            "amount": "0.25",
            "direction": "buy",
            "ts": 1534614057321,
            "price": "9000.5",
            "id": 123456789
        }"#;
        let data: KrakenTradeData = serde_json::from_str(json).unwrap();
        assert_eq!(data.id, "123456789");
        assert_eq!(data.direction, "buy");
    }

    #[test]
    fn test_unix_seconds_from_millis() {
        assert_eq!(unix_seconds(dec!(1534614057321)), 1534614057);
    }

    #[test]
    fn test_unix_seconds_from_fractional_seconds() {
        assert_eq!(unix_seconds(dec!(1534614057.321597)), 1534614057);
    }

    #[test]
    fn test_unix_seconds_from_whole_seconds() {
        assert_eq!(unix_seconds(dec!(1534614057)), 1534614057);
    }
}
