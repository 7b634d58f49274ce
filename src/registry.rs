//! Channel registry
//!
//! Bidirectional association between an exchange-assigned wire channel id and
//! the market it streams. Populated when subscription acknowledgment frames
//! arrive, consulted for every subsequent data frame, and torn down with the
//! connection. Scoped to a single connection; the dispatcher is its sole
//! mutator.

use std::collections::HashMap;
use std::fmt;

use crate::model::Market;

/// Exchange-assigned token identifying a subscribed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Normalize exchange-native pair spellings to canonical asset symbols.
///
/// Kraken spells BTC as "XBT" and DOGE as "XDG"; normalizers downstream only
/// ever see the canonical spellings.
pub fn normalize_pair(pair: &str) -> String {
    pair.replace("XBT", "BTC").replace("XDG", "DOGE")
}

/// Maps wire channel ids to the markets they stream.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: HashMap<ChannelId, Market>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Associate a channel id with a market. A later registration for the
    /// same id replaces the earlier one.
    pub fn register(&mut self, id: ChannelId, market: Market) {
        self.channels.insert(id, market);
    }

    /// Look up the market for a channel id. A miss is a recoverable
    /// condition: frames may reference channels before the ack has been
    /// observed, or after an unsubscribe race.
    pub fn lookup(&self, id: ChannelId) -> Option<&Market> {
        self.channels.get(&id)
    }

    /// Remove a channel association on unsubscribe or teardown.
    pub fn remove(&mut self, id: ChannelId) {
        self.channels.remove(&id);
    }

    /// Drop all associations on connection teardown.
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc_usd() -> Market {
        Market::new("BTC", "USD", "XBT/USD")
    }

    #[test]
    fn test_register_lookup_round_trip() {
        let mut registry = ChannelRegistry::new();
        registry.register(ChannelId(5), btc_usd());
        assert_eq!(registry.lookup(ChannelId(5)), Some(&btc_usd()));
    }

    #[test]
    fn test_remove_then_lookup_is_not_found() {
        let mut registry = ChannelRegistry::new();
        registry.register(ChannelId(5), btc_usd());
        registry.remove(ChannelId(5));
        assert_eq!(registry.lookup(ChannelId(5)), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_second_registration_replaces_first() {
        let mut registry = ChannelRegistry::new();
        registry.register(ChannelId(5), btc_usd());
        let eth = Market::new("ETH", "USD", "ETH/USD");
        registry.register(ChannelId(5), eth.clone());
        assert_eq!(registry.lookup(ChannelId(5)), Some(&eth));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_unregistered_is_none() {
        let registry = ChannelRegistry::new();
        assert_eq!(registry.lookup(ChannelId(99)), None);
    }

    #[test]
    fn test_pair_normalization() {
        assert_eq!(normalize_pair("XBT/USD"), "BTC/USD");
        assert_eq!(normalize_pair("XDG/EUR"), "DOGE/EUR");
        assert_eq!(normalize_pair("ETH/USD"), "ETH/USD");
    }
}
