//! Subscription controller
//!
//! Public subscribe/unsubscribe API per channel kind. Builds the exchange's
//! literal wire messages through the adapter and sends them on the outbound
//! channel; never touches the channel registry itself. The registry is
//! populated asynchronously when the dispatcher observes the exchange's
//! acknowledgment frame, resolving the market from the pending map kept
//! here.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{FeedError, Result};
use crate::exchanges::{ChannelKind, ExchangeAdapter};
use crate::model::Market;
use crate::registry::normalize_pair;

/// One pair awaiting (or holding) live subscriptions, together with the
/// channel kinds requested for it. The pair stays pending until every kind
/// has been unsubscribed.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub market: Market,
    pub kinds: HashSet<ChannelKind>,
}

/// Markets awaiting (or holding) a live subscription, keyed by normalized
/// pair name. Shared with the dispatcher, which reads it when resolving
/// acknowledgment frames.
pub type PendingMarkets = Arc<Mutex<HashMap<String, PendingEntry>>>;

/// Lock the pending map, recovering a poisoned guard. The critical sections
/// are single HashMap operations on plain values, so the data cannot be left
/// torn by a panicking holder.
pub(crate) fn lock_pending(
    pending: &PendingMarkets,
) -> MutexGuard<'_, HashMap<String, PendingEntry>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct SubscriptionController {
    adapter: Arc<dyn ExchangeAdapter>,
    outbound: mpsc::UnboundedSender<String>,
    pending: PendingMarkets,
}

impl SubscriptionController {
    pub fn new(adapter: Arc<dyn ExchangeAdapter>, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            adapter,
            outbound,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Shared handle to the pending-market map, for the dispatcher.
    pub fn pending(&self) -> PendingMarkets {
        self.pending.clone()
    }

    /// Subscribe one market to a channel kind.
    ///
    /// Rejects synchronously when the adapter does not support the kind;
    /// nothing is sent in that case.
    pub fn subscribe(&self, kind: ChannelKind, market: &Market) -> Result<()> {
        self.check_capability(kind)?;

        lock_pending(&self.pending)
            .entry(normalize_pair(&market.remote_id))
            .or_insert_with(|| PendingEntry {
                market: market.clone(),
                kinds: HashSet::new(),
            })
            .kinds
            .insert(kind);

        for message in self
            .adapter
            .subscribe_messages(kind, std::slice::from_ref(market))
        {
            debug!(kind = %kind, market = %market.remote_id, %message, "sending subscribe");
            self.send(message)?;
        }
        Ok(())
    }

    /// Unsubscribe one market from a channel kind.
    ///
    /// The registry entry is removed later, when the dispatcher observes the
    /// exchange's unsubscribe acknowledgment; late frames arriving in that
    /// window are dropped via the unresolved-channel path.
    pub fn unsubscribe(&self, kind: ChannelKind, market: &Market) -> Result<()> {
        self.check_capability(kind)?;

        {
            let mut pending = lock_pending(&self.pending);
            let pair = normalize_pair(&market.remote_id);
            if let Some(entry) = pending.get_mut(&pair) {
                entry.kinds.remove(&kind);
                // The pair leaves the pending map only once no kind holds it.
                if entry.kinds.is_empty() {
                    pending.remove(&pair);
                }
            }
        }

        for message in self
            .adapter
            .unsubscribe_messages(kind, std::slice::from_ref(market))
        {
            debug!(kind = %kind, market = %market.remote_id, %message, "sending unsubscribe");
            self.send(message)?;
        }
        Ok(())
    }

    pub fn subscribe_ticker(&self, market: &Market) -> Result<()> {
        self.subscribe(ChannelKind::Ticker, market)
    }

    pub fn unsubscribe_ticker(&self, market: &Market) -> Result<()> {
        self.unsubscribe(ChannelKind::Ticker, market)
    }

    pub fn subscribe_trades(&self, market: &Market) -> Result<()> {
        self.subscribe(ChannelKind::Trades, market)
    }

    pub fn unsubscribe_trades(&self, market: &Market) -> Result<()> {
        self.unsubscribe(ChannelKind::Trades, market)
    }

    pub fn subscribe_level2_snapshots(&self, market: &Market) -> Result<()> {
        self.subscribe(ChannelKind::Level2Snapshots, market)
    }

    pub fn unsubscribe_level2_snapshots(&self, market: &Market) -> Result<()> {
        self.unsubscribe(ChannelKind::Level2Snapshots, market)
    }

    pub fn subscribe_level2_updates(&self, market: &Market) -> Result<()> {
        self.subscribe(ChannelKind::Level2Updates, market)
    }

    pub fn unsubscribe_level2_updates(&self, market: &Market) -> Result<()> {
        self.unsubscribe(ChannelKind::Level2Updates, market)
    }

    fn check_capability(&self, kind: ChannelKind) -> Result<()> {
        if self.adapter.capabilities().supports(kind) {
            Ok(())
        } else {
            Err(FeedError::Unsupported {
                exchange: self.adapter.name(),
                kind,
            })
        }
    }

    fn send(&self, message: String) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| FeedError::OutboundClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::KrakenAdapter;
    use serde_json::Value;

    fn controller() -> (SubscriptionController, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = SubscriptionController::new(Arc::new(KrakenAdapter::default()), tx);
        (controller, rx)
    }

    fn btc_usd() -> Market {
        Market::new("BTC", "USD", "XBT/USD")
    }

    #[test]
    fn test_subscribe_sends_wire_message_and_records_market() {
        let (controller, mut rx) = controller();
        controller.subscribe_level2_updates(&btc_usd()).unwrap();

        let sent: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(sent["event"], "subscribe");
        assert_eq!(sent["pair"][0], "XBT/USD");

        let pending = controller.pending();
        let pending = pending.lock().unwrap();
        let entry = pending.get("BTC/USD").unwrap();
        assert_eq!(entry.market, btc_usd());
        assert!(entry.kinds.contains(&ChannelKind::Level2Updates));
    }

    #[test]
    fn test_unsupported_kind_is_rejected_without_sending() {
        let (controller, mut rx) = controller();
        let err = controller
            .subscribe_level2_snapshots(&btc_usd())
            .unwrap_err();
        assert!(matches!(err, FeedError::Unsupported { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_clears_pending_market() {
        let (controller, mut rx) = controller();
        controller.subscribe_trades(&btc_usd()).unwrap();
        controller.unsubscribe_trades(&btc_usd()).unwrap();

        let pending = controller.pending();
        assert!(pending.lock().unwrap().is_empty());

        // subscribe then unsubscribe message
        let _sub = rx.try_recv().unwrap();
        let unsub: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(unsub["unsub"], "market.XBT/USD.trade.detail");
    }

    #[test]
    fn test_unsubscribing_one_kind_keeps_pair_pending_for_others() {
        let (controller, _rx) = controller();
        controller.subscribe_trades(&btc_usd()).unwrap();
        controller.subscribe_level2_updates(&btc_usd()).unwrap();
        controller.unsubscribe_trades(&btc_usd()).unwrap();

        let pending = controller.pending();
        let pending = pending.lock().unwrap();
        let entry = pending.get("BTC/USD").unwrap();
        assert!(entry.kinds.contains(&ChannelKind::Level2Updates));
        assert!(!entry.kinds.contains(&ChannelKind::Trades));
    }

    #[test]
    fn test_subscribe_recovers_from_poisoned_pending_lock() {
        let (controller, _rx) = controller();
        let pending = controller.pending();
        let _ = std::thread::spawn(move || {
            let _guard = pending.lock().unwrap();
            panic!("poison while holding the pending lock");
        })
        .join();

        controller.subscribe_trades(&btc_usd()).unwrap();
        let pending = controller.pending();
        assert!(lock_pending(&pending).contains_key("BTC/USD"));
    }
}
