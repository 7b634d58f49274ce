//! Inbound message dispatcher
//!
//! Receives each raw frame from the transport in arrival order, classifies
//! it through the exchange adapter, and routes it: control frames mutate the
//! channel registry, data frames are normalized and published. The
//! dispatcher is the sole mutator of the registry, and no condition here is
//! fatal — malformed frames, exchange errors, and unresolved channel ids are
//! logged and dropped without affecting other channels.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::exchanges::{ClassifiedFrame, ExchangeAdapter};
use crate::model::MarketEvent;
use crate::publisher::Publisher;
use crate::registry::{normalize_pair, ChannelId, ChannelRegistry};
use crate::subscription::{lock_pending, PendingMarkets};

pub struct Dispatcher {
    adapter: Arc<dyn ExchangeAdapter>,
    registry: ChannelRegistry,
    pending: PendingMarkets,
    publisher: Publisher,
    outbound: mpsc::UnboundedSender<String>,
}

impl Dispatcher {
    pub fn new(
        adapter: Arc<dyn ExchangeAdapter>,
        pending: PendingMarkets,
        publisher: Publisher,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            adapter,
            registry: ChannelRegistry::new(),
            pending,
            publisher,
            outbound,
        }
    }

    /// The registry scoped to this connection.
    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Tear down per-connection state when the transport reconnects; channel
    /// ids are not stable across connections.
    pub fn reset(&mut self) {
        self.registry.clear();
    }

    /// Process one raw inbound frame. Never fails the caller's read loop.
    pub fn on_frame(&mut self, raw: &str) {
        let frame: Value = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "discarding unparseable frame");
                return;
            }
        };

        match self.adapter.classify(&frame) {
            ClassifiedFrame::ExchangeError { detail } => {
                warn!(exchange = self.adapter.name(), %detail, "exchange reported error");
            }
            ClassifiedFrame::SubscriptionAck {
                channel_id,
                remote_pair,
            } => self.on_ack(channel_id, &remote_pair),
            ClassifiedFrame::UnsubscriptionAck { channel_id } => {
                info!(channel = %channel_id, "unsubscribed, removing channel");
                self.registry.remove(channel_id);
            }
            ClassifiedFrame::Ping { token } => {
                let pong = self.adapter.pong_message(&token);
                if self.outbound.send(pong).is_err() {
                    warn!("outbound channel closed, dropping pong");
                }
            }
            ClassifiedFrame::Ticker { channel_id } => {
                self.dispatch_data(channel_id, &frame, |adapter, frame, market| {
                    adapter
                        .normalize_ticker(frame, market)
                        .map(|t| vec![MarketEvent::Ticker(t)])
                });
            }
            ClassifiedFrame::Trades { channel_id } => {
                self.dispatch_data(channel_id, &frame, |adapter, frame, market| {
                    adapter.normalize_trades(frame, market).map(|trades| {
                        trades.into_iter().map(MarketEvent::Trade).collect()
                    })
                });
            }
            ClassifiedFrame::Snapshot { channel_id } => {
                self.dispatch_data(channel_id, &frame, |adapter, frame, market| {
                    adapter
                        .normalize_snapshot(frame, market)
                        .map(|s| vec![MarketEvent::L2Snapshot(s)])
                });
            }
            ClassifiedFrame::Update { channel_id } => {
                self.dispatch_data(channel_id, &frame, |adapter, frame, market| {
                    adapter.normalize_update(frame, market).map(|update| {
                        if update.asks.is_empty() && update.bids.is_empty() {
                            vec![]
                        } else {
                            vec![MarketEvent::L2Update(update)]
                        }
                    })
                });
            }
            ClassifiedFrame::Ignored => {
                trace!(frame = %raw, "ignoring frame");
            }
        }
    }

    /// Resolve the market a confirmed channel belongs to and register it.
    fn on_ack(&mut self, channel_id: ChannelId, remote_pair: &str) {
        let pair = normalize_pair(remote_pair);
        let market = lock_pending(&self.pending)
            .get(&pair)
            .map(|entry| entry.market.clone());

        match market {
            Some(market) => {
                info!(channel = %channel_id, pair = %pair, "channel registered");
                self.registry.register(channel_id, market);
            }
            None => {
                warn!(channel = %channel_id, pair = %pair, "ack for unrequested pair, ignoring");
            }
        }
    }

    /// Look up the owning market and publish whatever the normalizer yields.
    fn dispatch_data<F>(&mut self, channel_id: ChannelId, frame: &Value, normalize: F)
    where
        F: FnOnce(
            &dyn ExchangeAdapter,
            &Value,
            &crate::model::Market,
        ) -> crate::error::Result<Vec<MarketEvent>>,
    {
        let Some(market) = self.registry.lookup(channel_id).cloned() else {
            warn!(channel = %channel_id, "frame for unresolved channel, dropping");
            return;
        };

        match normalize(self.adapter.as_ref(), frame, &market) {
            Ok(events) => {
                for event in events {
                    self.publisher.publish(event);
                }
            }
            Err(e) => {
                debug!(channel = %channel_id, error = %e, "failed to normalize frame");
            }
        }
    }

    #[cfg(test)]
    fn register_for_test(&mut self, id: ChannelId, market: crate::model::Market) {
        self.registry.register(id, market);
    }
}
