//! Consumer delivery
//!
//! Hands each normalized object to the downstream consumer two ways: as a
//! tagged [`MarketEvent`] on an unbounded channel, and as a push-style call
//! on the [`Consumer`] trait. Collaborators may rely on either. Publishing
//! never fails the dispatcher; a closed channel is logged and dropped.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::model::{Level2Snapshot, Level2Update, MarketEvent, Ticker, Trade};

/// Push-style handoff for downstream collaborators that maintain their own
/// order-book state. All methods default to no-ops so a consumer implements
/// only the kinds it cares about.
pub trait Consumer: Send {
    fn handle_ticker(&mut self, _ticker: &Ticker) {}
    fn handle_trade(&mut self, _trade: &Trade) {}
    fn handle_snapshot(&mut self, _snapshot: &Level2Snapshot) {}
    fn handle_update(&mut self, _update: &Level2Update) {}
}

/// Delivers normalized events to the consumer.
pub struct Publisher {
    events: Option<mpsc::UnboundedSender<MarketEvent>>,
    consumer: Option<Box<dyn Consumer>>,
}

impl Publisher {
    pub fn new() -> Self {
        Self {
            events: None,
            consumer: None,
        }
    }

    /// Attach a tagged event channel; returns the receiving half.
    pub fn with_channel(mut self) -> (Self, mpsc::UnboundedReceiver<MarketEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        (self, rx)
    }

    /// Attach a push-style consumer.
    pub fn with_consumer(mut self, consumer: Box<dyn Consumer>) -> Self {
        self.consumer = Some(consumer);
        self
    }

    /// Deliver one event through both attached styles.
    pub fn publish(&mut self, event: MarketEvent) {
        debug!(kind = event.kind(), market = %event.market().pair(), "publishing event");

        if let Some(consumer) = self.consumer.as_mut() {
            match &event {
                MarketEvent::Ticker(t) => consumer.handle_ticker(t),
                MarketEvent::Trade(t) => consumer.handle_trade(t),
                MarketEvent::L2Snapshot(s) => consumer.handle_snapshot(s),
                MarketEvent::L2Update(u) => consumer.handle_update(u),
            }
        }

        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                warn!("event channel closed, dropping event");
            }
        }
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}
