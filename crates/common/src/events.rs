use tokio::sync::broadcast;

use crate::TradeEvent;

/// Fan-out of recorded trades to live subscribers.
///
/// Thin wrapper over a tokio broadcast channel. Emitting is non-blocking
/// and safe from concurrent sessions; subscribers that join late see only
/// events emitted after they subscribed, and slow subscribers lose the
/// oldest events (`Lagged`) rather than stalling the sender.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<TradeEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. A send error only means no subscriber is
    /// currently listening, which is fine.
    pub fn emit(&self, event: TradeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TradeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
